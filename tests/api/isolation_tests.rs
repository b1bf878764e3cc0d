use crate::common::constants::*;
use crate::common::test_client::TenancyClient;
use anyhow::Result;

#[tokio::test]
async fn test_no_cross_tenant_visibility() -> Result<()> {
    let client = TenancyClient::new().await;
    let acme = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    let tech = client.create_tenant(TEST_SECOND_TENANT_NAME, TEST_SECOND_OWNER_EMAIL).await?;

    client.create_user(&acme.tenant_id, TEST_USER_EMAIL, TEST_USER_NAME).await?;

    // A write issued while bound to Acme is invisible from the other
    // namespace, which still holds only its own admin.
    let acme_users = client.list_users(&acme.tenant_id).await?;
    assert_eq!(acme_users.len(), 2);

    let tech_users = client.list_users(&tech.tenant_id).await?;
    assert_eq!(tech_users.len(), 1);
    assert_eq!(tech_users[0].email, TEST_SECOND_OWNER_EMAIL);

    let acme_stats = client.tenant_stats(&acme.tenant_id).await?;
    let tech_stats = client.tenant_stats(&tech.tenant_id).await?;
    assert_eq!(acme_stats.users, 2);
    assert_eq!(tech_stats.users, 1);

    Ok(())
}

#[tokio::test]
async fn test_sequential_reuse_leaves_no_residue() -> Result<()> {
    // One physical connection: every request reuses it.
    let client = TenancyClient::new_with_pool(1).await;
    let acme = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    let tech = client.create_tenant(TEST_SECOND_TENANT_NAME, TEST_SECOND_OWNER_EMAIL).await?;

    client.create_user(&acme.tenant_id, TEST_USER_EMAIL, TEST_USER_NAME).await?;

    // The very same connection, bound to the other tenant next, sees none
    // of the first tenant's state.
    let tech_users = client.list_users(&tech.tenant_id).await?;
    assert_eq!(tech_users.len(), 1);
    assert_eq!(tech_users[0].email, TEST_SECOND_OWNER_EMAIL);

    // And back again, both ways repeatedly.
    for _ in 0..5 {
        assert_eq!(client.list_users(&acme.tenant_id).await?.len(), 2);
        assert_eq!(client.list_users(&tech.tenant_id).await?.len(), 1);
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_alternating_tenants() -> Result<()> {
    // 50 concurrent requests alternating between two tenants over a
    // 5-connection pool: no cross-tenant rows may appear.
    let client = TenancyClient::new_with_pool(5).await;
    let acme = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    let tech = client.create_tenant(TEST_SECOND_TENANT_NAME, TEST_SECOND_OWNER_EMAIL).await?;

    let payloads: Vec<(String, String, String)> = (0..50)
        .map(|i| {
            let (tenant_id, prefix) = if i % 2 == 0 {
                (acme.tenant_id.clone(), "acme")
            } else {
                (tech.tenant_id.clone(), "tech")
            };
            (tenant_id, format!("{prefix}-user-{i}@example.com"), format!("{prefix}-user-{i}"))
        })
        .collect();
    let responses = futures::future::join_all(
        payloads
            .iter()
            .map(|(tenant_id, email, username)| client.try_create_user(tenant_id, email, username)),
    )
    .await;
    for response in responses {
        assert_eq!(response.status(), rocket::http::Status::Created);
    }

    let acme_users = client.list_users(&acme.tenant_id).await?;
    let tech_users = client.list_users(&tech.tenant_id).await?;

    // 25 created rows plus the admin on each side, and every row belongs
    // where it was written.
    assert_eq!(acme_users.len(), 26);
    assert_eq!(tech_users.len(), 26);
    assert!(acme_users.iter().all(|u| u.email.starts_with("acme-") || u.email == TEST_OWNER_EMAIL));
    assert!(tech_users.iter().all(|u| u.email.starts_with("tech-") || u.email == TEST_SECOND_OWNER_EMAIL));

    let acme_stats = client.tenant_stats(&acme.tenant_id).await?;
    let tech_stats = client.tenant_stats(&tech.tenant_id).await?;
    assert_eq!(acme_stats.users, 26);
    assert_eq!(tech_stats.users, 26);

    Ok(())
}
