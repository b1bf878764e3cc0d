use crate::common::constants::*;
use crate::common::test_client::TenancyClient;
use anyhow::Result;
use rocket::http::{ContentType, Status};
use quizforge_tenancy::data::api::{MigrateTenantRequest, UpdateTenantRequest};
use quizforge_tenancy::data::enums::{ProvisionFault, TenantStatus};
use quizforge_tenancy::tenancy::provisioner::OBJECT_SET_VERSION;

#[tokio::test]
async fn test_create_tenant_becomes_active() -> Result<()> {
    let client = TenancyClient::new().await;

    let created = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    assert_eq!(created.admin_email, TEST_OWNER_EMAIL);
    assert!(!created.temp_password.is_empty());

    let summary = client.get_tenant(&created.tenant_id).await?;
    assert_eq!(summary.name, TEST_TENANT_NAME);
    assert_eq!(summary.status, TenantStatus::Active);

    // The namespace database exists and carries the full object set plus
    // exactly one AdminPrincipal row.
    let tenant = client.state().catalog.find(&created.tenant_id).await?.unwrap();
    assert!(client.state().provisioner.namespace_path(&tenant.namespace).exists());
    assert_eq!(tenant.object_set_version, OBJECT_SET_VERSION as i64);

    let stats = client.tenant_stats(&created.tenant_id).await?;
    assert_eq!(stats.users, 1);
    assert_eq!(stats.quizzes, 0);
    assert_eq!(stats.questions, 0);
    assert_eq!(stats.flashcard_decks, 0);
    assert_eq!(stats.flashcards, 0);

    let users = client.list_users(&created.tenant_id).await?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, TEST_OWNER_EMAIL);
    assert!(users[0].is_admin);

    // Lifecycle audit trail in the shared catalog.
    let events = client.state().catalog.events(&created.tenant_id).await?;
    let event_types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(event_types.contains(&"registered"));
    assert!(event_types.contains(&"provisioned"));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_owner_rejected() -> Result<()> {
    let client = TenancyClient::new().await;

    client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;

    let response = client.try_create_tenant("Acme Again", TEST_OWNER_EMAIL).await;
    assert_eq!(response.status(), Status::Conflict);

    // A different owner is unaffected.
    client.create_tenant(TEST_SECOND_TENANT_NAME, TEST_SECOND_OWNER_EMAIL).await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_winner() -> Result<()> {
    let client = TenancyClient::new().await;

    let (first, second) = futures::join!(
        client.try_create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL),
        client.try_create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL),
    );

    let statuses = [first.status(), second.status()];
    assert_eq!(statuses.iter().filter(|s| **s == Status::Created).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == Status::Conflict).count(), 1);

    let active: Vec<_> = client
        .list_tenants()
        .await?
        .into_iter()
        .filter(|t| t.status == TenantStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_suspend_and_resume() -> Result<()> {
    let client = TenancyClient::new().await;
    let created = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;

    let update = UpdateTenantRequest {
        display_name: None,
        status: Some(TenantStatus::Suspended),
    };
    let response = client
        .put(format!("/tenants/{}", created.tenant_id))
        .header(ContentType::JSON)
        .body(serde_json::to_string(&update)?)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // Suspended tenants refuse new bindings.
    let response = client.try_list_users(&created.tenant_id).await;
    assert_eq!(response.status(), Status::Conflict);

    let update = UpdateTenantRequest {
        display_name: Some("Acme Worldwide".to_string()),
        status: Some(TenantStatus::Active),
    };
    let response = client
        .put(format!("/tenants/{}", created.tenant_id))
        .header(ContentType::JSON)
        .body(serde_json::to_string(&update)?)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let summary = client.get_tenant(&created.tenant_id).await?;
    assert_eq!(summary.name, "Acme Worldwide");
    assert_eq!(summary.status, TenantStatus::Active);
    client.list_users(&created.tenant_id).await?;

    // Terminal states cannot be set through the update surface.
    let update = UpdateTenantRequest {
        display_name: None,
        status: Some(TenantStatus::Deleted),
    };
    let response = client
        .put(format!("/tenants/{}", created.tenant_id))
        .header(ContentType::JSON)
        .body(serde_json::to_string(&update)?)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_delete_tenant_drains_and_decommissions() -> Result<()> {
    let client = TenancyClient::new().await;
    let created = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    let tenant = client.state().catalog.find(&created.tenant_id).await?.unwrap();

    client.delete_tenant(&created.tenant_id).await?;

    // New bindings are refused the moment deletion starts, before the
    // namespace is actually gone.
    let response = client.try_list_users(&created.tenant_id).await;
    assert_eq!(response.status(), Status::Conflict);

    client.await_status(&created.tenant_id, TenantStatus::Deleted).await?;
    assert!(!client.state().provisioner.namespace_path(&tenant.namespace).exists());

    // Tombstone row survives; stats are refused.
    let summary = client.get_tenant(&created.tenant_id).await?;
    assert_eq!(summary.status, TenantStatus::Deleted);
    let response = client.get(format!("/tenants/{}/stats", created.tenant_id)).dispatch().await;
    assert_eq!(response.status(), Status::Conflict);

    // The owner may register again; the tombstone does not count.
    let second = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    assert_ne!(second.tenant_id, created.tenant_id);

    Ok(())
}

#[tokio::test]
async fn test_delete_unknown_tenant() -> Result<()> {
    let client = TenancyClient::new().await;

    let response = client
        .delete(format!("/tenants/{}", uuid::Uuid::new_v4()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_provision_fault_rolls_back_and_retry_succeeds() -> Result<()> {
    let client = TenancyClient::new().await;

    client.state().provisioner.set_fault(Some(ProvisionFault::BeforeAdminPrincipal));
    let response = client.try_create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await;
    assert_eq!(response.status(), Status::InternalServerError);

    // No half-created namespace: the file is gone, the status says why.
    let tenants = client.list_tenants().await?;
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].status, TenantStatus::ProvisionFailed);
    let tenant = client.state().catalog.find(&tenants[0].tenant_id).await?.unwrap();
    assert!(!client.state().provisioner.namespace_path(&tenant.namespace).exists());

    // Fault fixed: the retry yields exactly one Active tenant under the
    // same id and namespace.
    client.state().provisioner.set_fault(None);
    let response = client
        .post(format!("/tenants/{}/provision", tenant.id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let active: Vec<_> = client
        .list_tenants()
        .await?
        .into_iter()
        .filter(|t| t.status == TenantStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].tenant_id, tenant.id);

    let stats = client.tenant_stats(&tenant.id).await?;
    assert_eq!(stats.users, 1);

    // A tenant that reached Active can never be re-provisioned.
    let response = client
        .post(format!("/tenants/{}/provision", tenant.id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_migrate_object_set() -> Result<()> {
    let client = TenancyClient::new().await;
    let created = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;

    // Replaying to the version already reached is a no-op.
    let migrate = MigrateTenantRequest { target_version: OBJECT_SET_VERSION };
    let response = client
        .post(format!("/tenants/{}/migrate", created.tenant_id))
        .header(ContentType::JSON)
        .body(serde_json::to_string(&migrate)?)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // Downgrades and unknown versions are refused.
    for target_version in [1usize, OBJECT_SET_VERSION + 1] {
        let migrate = MigrateTenantRequest { target_version };
        let response = client
            .post(format!("/tenants/{}/migrate", created.tenant_id))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&migrate)?)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    Ok(())
}
