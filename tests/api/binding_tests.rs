use crate::common::constants::*;
use crate::common::test_client::TenancyClient;
use anyhow::Result;
use rocket::http::{Header, Status};
use quizforge_tenancy::constants::{TENANT_HEADER, TENANCY_VERSION};
use quizforge_tenancy::data::error::ApiError;
use quizforge_tenancy::tenancy::context::TenantBinding;

#[tokio::test]
async fn test_version() -> Result<()> {
    let client = TenancyClient::new().await;

    let response = client.get("/server/version").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().await.unwrap(), TENANCY_VERSION);

    Ok(())
}

#[tokio::test]
async fn test_missing_tenant_header_rejected() -> Result<()> {
    let client = TenancyClient::new().await;
    client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;

    // Rejected before any handler logic, with an error distinct from 404.
    let response = client.get("/users").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);

    Ok(())
}

#[tokio::test]
async fn test_malformed_tenant_header_rejected() -> Result<()> {
    let client = TenancyClient::new().await;

    let response = client
        .get("/users")
        .header(Header::new(TENANT_HEADER, "not-a-uuid"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    Ok(())
}

#[tokio::test]
async fn test_unknown_tenant_rejected() -> Result<()> {
    let client = TenancyClient::new().await;

    let response = client
        .get("/users")
        .header(Header::new(TENANT_HEADER, uuid::Uuid::new_v4().to_string()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_unbound_acquire_fails_loudly() -> Result<()> {
    let client = TenancyClient::new().await;
    let provider = client.state().provider.clone();

    // Never a silent default namespace: an unbound slot is a programming
    // error on the caller's side.
    let unbound = TenantBinding::unbound();
    assert!(matches!(
        provider.acquire(&unbound),
        Err(ApiError::NoTenantBound)
    ));

    let result = provider
        .with_scoped(&unbound, |handle| Ok(handle.namespace().to_string()))
        .await;
    assert!(matches!(result, Err(ApiError::NoTenantBound)));

    Ok(())
}

#[tokio::test]
async fn test_missing_namespace_database_detected() -> Result<()> {
    let client = TenancyClient::new().await;
    let created = client.create_tenant(TEST_TENANT_NAME, TEST_OWNER_EMAIL).await?;
    let tenant = client.state().catalog.find(&created.tenant_id).await?.unwrap();

    // Remove the backing database behind the provider's back; a scoped
    // acquire must fail instead of silently creating an empty namespace.
    std::fs::remove_file(client.state().provisioner.namespace_path(&tenant.namespace))?;

    let binding = TenantBinding::bind(tenant);
    let result = client.state().provider.acquire(&binding);
    assert!(matches!(result, Err(ApiError::IsolationViolation(_))));

    Ok(())
}
