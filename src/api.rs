use rocket::{delete, get, post, put, State};
use rocket::response::status::{Accepted, Created};
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use tracing::info;
use crate::auth::password_auth::hash_password;
use crate::constants::TENANCY_VERSION;
use crate::data::api::{
    CreateTenantRequest, CreateTenantUserRequest, DeleteTenantResponse, MigrateTenantRequest,
    MigrateTenantResponse, TenantResponse, TenantStatsResponse, TenantSummary,
    UpdateTenantRequest,
};
use crate::data::error::ApiError;
use crate::data::objects::{AppState, TenantUser};
use crate::data::tenant::{parse_tenant_id, Tenant};
use crate::tenancy::context::BoundTenant;

fn summary(tenant: Tenant) -> TenantSummary {
    TenantSummary {
        tenant_id: tenant.id,
        name: tenant.display_name,
        status: tenant.status,
        created_at: tenant.created_at,
    }
}

fn checked_id(id: &str) -> Result<String, ApiError> {
    parse_tenant_id(id)
        .ok_or_else(|| ApiError::BadTenantId(format!("malformed tenant identifier {id}")))
}

#[openapi(tag = "Server")]
#[get("/server/version")]
/// Get the current version of the server.
pub(crate) fn version() -> &'static str {
    TENANCY_VERSION
}

#[openapi(tag = "Tenants")]
#[post("/tenants", format = "json", data = "<create_req>")]
/// Register and provision a new tenant. Returns the bootstrap admin
/// credentials exactly once.
pub(crate) async fn create_tenant(
    state: &State<AppState>,
    create_req: Json<CreateTenantRequest>,
) -> Result<Created<Json<TenantResponse>>, ApiError> {
    let req = create_req.into_inner();
    let (tenant, credentials) = state
        .lifecycle
        .create_tenant(req.name, req.owner_email)
        .await?;

    info!(tenant = %tenant.id, "Tenant created");
    Ok(Created::new(format!("/tenants/{}", tenant.id)).body(Json(TenantResponse {
        tenant_id: tenant.id,
        admin_email: credentials.admin_email,
        temp_password: credentials.temp_password,
    })))
}

#[openapi(tag = "Tenants")]
#[get("/tenants")]
/// List all tenants in the catalog, tombstones included.
pub(crate) async fn list_tenants(
    state: &State<AppState>,
) -> Result<Json<Vec<TenantSummary>>, ApiError> {
    let tenants = state.catalog.list(None).await?;
    Ok(Json(tenants.into_iter().map(summary).collect()))
}

#[openapi(tag = "Tenants")]
#[get("/tenants/<id>")]
/// Get one tenant.
pub(crate) async fn get_tenant(
    state: &State<AppState>,
    id: &str,
) -> Result<Json<TenantSummary>, ApiError> {
    let id = checked_id(id)?;
    let tenant = state
        .catalog
        .find(&id)
        .await?
        .ok_or(ApiError::UnknownTenant(id))?;
    Ok(Json(summary(tenant)))
}

#[openapi(tag = "Tenants")]
#[put("/tenants/<id>", format = "json", data = "<update_req>")]
/// Rename a tenant or move it between Active and Suspended.
pub(crate) async fn update_tenant(
    state: &State<AppState>,
    id: &str,
    update_req: Json<UpdateTenantRequest>,
) -> Result<Json<TenantSummary>, ApiError> {
    let id = checked_id(id)?;
    let tenant = state
        .lifecycle
        .update_tenant(&id, update_req.into_inner())
        .await?;
    Ok(Json(summary(tenant)))
}

#[openapi(tag = "Tenants")]
#[post("/tenants/<id>/provision")]
/// Retry provisioning a tenant whose first run failed.
pub(crate) async fn retry_provision(
    state: &State<AppState>,
    id: &str,
) -> Result<Json<TenantResponse>, ApiError> {
    let id = checked_id(id)?;
    let (tenant, credentials) = state.lifecycle.retry_provision(&id).await?;
    Ok(Json(TenantResponse {
        tenant_id: tenant.id,
        admin_email: credentials.admin_email,
        temp_password: credentials.temp_password,
    }))
}

#[openapi(tag = "Tenants")]
#[post("/tenants/<id>/migrate", format = "json", data = "<migrate_req>")]
/// Replay the namespace object set of one tenant to a target version.
pub(crate) async fn migrate_tenant(
    state: &State<AppState>,
    id: &str,
    migrate_req: Json<MigrateTenantRequest>,
) -> Result<Json<MigrateTenantResponse>, ApiError> {
    let id = checked_id(id)?;
    let version = state
        .lifecycle
        .migrate_tenant(&id, migrate_req.target_version)
        .await?;
    Ok(Json(MigrateTenantResponse {
        tenant_id: id,
        object_set_version: version,
    }))
}

#[openapi(tag = "Tenants")]
#[get("/tenants/<id>/stats")]
/// Per-object-type row counts of one tenant's namespace, read through the
/// scoped connection provider.
pub(crate) async fn tenant_stats(
    state: &State<AppState>,
    id: &str,
) -> Result<Json<TenantStatsResponse>, ApiError> {
    let id = checked_id(id)?;
    Ok(Json(state.lifecycle.stats(&id).await?))
}

#[openapi(tag = "Tenants")]
#[delete("/tenants/<id>")]
/// Delete a tenant: bindings are refused immediately, in-flight requests
/// drain, then the namespace is dropped. The catalog row remains as a
/// tombstone.
pub(crate) async fn delete_tenant(
    state: &State<AppState>,
    id: &str,
) -> Result<Accepted<Json<DeleteTenantResponse>>, ApiError> {
    let id = checked_id(id)?;
    let tenant = state.lifecycle.delete_tenant(&id).await?;
    Ok(Accepted(Json(DeleteTenantResponse {
        tenant_id: tenant.id,
        status: tenant.status,
    })))
}

#[openapi(tag = "Tenant Users")]
#[post("/users", format = "json", data = "<user_req>")]
/// Create a user inside the bound tenant's namespace.
pub(crate) async fn create_tenant_user(
    state: &State<AppState>,
    bound: BoundTenant,
    user_req: Json<CreateTenantUserRequest>,
) -> Result<Created<Json<TenantUser>>, ApiError> {
    let req = user_req.into_inner();
    let user = state
        .provider
        .with_scoped(bound.binding(), move |handle| {
            let mut user = TenantUser {
                id: -1,
                email: req.email,
                username: req.username,
                password_hash: Some(hash_password(&req.password)?),
                is_active: true,
                is_admin: false,
                created_at: chrono::Utc::now().timestamp(),
            };
            user.id = handle.insert_user(&user)?;
            user.password_hash = None;
            Ok(user)
        })
        .await?;

    info!(tenant = %bound.tenant().id, user = %user.email, "Tenant user created");
    Ok(Created::new("/users").body(Json(user)))
}

#[openapi(tag = "Tenant Users")]
#[get("/users")]
/// List the users of the bound tenant's namespace.
pub(crate) async fn list_tenant_users(
    state: &State<AppState>,
    bound: BoundTenant,
) -> Result<Json<Vec<TenantUser>>, ApiError> {
    let users = state
        .provider
        .with_scoped(bound.binding(), |handle| handle.list_users())
        .await?;
    Ok(Json(users))
}
