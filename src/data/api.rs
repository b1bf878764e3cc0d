use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;
use crate::data::enums::TenantStatus;

/// Request to create a new tenant
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTenantRequest {
    pub name: String,
    pub owner_email: String,
}

/// Response for a successfully provisioned tenant. The temp password is
/// returned exactly once and never stored in clear.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TenantResponse {
    pub tenant_id: String,
    pub admin_email: String,
    pub temp_password: String,
}

/// One row of `GET /tenants`
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub name: String,
    pub status: TenantStatus,
    pub created_at: i64,
}

/// Request to update a tenant's display name or status
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTenantRequest {
    pub display_name: Option<String>,
    pub status: Option<TenantStatus>,
}

/// Per-object-type row counts of one tenant's namespace
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TenantStatsResponse {
    pub users: i64,
    pub quizzes: i64,
    pub questions: i64,
    pub flashcard_decks: i64,
    pub flashcards: i64,
}

/// Request to replay the namespace object set to a target version
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MigrateTenantRequest {
    pub target_version: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MigrateTenantResponse {
    pub tenant_id: String,
    pub object_set_version: usize,
}

/// Request to create a user inside the bound tenant's namespace
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTenantUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteTenantResponse {
    pub tenant_id: String,
    pub status: TenantStatus,
}
