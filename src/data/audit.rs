use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

/// Lifecycle audit event for a tenant, kept in the shared catalog so the
/// trail survives the namespace itself.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TenantEvent {
    pub id: i64,
    pub tenant_id: String,
    pub event_type: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl TenantEvent {
    pub fn new(tenant_id: &str, event_type: &str, detail: Option<String>) -> Self {
        Self {
            id: -1,  // Will be set by database
            tenant_id: tenant_id.to_string(),
            event_type: event_type.to_string(),
            detail,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
