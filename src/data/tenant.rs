use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;
use uuid::Uuid;
use crate::data::enums::TenantStatus;

/// Tenant represents an isolated organization in QuizForge. The namespace is
/// derived from the id and holds that organization's copy of every
/// application table; the catalog row outlives the namespace as a tombstone.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Tenant {
    pub id: String,  // UUID v4
    pub display_name: String,
    pub namespace: String,
    pub status: TenantStatus,
    pub owner_email: String,
    pub object_set_version: i64,
    pub created_at: i64,
}

impl Tenant {
    /// Create a new tenant with a generated UUID, status Provisioning.
    pub fn new(display_name: String, owner_email: String) -> Self {
        let id = Uuid::new_v4().to_string();
        let namespace = derive_namespace(&id);
        Self {
            id,
            display_name,
            namespace,
            status: TenantStatus::Provisioning,
            owner_email,
            object_set_version: 0,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Namespace name, derived deterministically from the tenant id. Globally
/// unique because the id is, and never reissued: the catalog keeps the row
/// after deletion.
pub fn derive_namespace(tenant_id: &str) -> String {
    format!("tenant_{}", tenant_id.replace('-', ""))
}

/// Validate a caller-supplied tenant identifier.
pub fn parse_tenant_id(value: &str) -> Option<String> {
    Uuid::parse_str(value).ok().map(|u| u.to_string())
}
