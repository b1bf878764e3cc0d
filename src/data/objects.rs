use std::sync::Arc;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;
use crate::db::TenantCatalog;
use crate::settings::Settings;
use crate::tenancy::context::ActiveRequests;
use crate::tenancy::lifecycle::TenantLifecycleService;
use crate::tenancy::provider::ScopedConnectionProvider;
use crate::tenancy::provisioner::SchemaProvisioner;

#[derive(Clone)]
pub struct AppState {
    pub catalog: TenantCatalog,
    pub provider: ScopedConnectionProvider,
    pub provisioner: Arc<SchemaProvisioner>,
    pub lifecycle: TenantLifecycleService,
    pub active: ActiveRequests,
    pub settings: Settings,
}

/// A user row inside one tenant's namespace. The first row of every
/// namespace is the AdminPrincipal created at provisioning, used for that
/// tenant's self-service user management.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TenantUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, skip_deserializing)]
    #[schemars(skip)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: i64,
}

/// Bootstrap credentials returned exactly once, from a successful
/// provisioning run.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub admin_email: String,
    pub temp_password: String,
}
