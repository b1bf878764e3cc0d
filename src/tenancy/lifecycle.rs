use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};
use crate::auth::password_auth::{generate_temp_password, hash_password};
use crate::data::api::{TenantStatsResponse, UpdateTenantRequest};
use crate::data::audit::TenantEvent;
use crate::data::enums::TenantStatus;
use crate::data::error::ApiError;
use crate::data::objects::{AdminCredentials, TenantUser};
use crate::data::tenant::Tenant;
use crate::db::TenantCatalog;
use crate::settings::DrainSettings;
use crate::tenancy::context::{ActiveRequests, TenantBinding};
use crate::tenancy::provider::ScopedConnectionProvider;
use crate::tenancy::provisioner::{SchemaProvisioner, OBJECT_SET_VERSION};

/// Orchestration surface over catalog, provisioner and provider. Everything
/// the rest of the application does to a tenant's lifecycle goes through
/// here; no caller ever names a namespace directly.
#[derive(Clone)]
pub struct TenantLifecycleService {
    catalog: TenantCatalog,
    provisioner: Arc<SchemaProvisioner>,
    provider: ScopedConnectionProvider,
    active: ActiveRequests,
    drain: DrainSettings,
}

impl TenantLifecycleService {
    pub fn new(
        catalog: TenantCatalog,
        provisioner: Arc<SchemaProvisioner>,
        provider: ScopedConnectionProvider,
        active: ActiveRequests,
        drain: DrainSettings,
    ) -> Self {
        Self { catalog, provisioner, provider, active, drain }
    }

    /// Register and provision a new tenant. On provisioning failure the
    /// tenant is left in ProvisionFailed with its namespace fully rolled
    /// back, and no admin credentials exist.
    pub async fn create_tenant(
        &self,
        name: String,
        owner_email: String,
    ) -> Result<(Tenant, AdminCredentials), ApiError> {
        let tenant = self.catalog.register(name, owner_email).await?;
        self.run_provision(tenant).await
    }

    /// Retry provisioning after a failed attempt. Legal only from
    /// ProvisionFailed; a tenant that ever reached Active cannot be
    /// re-provisioned.
    pub async fn retry_provision(&self, id: &str) -> Result<(Tenant, AdminCredentials), ApiError> {
        let tenant = self
            .catalog
            .find(id)
            .await?
            .ok_or_else(|| ApiError::UnknownTenant(id.to_string()))?;
        let tenant = self.catalog.set_status(&tenant.id, TenantStatus::Provisioning).await?;
        self.run_provision(tenant).await
    }

    async fn run_provision(&self, tenant: Tenant) -> Result<(Tenant, AdminCredentials), ApiError> {
        let temp_password = generate_temp_password();
        let admin = TenantUser {
            id: -1,
            email: tenant.owner_email.clone(),
            username: tenant
                .owner_email
                .split('@')
                .next()
                .unwrap_or(&tenant.owner_email)
                .to_string(),
            password_hash: Some(hash_password(&temp_password)?),
            is_active: true,
            is_admin: true,
            created_at: chrono::Utc::now().timestamp(),
        };

        match self.provisioner.provision(&tenant, admin).await {
            Ok(()) => {
                self.catalog
                    .set_object_set_version(&tenant.id, OBJECT_SET_VERSION as i64)
                    .await?;
                let tenant = self.catalog.set_status(&tenant.id, TenantStatus::Active).await?;
                self.catalog
                    .record_event(TenantEvent::new(&tenant.id, "provisioned", None))
                    .await?;
                info!(tenant = %tenant.id, "Tenant active");
                Ok((
                    tenant.clone(),
                    AdminCredentials {
                        admin_email: tenant.owner_email,
                        temp_password,
                    },
                ))
            }
            Err(e) => {
                if let Err(status_err) = self
                    .catalog
                    .set_status(&tenant.id, TenantStatus::ProvisionFailed)
                    .await
                {
                    error!(tenant = %tenant.id, error = %status_err, "Failed to record ProvisionFailed");
                }
                let _ = self
                    .catalog
                    .record_event(TenantEvent::new(&tenant.id, "provision_failed", Some(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }

    /// Rename and/or suspend/resume a tenant. Deletion has its own path so
    /// the drain always runs; this surface only accepts Active/Suspended
    /// targets.
    pub async fn update_tenant(
        &self,
        id: &str,
        update: UpdateTenantRequest,
    ) -> Result<Tenant, ApiError> {
        if let Some(ref display_name) = update.display_name {
            self.catalog.set_display_name(id, display_name).await?;
        }
        if let Some(status) = update.status {
            if !matches!(status, TenantStatus::Active | TenantStatus::Suspended) {
                return Err(ApiError::InvalidStateTransition(format!(
                    "status {status} cannot be set directly",
                )));
            }
            return Ok(self.catalog.set_status(id, status).await?);
        }
        self.catalog
            .find(id)
            .await?
            .ok_or_else(|| ApiError::UnknownTenant(id.to_string()))
    }

    /// Start deleting a tenant: new bindings are refused the moment the
    /// status flips to Deleting; in-flight requests get a drain window and
    /// then the namespace is dropped irrecoverably. Returns immediately.
    pub async fn delete_tenant(&self, id: &str) -> Result<Tenant, ApiError> {
        let tenant = self.catalog.set_status(id, TenantStatus::Deleting).await?;

        let service = self.clone();
        let draining = tenant.clone();
        tokio::spawn(async move {
            service.drain_and_decommission(draining).await;
        });

        Ok(tenant)
    }

    async fn drain_and_decommission(&self, tenant: Tenant) {
        let deadline = Instant::now() + Duration::from_secs(self.drain.window_secs);
        while self.active.in_flight(&tenant.id) > 0 && Instant::now() < deadline {
            sleep(Duration::from_millis(self.drain.poll_ms)).await;
        }
        let stragglers = self.active.in_flight(&tenant.id);
        if stragglers > 0 {
            warn!(tenant = %tenant.id, stragglers, "Drain window expired with requests in flight");
        }

        match self.provisioner.decommission(&tenant).await {
            Ok(()) => {
                if let Err(e) = self.catalog.set_status(&tenant.id, TenantStatus::Deleted).await {
                    error!(tenant = %tenant.id, error = %e, "Namespace dropped but tombstone update failed");
                    return;
                }
                let _ = self
                    .catalog
                    .record_event(TenantEvent::new(&tenant.id, "decommissioned", None))
                    .await;
            }
            Err(e) => {
                // Tenant stays in Deleting for operator follow-up; bindings
                // remain refused.
                error!(tenant = %tenant.id, error = %e, "Decommission failed");
                let _ = self
                    .catalog
                    .record_event(TenantEvent::new(&tenant.id, "decommission_failed", Some(e.to_string())))
                    .await;
            }
        }
    }

    /// Per-object-type row counts, read through the same scoped provider as
    /// ordinary requests so the isolation boundary is exercised, not
    /// bypassed.
    pub async fn stats(&self, id: &str) -> Result<TenantStatsResponse, ApiError> {
        let tenant = self
            .catalog
            .find(id)
            .await?
            .ok_or_else(|| ApiError::UnknownTenant(id.to_string()))?;
        if tenant.status != TenantStatus::Active {
            return Err(ApiError::TenantNotActive(tenant.id));
        }

        let _in_flight = self.active.begin(&tenant.id);
        let binding = TenantBinding::bind(tenant);
        self.provider
            .with_scoped(&binding, |handle| handle.object_counts())
            .await
    }

    /// Replay the object set of one tenant to a target version. Failure is
    /// flagged on this tenant alone.
    pub async fn migrate_tenant(&self, id: &str, target: usize) -> Result<usize, ApiError> {
        let tenant = self
            .catalog
            .find(id)
            .await?
            .ok_or_else(|| ApiError::UnknownTenant(id.to_string()))?;
        if !matches!(tenant.status, TenantStatus::Active | TenantStatus::Suspended) {
            return Err(ApiError::TenantNotActive(tenant.id));
        }

        match self.provisioner.migrate(&tenant, target).await {
            Ok(version) => {
                self.catalog
                    .set_object_set_version(&tenant.id, version as i64)
                    .await?;
                let _ = self
                    .catalog
                    .record_event(TenantEvent::new(&tenant.id, "migrated", Some(format!("v{version}"))))
                    .await;
                Ok(version)
            }
            Err(e) => {
                warn!(tenant = %tenant.id, error = %e, "Object-set replay failed for this tenant");
                let _ = self
                    .catalog
                    .record_event(TenantEvent::new(&tenant.id, "migration_failed", Some(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }
}
