use std::path::Path;
use anyhow::anyhow;
use anyhow::Result;
use include_dir::{include_dir, Dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::Migrations;
use tracing::{debug, info, warn};
use crate::data::audit::TenantEvent;
use crate::data::enums::TenantStatus;
use crate::data::error::ApiError;
use crate::data::tenant::Tenant;

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

macro_rules! db_do {
    ($pool:expr, $operation:expr) => {
        {
            let pool = $pool.clone();
            tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| {
                    anyhow!("DB pool error: {}", e)
                })?;
                $operation(&conn)
            }).await?
        }
    };
}

/// Registry of tenants, stored in the shared catalog database. Catalog rows
/// are visible regardless of any namespace binding and survive the namespace
/// as tombstones.
#[derive(Debug, Clone)]
pub struct TenantCatalog {
    pool: Pool<SqliteConnectionManager>,
}

impl TenantCatalog {
    pub fn new(catalog_path: &Path, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(catalog_path)
            .with_init(|connection| {
                connection.pragma_update(None, "foreign_keys", "ON")?;
                connection.pragma_update(None, "busy_timeout", "5000")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)?;
        let mut connection = pool.get()?;

        Self::migrate_database(&mut connection)?;

        Ok(Self { pool })
    }

    /// The catalog and the scoped-connection provider share one physical
    /// pool: a pooled connection serves catalog reads on `main` and tenant
    /// work through the attached namespace.
    pub(crate) fn shared_pool(&self) -> Pool<SqliteConnectionManager> {
        self.pool.clone()
    }

    fn migrate_database(conn: &mut Connection) -> Result<()> {
        let migrations = Migrations::from_directory(&MIGRATIONS_DIR)
            .map_err(|e| anyhow!("Failed to load catalog migrations: {e}"))?;
        migrations.to_latest(conn)?;
        debug!("Catalog database migrated to latest version");

        Ok(())
    }

    /// Insert a new tenant row with status Provisioning. Concurrent
    /// registrations racing on the same owner or namespace are decided by
    /// the catalog's uniqueness constraints, not by application locking.
    pub async fn register(&self, display_name: String, owner_email: String) -> Result<Tenant> {
        db_do!(self.pool, |conn: &Connection| {
            let tenant = Tenant::new(display_name, owner_email);
            let tx = conn.unchecked_transaction()?;
            let inserted = tx.execute(
                "INSERT INTO tenants (id, display_name, namespace, status, owner_email, object_set_version, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    tenant.id, tenant.display_name, tenant.namespace,
                    tenant.status as u8, tenant.owner_email,
                    tenant.object_set_version, tenant.created_at
                ],
            );
            match inserted {
                Ok(_) => {
                    Self::append_event(&tx, &TenantEvent::new(&tenant.id, "registered", None))?;
                    tx.commit()?;
                    info!(tenant = %tenant.id, namespace = %tenant.namespace, "Tenant registered");
                    Ok(tenant)
                }
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                    warn!(owner = %tenant.owner_email, "Registration rejected by uniqueness constraint");
                    Err(anyhow::Error::new(ApiError::DuplicateTenant(tenant.owner_email)))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Look up a tenant by id. Deleted tombstones are returned too; callers
    /// decide what a non-Active status means for them.
    pub async fn find(&self, id: &str) -> Result<Option<Tenant>> {
        let id = id.to_string();
        db_do!(self.pool, |conn: &Connection| {
            Ok(conn.query_row(
                "SELECT id, display_name, namespace, status, owner_email, object_set_version, created_at FROM tenants WHERE id = ?1",
                params![id],
                Self::row_to_tenant,
            ).optional()?)
        })
    }

    /// All tenants, optionally filtered by status, ordered by creation time.
    pub async fn list(&self, filter: Option<TenantStatus>) -> Result<Vec<Tenant>> {
        db_do!(self.pool, |conn: &Connection| {
            let query = match filter {
                Some(_) => "SELECT id, display_name, namespace, status, owner_email, object_set_version, created_at FROM tenants WHERE status = ?1 ORDER BY created_at, id",
                None => "SELECT id, display_name, namespace, status, owner_email, object_set_version, created_at FROM tenants ORDER BY created_at, id",
            };
            let mut stmt = conn.prepare(query)?;
            let rows = match filter {
                Some(status) => stmt.query_map(params![status as u8], Self::row_to_tenant)?,
                None => stmt.query_map([], Self::row_to_tenant)?,
            };

            let mut tenants = Vec::new();
            for tenant in rows {
                tenants.push(tenant?);
            }
            Ok(tenants)
        })
    }

    /// Apply a status transition, validating it against the lifecycle state
    /// machine inside one transaction. Returns the updated tenant.
    pub async fn set_status(&self, id: &str, new_status: TenantStatus) -> Result<Tenant> {
        let id = id.to_string();
        db_do!(self.pool, |conn: &Connection| {
            let tx = conn.unchecked_transaction()?;
            let mut tenant: Tenant = tx.query_row(
                "SELECT id, display_name, namespace, status, owner_email, object_set_version, created_at FROM tenants WHERE id = ?1",
                params![id],
                Self::row_to_tenant,
            ).optional()?
                .ok_or_else(|| anyhow::Error::new(ApiError::UnknownTenant(id.clone())))?;

            if !tenant.status.can_transition_to(new_status) {
                return Err(anyhow::Error::new(ApiError::InvalidStateTransition(
                    format!("tenant {id}: {} -> {new_status} is not allowed", tenant.status),
                )));
            }

            tx.execute(
                "UPDATE tenants SET status = ?1 WHERE id = ?2",
                params![new_status as u8, id],
            )?;
            Self::append_event(&tx, &TenantEvent::new(&id, "status_changed", Some(format!("{} -> {new_status}", tenant.status))))?;
            tx.commit()?;

            info!(tenant = %id, from = %tenant.status, to = %new_status, "Tenant status changed");
            tenant.status = new_status;
            Ok(tenant)
        })
    }

    /// Rename a tenant.
    pub async fn set_display_name(&self, id: &str, display_name: &str) -> Result<()> {
        let id = id.to_string();
        let display_name = display_name.to_string();
        db_do!(self.pool, |conn: &Connection| {
            let changed = conn.execute(
                "UPDATE tenants SET display_name = ?1 WHERE id = ?2",
                params![display_name, id],
            )?;
            if changed == 0 {
                return Err(anyhow::Error::new(ApiError::UnknownTenant(id.clone())));
            }
            Ok(())
        })
    }

    /// Record the object-set version replayed into a tenant's namespace.
    pub async fn set_object_set_version(&self, id: &str, version: i64) -> Result<()> {
        let id = id.to_string();
        db_do!(self.pool, |conn: &Connection| {
            conn.execute(
                "UPDATE tenants SET object_set_version = ?1 WHERE id = ?2",
                params![version, id],
            )?;
            Ok(())
        })
    }

    /// Append a lifecycle audit event.
    pub async fn record_event(&self, event: TenantEvent) -> Result<()> {
        db_do!(self.pool, |conn: &Connection| {
            Self::append_event(conn, &event)
        })
    }

    /// Audit trail for one tenant, oldest first.
    pub async fn events(&self, tenant_id: &str) -> Result<Vec<TenantEvent>> {
        let tenant_id = tenant_id.to_string();
        db_do!(self.pool, |conn: &Connection| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, event_type, detail, created_at FROM tenant_events WHERE tenant_id = ?1 ORDER BY id"
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(TenantEvent {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    event_type: row.get(2)?,
                    detail: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;

            let mut events = Vec::new();
            for event in rows {
                events.push(event?);
            }
            Ok(events)
        })
    }

    fn append_event(conn: &Connection, event: &TenantEvent) -> Result<()> {
        conn.execute(
            "INSERT INTO tenant_events (tenant_id, event_type, detail, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![event.tenant_id, event.event_type, event.detail, event.created_at],
        )?;
        Ok(())
    }

    fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
        Ok(Tenant {
            id: row.get(0)?,
            display_name: row.get(1)?,
            namespace: row.get(2)?,
            status: row.get(3)?,
            owner_email: row.get(4)?,
            object_set_version: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
