use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use rusqlite_migration::{Migrations, M};
use tracing::{info, warn};
use crate::data::enums::ProvisionFault;
use crate::data::error::ApiError;
use crate::data::objects::TenantUser;
use crate::data::tenant::Tenant;
use crate::tenancy::namespace_path;

/// Versioned set of objects that must exist inside every tenant's
/// namespace. Created in full at provisioning, replayed per tenant on
/// migration. Forward-only.
static OBJECT_SET: Lazy<Migrations<'static>> = Lazy::new(|| {
    Migrations::new(vec![
        M::up(r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
        "#),
        M::up(r#"
            CREATE TABLE quizzes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                topic TEXT,
                difficulty TEXT,
                user_id INTEGER NOT NULL REFERENCES users (id),
                created_at INTEGER NOT NULL
            );
            CREATE TABLE questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id INTEGER NOT NULL REFERENCES quizzes (id) ON DELETE CASCADE,
                prompt TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                options TEXT,
                position INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX idx_questions_quiz ON questions (quiz_id);
        "#),
        M::up(r#"
            CREATE TABLE flashcard_decks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                user_id INTEGER NOT NULL REFERENCES users (id),
                created_at INTEGER NOT NULL
            );
            CREATE TABLE flashcards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                deck_id INTEGER NOT NULL REFERENCES flashcard_decks (id) ON DELETE CASCADE,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX idx_flashcards_deck ON flashcards (deck_id);
        "#),
    ])
});

/// Latest object-set version; freshly provisioned namespaces start here.
pub const OBJECT_SET_VERSION: usize = 3;

/// Creates and removes the physical isolation boundary of a tenant: the
/// namespace database, its object set and the bootstrap AdminPrincipal.
///
/// Operations are serialized per tenant through a lock registry and run
/// fully parallel across tenants.
pub struct SchemaProvisioner {
    ns_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    fault: Mutex<Option<ProvisionFault>>,
}

impl SchemaProvisioner {
    pub fn new(ns_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&ns_dir)?;
        Ok(Self {
            ns_dir,
            locks: Mutex::new(HashMap::new()),
            fault: Mutex::new(None),
        })
    }

    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        namespace_path(&self.ns_dir, namespace)
    }

    /// Test hook: simulate a fault at a fixed point of the next
    /// provisioning runs.
    pub fn set_fault(&self, fault: Option<ProvisionFault>) {
        *self.fault.lock() = fault;
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Create the tenant's namespace: database file, full object set,
    /// AdminPrincipal row. Effectively atomic; any failure removes the
    /// namespace file entirely so no half-created namespace survives.
    pub async fn provision(&self, tenant: &Tenant, admin: TenantUser) -> Result<(), ApiError> {
        let lock = self.tenant_lock(&tenant.id);
        let _serialized = lock.lock().await;

        let path = self.namespace_path(&tenant.namespace);
        let fault = *self.fault.lock();
        let tenant = tenant.clone();

        tokio::task::spawn_blocking(move || {
            // A leftover file from a crashed earlier attempt is discarded;
            // the retry rebuilds the namespace from scratch.
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| ApiError::ProvisionFailure(format!("stale namespace file: {e}")))?;
            }

            match Self::build_namespace(&path, &admin, fault) {
                Ok(()) => {
                    info!(tenant = %tenant.id, namespace = %tenant.namespace, "Namespace provisioned");
                    Ok(())
                }
                Err(e) => {
                    let _ = fs::remove_file(&path);
                    warn!(tenant = %tenant.id, namespace = %tenant.namespace, error = %e, "Provisioning failed; namespace rolled back");
                    Err(ApiError::ProvisionFailure(format!(
                        "provisioning tenant {} failed: {e}",
                        tenant.id
                    )))
                }
            }
        })
        .await
        .map_err(|e| ApiError::Other(format!("provision task failed: {e}")))?
    }

    fn build_namespace(path: &PathBuf, admin: &TenantUser, fault: Option<ProvisionFault>) -> Result<()> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        if fault == Some(ProvisionFault::BeforeObjectSet) {
            bail!("injected fault before object set");
        }
        OBJECT_SET.to_latest(&mut conn)?;

        if fault == Some(ProvisionFault::BeforeAdminPrincipal) {
            bail!("injected fault before admin principal");
        }
        conn.execute(
            "INSERT INTO users (email, username, password_hash, is_active, is_admin, created_at) VALUES (?1, ?2, ?3, 1, 1, ?4)",
            params![admin.email, admin.username, admin.password_hash, admin.created_at],
        )?;

        Ok(())
    }

    /// Drop the tenant's namespace and everything in it. Irrecoverable; the
    /// catalog row stays behind as a tombstone so the namespace name is
    /// never reissued. Idempotent if the namespace is already gone.
    pub async fn decommission(&self, tenant: &Tenant) -> Result<(), ApiError> {
        let lock = self.tenant_lock(&tenant.id);
        let _serialized = lock.lock().await;

        let path = self.namespace_path(&tenant.namespace);
        let tenant = tenant.clone();

        tokio::task::spawn_blocking(move || {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(tenant = %tenant.id, namespace = %tenant.namespace, "Namespace decommissioned");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ApiError::Other(format!(
                    "decommissioning namespace {} failed: {e}",
                    tenant.namespace
                ))),
            }
        })
        .await
        .map_err(|e| ApiError::Other(format!("decommission task failed: {e}")))?
    }

    /// Replay the object set of one namespace forward to `target`. A
    /// failure here flags this tenant only; other tenants keep running on
    /// their own versions.
    pub async fn migrate(&self, tenant: &Tenant, target: usize) -> Result<usize, ApiError> {
        let lock = self.tenant_lock(&tenant.id);
        let _serialized = lock.lock().await;

        let path = self.namespace_path(&tenant.namespace);
        if !path.exists() {
            return Err(ApiError::ProvisionFailure(format!(
                "namespace {} has no backing database",
                tenant.namespace
            )));
        }
        let tenant = tenant.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path).map_err(ApiError::Database)?;
            let current: i64 = conn
                .pragma_query_value(None, "user_version", |row| row.get(0))
                .map_err(ApiError::Database)?;

            if target > OBJECT_SET_VERSION || (target as i64) < current {
                return Err(ApiError::InvalidStateTransition(format!(
                    "object set of {} is at v{current}; cannot replay to v{target}",
                    tenant.namespace
                )));
            }

            OBJECT_SET
                .to_version(&mut conn, target)
                .map_err(|e| ApiError::Other(e.to_string()))?;
            info!(tenant = %tenant.id, namespace = %tenant.namespace, version = target, "Object set replayed");
            Ok(target)
        })
        .await
        .map_err(|e| ApiError::Other(format!("migrate task failed: {e}")))?
    }
}
