use std::path::PathBuf;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{error, trace};
use crate::data::api::TenantStatsResponse;
use crate::data::error::ApiError;
use crate::data::objects::TenantUser;
use crate::tenancy::context::TenantBinding;
use crate::tenancy::namespace_path;

/// Hands out database handles pre-scoped to the bound tenant's namespace.
///
/// Strategy: shared physical pool, namespace entered with
/// `ATTACH DATABASE .. AS tenant` on acquire and left with `DETACH` on
/// release. The invariants relied on are (a) `ScopedHandle` detaches in
/// Drop before the connection returns to the pool, and (b) acquire
/// self-checks for a leftover attachment and fails the request with
/// `IsolationViolation` instead of reusing a connection whose release
/// contract was broken.
#[derive(Clone)]
pub struct ScopedConnectionProvider {
    pool: Pool<SqliteConnectionManager>,
    ns_dir: PathBuf,
}

impl ScopedConnectionProvider {
    pub fn new(pool: Pool<SqliteConnectionManager>, ns_dir: PathBuf) -> Self {
        Self { pool, ns_dir }
    }

    /// Acquire a handle scoped to the bound tenant's namespace. Fails
    /// `NoTenantBound` when called without a binding; there is no default
    /// namespace to fall back to.
    pub fn acquire(&self, binding: &TenantBinding) -> Result<ScopedHandle, ApiError> {
        let ctx = binding.context()?;
        let conn = self.pool.get()?;

        // Release-contract self-check: a pooled connection must come back
        // namespace-free. A leftover attachment aborts the request loudly.
        let leftover: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pragma_database_list WHERE name = 'tenant'",
            [],
            |row| row.get(0),
        )?;
        if leftover > 0 {
            error!(
                tenant = %ctx.tenant.id,
                "Pooled connection still had a namespace attached on acquire"
            );
            let _ = conn.execute_batch("DETACH DATABASE tenant");
            return Err(ApiError::IsolationViolation(
                "pooled connection returned with a stale namespace attachment".to_string(),
            ));
        }

        let path = namespace_path(&self.ns_dir, &ctx.tenant.namespace);
        if !path.exists() {
            // ATTACH would silently create an empty database here, which is
            // exactly the silent fallback this provider must never perform.
            error!(tenant = %ctx.tenant.id, namespace = %ctx.tenant.namespace, "Namespace has no backing database");
            return Err(ApiError::IsolationViolation(format!(
                "namespace {} has no backing database",
                ctx.tenant.namespace
            )));
        }

        conn.execute(
            "ATTACH DATABASE ?1 AS tenant",
            params![path.to_string_lossy().into_owned()],
        )?;
        trace!(tenant = %ctx.tenant.id, namespace = %ctx.tenant.namespace, "Namespace attached");

        Ok(ScopedHandle {
            conn,
            namespace: ctx.tenant.namespace.clone(),
            tenant_id: ctx.tenant.id.clone(),
        })
    }

    /// The collaborator accessor: run one unit of scoped work. Acquire,
    /// closure and release all execute inside a single blocking task, so the
    /// namespace is detached even if the awaiting request is cancelled
    /// mid-handler.
    pub async fn with_scoped<T, F>(&self, binding: &TenantBinding, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ScopedHandle) -> Result<T, ApiError> + Send + 'static,
    {
        // Fail unbound callers before spawning any work.
        binding.context()?;

        let provider = self.clone();
        let binding = binding.clone();
        tokio::task::spawn_blocking(move || {
            let handle = provider.acquire(&binding)?;
            f(&handle)
            // handle drops here: namespace detached before pool return
        })
        .await
        .map_err(|e| ApiError::Other(format!("scoped task failed: {e}")))?
    }
}

/// A database handle valid only within one tenant's namespace. All SQL it
/// issues is namespace-qualified with the fixed `tenant.` alias; callers
/// never name a namespace. Detaches on Drop, on every exit path.
pub struct ScopedHandle {
    conn: PooledConnection<SqliteConnectionManager>,
    namespace: String,
    tenant_id: String,
}

impl ScopedHandle {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Row counts per object type. Objects from a newer object-set version
    /// than this namespace has replayed count as zero.
    pub fn object_counts(&self) -> Result<TenantStatsResponse, ApiError> {
        Ok(TenantStatsResponse {
            users: self.count_table("users")?,
            quizzes: self.count_table("quizzes")?,
            questions: self.count_table("questions")?,
            flashcard_decks: self.count_table("flashcard_decks")?,
            flashcards: self.count_table("flashcards")?,
        })
    }

    fn count_table(&self, table: &str) -> Result<i64, ApiError> {
        let present: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tenant.sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        if present == 0 {
            return Ok(0);
        }
        let query = match table {
            "users" => "SELECT COUNT(*) FROM tenant.users",
            "quizzes" => "SELECT COUNT(*) FROM tenant.quizzes",
            "questions" => "SELECT COUNT(*) FROM tenant.questions",
            "flashcard_decks" => "SELECT COUNT(*) FROM tenant.flashcard_decks",
            "flashcards" => "SELECT COUNT(*) FROM tenant.flashcards",
            _ => return Err(ApiError::Other(format!("unknown object type {table}"))),
        };
        Ok(self.conn.query_row(query, [], |row| row.get(0))?)
    }

    /// Insert a user row into the bound namespace.
    pub fn insert_user(&self, user: &TenantUser) -> Result<i64, ApiError> {
        let inserted = self.conn.execute(
            "INSERT INTO tenant.users (email, username, password_hash, is_active, is_admin, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.email, user.username, user.password_hash,
                user.is_active, user.is_admin, user.created_at
            ],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Err(ApiError::Other(format!("user {} already exists in this tenant", user.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All users of the bound namespace.
    pub fn list_users(&self) -> Result<Vec<TenantUser>, ApiError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, username, is_active, is_admin, created_at FROM tenant.users ORDER BY id"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TenantUser {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password_hash: None,
                is_active: row.get(3)?,
                is_admin: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut users = Vec::new();
        for user in rows {
            users.push(user?);
        }
        Ok(users)
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        // Mandatory reset: the physical connection must never re-enter the
        // pool with the namespace still attached.
        if let Err(e) = self.conn.execute_batch("DETACH DATABASE tenant") {
            error!(
                tenant = %self.tenant_id,
                namespace = %self.namespace,
                error = %e,
                "Failed to detach namespace on release"
            );
        } else {
            trace!(tenant = %self.tenant_id, namespace = %self.namespace, "Namespace detached");
        }
    }
}
