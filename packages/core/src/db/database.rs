//! Database Connection Management
//!
//! This module provides the core database connection, schema migration and
//! raw SQL operations for the Rubix node store, using libsql (embedded,
//! SQLite-compatible).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf (usually `{data_dir}/rubix.db`)
//! - **Forward migrations**: Numbered, tracked by `PRAGMA user_version`
//! - **WAL mode**: Write-Ahead Logging so readers never block the writer
//! - **Epoch milliseconds**: All timestamps stored as INTEGER
//!
//! # Database Connection Patterns
//!
//! **Use `connect_with_timeout()` in async functions.** Every operation opens
//! its own connection with a 5-second busy timeout, so concurrent writers
//! wait for the lock instead of failing with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use rubix_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let db_service = DatabaseService::new(PathBuf::from("./data/rubix.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Row Format
//!
//! Every `SELECT` issued here returns the columns listed in [`NODE_COLUMNS`],
//! in that order. `LibsqlStore` converts rows to `Node` based on it.

use crate::db::error::DatabaseError;
use crate::db::migrations::{self, LATEST_SCHEMA_VERSION};
use crate::models::SortOrderUpdate;
use libsql::{params, Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every node `SELECT`
pub const NODE_COLUMNS: &str = "id, parent_id, node_type, title, content, creation_date, \
     modified_date, aspect_ratio, sort_order, thumbnail_path, preview_path, original_path, \
     dominant_color, is_archived, is_trashed, is_pinned";

/// Escape character used by [`DatabaseService::db_search_nodes`]
pub const LIKE_ESCAPE: char = '\\';

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use rubix_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/rubix.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for a full-row upsert (avoids too-many-arguments lint)
pub struct DbNodeParams<'a> {
    pub id: &'a str,
    pub parent_id: Option<&'a str>,
    pub node_type: &'a str,
    pub title: &'a str,
    pub content: Option<&'a str>,
    pub creation_date: i64,
    pub modified_date: i64,
    pub aspect_ratio: f64,
    pub sort_order: i64,
    pub thumbnail_path: Option<&'a str>,
    pub preview_path: Option<&'a str>,
    pub original_path: Option<&'a str>,
    pub dominant_color: Option<i64>,
    pub is_archived: bool,
    pub is_trashed: bool,
    pub is_pinned: bool,
}

/// Lifecycle flag update applied by a single statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleUpdate {
    /// `is_archived = 1`
    Archive,
    /// `is_trashed = 1`
    Trash,
    /// `is_archived = 0, is_trashed = 0`
    Restore,
}

impl LifecycleUpdate {
    fn set_clause(&self) -> &'static str {
        match self {
            LifecycleUpdate::Archive => "is_archived = 1",
            LifecycleUpdate::Trash => "is_trashed = 1",
            LifecycleUpdate::Restore => "is_archived = 0, is_trashed = 0",
        }
    }
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and the busy timeout
    /// 4. Apply every pending migration
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - A migration fails (that migration is rolled back)
    /// - The file was written by a newer schema version
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements may return rows, so they go through `query()`
    /// instead of `execute()`. The first row is stepped so the pragma
    /// actually runs.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let mut rows = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = rows.next().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Configure the connection and bring the schema up to date
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        self.migrate(&conn).await?;

        // Flush the freshly created schema so other connections see it
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Read `PRAGMA user_version`
    pub async fn schema_version(&self) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        Self::read_user_version(&conn).await
    }

    async fn read_user_version(conn: &libsql::Connection) -> Result<i64, DatabaseError> {
        let mut rows = conn.query("PRAGMA user_version", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read user_version: {}", e))
        })?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /// Apply every migration above the stored `user_version`
    ///
    /// Each migration runs in its own `BEGIN IMMEDIATE` transaction together
    /// with the version bump, so a failure leaves the database at the last
    /// fully applied version.
    async fn migrate(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let current = Self::read_user_version(conn).await?;

        if current > LATEST_SCHEMA_VERSION {
            return Err(DatabaseError::UnsupportedSchemaVersion {
                found: current,
                supported: LATEST_SCHEMA_VERSION,
            });
        }

        for migration in migrations::pending(current) {
            conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
                DatabaseError::migration_failed(
                    migration.version,
                    format!("Failed to begin transaction: {}", e),
                )
            })?;

            for statement in migration.statements {
                if let Err(e) = conn.execute(statement, ()).await {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::migration_failed(
                        migration.version,
                        e.to_string(),
                    ));
                }
            }

            let bump = format!("PRAGMA user_version = {}", migration.version);
            if let Err(e) = self.execute_pragma(conn, &bump).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(DatabaseError::migration_failed(
                    migration.version,
                    e.to_string(),
                ));
            }

            if let Err(e) = conn.execute("COMMIT", ()).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(DatabaseError::migration_failed(
                    migration.version,
                    format!("Failed to commit: {}", e),
                ));
            }

            tracing::info!(
                version = migration.version,
                description = migration.description,
                "Applied database migration"
            );
        }

        Ok(())
    }

    /// Get a raw database connection
    ///
    /// Only for synchronous, single-threaded contexts where the connection is
    /// not held across `.await` points. Prefer `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait and retry
    /// instead of failing immediately when the database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    //
    // NODE STORE OPERATIONS
    // Raw SQL, wrapped by the NodeStore implementation in `libsql_store`.
    //

    /// Insert or replace a full node row
    ///
    /// Idempotent: writing the same params twice leaves one identical row.
    ///
    /// # Returns
    ///
    /// Number of affected rows (always 1 on success)
    pub async fn db_upsert_node(&self, params: DbNodeParams<'_>) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO nodes (id, parent_id, node_type, title, content, creation_date,
                modified_date, aspect_ratio, sort_order, thumbnail_path, preview_path,
                original_path, dominant_color, is_archived, is_trashed, is_pinned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                node_type = excluded.node_type,
                title = excluded.title,
                content = excluded.content,
                creation_date = excluded.creation_date,
                modified_date = excluded.modified_date,
                aspect_ratio = excluded.aspect_ratio,
                sort_order = excluded.sort_order,
                thumbnail_path = excluded.thumbnail_path,
                preview_path = excluded.preview_path,
                original_path = excluded.original_path,
                dominant_color = excluded.dominant_color,
                is_archived = excluded.is_archived,
                is_trashed = excluded.is_trashed,
                is_pinned = excluded.is_pinned",
            params![
                params.id,
                params.parent_id,
                params.node_type,
                params.title,
                params.content,
                params.creation_date,
                params.modified_date,
                params.aspect_ratio,
                params.sort_order,
                params.thumbnail_path,
                params.preview_path,
                params.original_path,
                params.dominant_color,
                params.is_archived as i64,
                params.is_trashed as i64,
                params.is_pinned as i64,
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to upsert node {}: {}", params.id, e))
        })
    }

    /// Get a single node row by ID
    ///
    /// # Returns
    ///
    /// `Ok(Some(row))` if found, `Ok(None)` if not
    pub async fn db_get_node(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut rows = conn
            .query(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to query node {}: {}", id, e))
            })?;

        Ok(rows.next().await?)
    }

    /// Active children of a parent (`None` = root level)
    ///
    /// `parent_id IS ?1` matches the NULL root case as well as a concrete id.
    /// Ordered pinned-first, then by `sort_order`, ties broken by `id`.
    pub async fn db_list_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                "SELECT {} FROM nodes
                 WHERE parent_id IS ?1 AND is_archived = 0 AND is_trashed = 0
                 ORDER BY is_pinned DESC, sort_order ASC, id ASC",
                NODE_COLUMNS
            ),
            params![parent_id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to list children: {}", e)))
    }

    /// Archived (and not trashed) nodes, newest sort key first
    pub async fn db_list_archived(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                "SELECT {} FROM nodes
                 WHERE is_archived = 1 AND is_trashed = 0
                 ORDER BY sort_order DESC, id ASC",
                NODE_COLUMNS
            ),
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to list archived: {}", e)))
    }

    /// Trashed nodes (archived or not), newest sort key first
    pub async fn db_list_trashed(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                "SELECT {} FROM nodes
                 WHERE is_trashed = 1
                 ORDER BY sort_order DESC, id ASC",
                NODE_COLUMNS
            ),
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to list trashed: {}", e)))
    }

    /// Substring search over title and content of active nodes
    ///
    /// # Arguments
    ///
    /// * `pattern` - A complete LIKE pattern (`%…%`) whose literal `%`, `_`
    ///   and `\` are already escaped with [`LIKE_ESCAPE`]
    pub async fn db_search_nodes(&self, pattern: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                "SELECT {} FROM nodes
                 WHERE (title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\')
                   AND is_archived = 0 AND is_trashed = 0
                 ORDER BY creation_date DESC, id ASC",
                NODE_COLUMNS
            ),
            params![pattern],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to search nodes: {}", e)))
    }

    /// Rewrite `parent_id`
    pub async fn db_set_parent(
        &self,
        id: &str,
        parent_id: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET parent_id = ?1 WHERE id = ?2",
            params![parent_id, id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to move node {}: {}", id, e)))
    }

    pub async fn db_set_sort_order(&self, id: &str, sort_order: i64) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET sort_order = ?1 WHERE id = ?2",
            params![sort_order, id],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to set sort order of {}: {}", id, e))
        })
    }

    pub async fn db_set_pinned(&self, id: &str, pinned: bool) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET is_pinned = ?1 WHERE id = ?2",
            params![pinned as i64, id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to pin node {}: {}", id, e)))
    }

    /// Flip `is_pinned` in place (single statement, no read-modify-write)
    pub async fn db_toggle_pinned(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET is_pinned = 1 - is_pinned WHERE id = ?1",
            params![id],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to toggle pin of {}: {}", id, e))
        })
    }

    /// Apply a lifecycle flag update
    pub async fn db_update_lifecycle(
        &self,
        id: &str,
        update: LifecycleUpdate,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            &format!("UPDATE nodes SET {} WHERE id = ?1", update.set_clause()),
            params![id],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to apply {:?} to node {}: {}",
                update, id, e
            ))
        })
    }

    /// Ids of `root_id` and every node below it
    ///
    /// `UNION` (not `UNION ALL`) keeps the recursion finite on cyclic data.
    /// Returns an empty vector when `root_id` does not exist.
    pub async fn db_subtree_ids(&self, root_id: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut rows = conn
            .query(
                "WITH RECURSIVE subtree(id) AS (
                    SELECT id FROM nodes WHERE id = ?1
                    UNION
                    SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
                 )
                 SELECT id FROM subtree",
                params![root_id],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to collect subtree: {}", e))
            })?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }

        Ok(ids)
    }

    /// Delete rows by id in one transaction
    ///
    /// # Returns
    ///
    /// Total number of deleted rows
    ///
    /// # Errors
    ///
    /// Any failing DELETE rolls back the whole batch.
    pub async fn db_delete_nodes(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let mut deleted = 0;
        for id in ids {
            match conn
                .execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])
                .await
            {
                Ok(count) => deleted += count,
                Err(e) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to delete node {}: {}",
                        id, e
                    )));
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        Ok(deleted)
    }

    /// Apply a reorder batch atomically
    ///
    /// Readers on other connections see either none or all of the new keys.
    ///
    /// # Returns
    ///
    /// Total number of updated rows
    pub async fn db_apply_sort_orders(
        &self,
        updates: &[SortOrderUpdate],
    ) -> Result<u64, DatabaseError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let mut updated = 0;
        for update in updates {
            match conn
                .execute(
                    "UPDATE nodes SET sort_order = ?1 WHERE id = ?2",
                    params![update.sort_order, update.id.as_str()],
                )
                .await
            {
                Ok(count) => updated += count,
                Err(e) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to reorder node {}: {}",
                        update.id, e
                    )));
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        Ok(updated)
    }
}
