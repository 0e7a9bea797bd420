//! LibsqlStore - NodeStore Implementation for the libsql Backend
//!
//! `LibsqlStore` wraps `DatabaseService` and delegates every operation to its
//! `db_*` methods. On top of the raw SQL it adds two things:
//!
//! 1. **Row Conversion**: `libsql::Row` → `Node`
//! 2. **Change Events**: one `StoreChange` per committed write that affected
//!    at least one row, sent after the write returns
//!
//! # Examples
//!
//! ```rust,no_run
//! use rubix_core::db::{DatabaseService, LibsqlStore, NodeStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/rubix.db")).await?);
//!     let store = LibsqlStore::new(db);
//!
//!     let mut changes = store.subscribe();
//!     store.move_to_trash("node-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::database::{DbNodeParams, LifecycleUpdate, LIKE_ESCAPE};
use crate::db::events::{StoreChange, StoreOperation};
use crate::db::node_store::NodeStore;
use crate::db::DatabaseService;
use crate::models::time::from_millis;
use crate::models::{Node, NodeType, SortOrderUpdate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::Row;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default capacity of the change broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// NodeStore implementation backed by a local libsql database
pub struct LibsqlStore {
    /// Underlying database service (raw SQL operations)
    db: Arc<DatabaseService>,

    /// Broadcast channel for change notifications
    event_tx: broadcast::Sender<StoreChange>,
}

impl LibsqlStore {
    /// Create a new store with the default event channel capacity
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self::with_event_capacity(db, DEFAULT_EVENT_CAPACITY)
    }

    /// Create a new store with a custom event channel capacity
    ///
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged` and are expected to re-query.
    pub fn with_event_capacity(db: Arc<DatabaseService>, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { db, event_tx }
    }

    /// Access the wrapped database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Emit a change if the write touched any row
    ///
    /// Send errors (no subscribers) are ignored.
    fn emit_if_changed(&self, affected: u64, change: StoreChange) {
        if affected == 0 {
            return;
        }

        tracing::debug!(
            event = change.event_type(),
            nodes = change.node_ids.len(),
            "Store change"
        );
        let _ = self.event_tx.send(change);
    }

    /// Convert libsql::Row to Node model
    ///
    /// Expects the column order of [`crate::db::database::NODE_COLUMNS`].
    fn row_to_node(row: &Row) -> Result<Node> {
        let id: String = row.get(0).context("Failed to get id")?;
        let parent_id: Option<String> = row.get(1).context("Failed to get parent_id")?;
        let node_type: String = row.get(2).context("Failed to get node_type")?;
        let title: String = row.get(3).context("Failed to get title")?;
        let content: Option<String> = row.get(4).context("Failed to get content")?;
        let creation_date: i64 = row.get(5).context("Failed to get creation_date")?;
        let modified_date: i64 = row.get(6).context("Failed to get modified_date")?;
        let aspect_ratio: f64 = row.get(7).context("Failed to get aspect_ratio")?;
        let sort_order: i64 = row.get(8).context("Failed to get sort_order")?;
        let thumbnail_path: Option<String> =
            row.get(9).context("Failed to get thumbnail_path")?;
        let preview_path: Option<String> = row.get(10).context("Failed to get preview_path")?;
        let original_path: Option<String> =
            row.get(11).context("Failed to get original_path")?;
        let dominant_color: Option<i64> = row.get(12).context("Failed to get dominant_color")?;
        let is_archived: i64 = row.get(13).context("Failed to get is_archived")?;
        let is_trashed: i64 = row.get(14).context("Failed to get is_trashed")?;
        let is_pinned: i64 = row.get(15).context("Failed to get is_pinned")?;

        let node_type: NodeType = node_type
            .parse()
            .with_context(|| format!("Node {} has an unknown type", id))?;

        Ok(Node {
            id,
            parent_id,
            node_type,
            title,
            content,
            creation_date: from_millis(creation_date),
            modified_date: from_millis(modified_date),
            aspect_ratio,
            sort_order,
            thumbnail_path: thumbnail_path.map(PathBuf::from),
            preview_path: preview_path.map(PathBuf::from),
            original_path: original_path.map(PathBuf::from),
            dominant_color: dominant_color.map(|c| c as u32),
            is_archived: is_archived != 0,
            is_trashed: is_trashed != 0,
            is_pinned: is_pinned != 0,
        })
    }

    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    async fn update_lifecycle(
        &self,
        id: &str,
        update: LifecycleUpdate,
        operation: StoreOperation,
    ) -> Result<u64> {
        let affected = self
            .db
            .db_update_lifecycle(id, update)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update lifecycle: {}", e))?;

        self.emit_if_changed(affected, StoreChange::single(operation, id));
        Ok(affected)
    }
}

/// Build a `%text%` LIKE pattern matching `text` literally
///
/// `%`, `_` and the escape character itself are prefixed with
/// [`LIKE_ESCAPE`].
pub fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn path_str(path: &Option<PathBuf>) -> Option<&str> {
    path.as_deref().and_then(|p| p.to_str())
}

#[async_trait]
impl NodeStore for LibsqlStore {
    async fn list_children(&self, parent_id: Option<&str>) -> Result<Vec<Node>> {
        let rows = self
            .db
            .db_list_children(parent_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get children: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn list_archived(&self) -> Result<Vec<Node>> {
        let rows = self
            .db
            .db_list_archived()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get archived nodes: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn list_trashed(&self) -> Result<Vec<Node>> {
        let rows = self
            .db
            .db_list_trashed()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get trashed nodes: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        match self
            .db
            .db_get_node(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get node: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn search(&self, text: &str) -> Result<Vec<Node>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .db
            .db_search_nodes(&like_pattern(text))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to search nodes: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn upsert_node(&self, node: Node) -> Result<()> {
        for path in node.asset_paths() {
            if path.to_str().is_none() {
                anyhow::bail!("Asset path of node {} is not valid UTF-8: {:?}", node.id, path);
            }
        }

        let params = DbNodeParams {
            id: &node.id,
            parent_id: node.parent_id.as_deref(),
            node_type: node.node_type.as_str(),
            title: &node.title,
            content: node.content.as_deref(),
            creation_date: node.creation_date.timestamp_millis(),
            modified_date: node.modified_date.timestamp_millis(),
            aspect_ratio: node.aspect_ratio,
            sort_order: node.sort_order,
            thumbnail_path: path_str(&node.thumbnail_path),
            preview_path: path_str(&node.preview_path),
            original_path: path_str(&node.original_path),
            dominant_color: node.dominant_color.map(i64::from),
            is_archived: node.is_archived,
            is_trashed: node.is_trashed,
            is_pinned: node.is_pinned,
        };

        let affected = self
            .db
            .db_upsert_node(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to upsert node: {}", e))?;

        self.emit_if_changed(
            affected,
            StoreChange::single(StoreOperation::Upserted, &node.id),
        );
        Ok(())
    }

    async fn set_parent(&self, id: &str, parent_id: Option<&str>) -> Result<u64> {
        let affected = self
            .db
            .db_set_parent(id, parent_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to move node: {}", e))?;

        self.emit_if_changed(affected, StoreChange::single(StoreOperation::Moved, id));
        Ok(affected)
    }

    async fn set_sort_order(&self, id: &str, sort_order: i64) -> Result<u64> {
        let affected = self
            .db
            .db_set_sort_order(id, sort_order)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set sort order: {}", e))?;

        self.emit_if_changed(affected, StoreChange::single(StoreOperation::Reordered, id));
        Ok(affected)
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<u64> {
        let affected = self
            .db
            .db_set_pinned(id, pinned)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to pin node: {}", e))?;

        self.emit_if_changed(affected, StoreChange::single(StoreOperation::Pinned, id));
        Ok(affected)
    }

    async fn toggle_pinned(&self, id: &str) -> Result<u64> {
        let affected = self
            .db
            .db_toggle_pinned(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to toggle pin: {}", e))?;

        self.emit_if_changed(affected, StoreChange::single(StoreOperation::Pinned, id));
        Ok(affected)
    }

    async fn move_to_archive(&self, id: &str) -> Result<u64> {
        self.update_lifecycle(id, LifecycleUpdate::Archive, StoreOperation::Archived)
            .await
    }

    async fn move_to_trash(&self, id: &str) -> Result<u64> {
        self.update_lifecycle(id, LifecycleUpdate::Trash, StoreOperation::Trashed)
            .await
    }

    async fn restore(&self, id: &str) -> Result<u64> {
        self.update_lifecycle(id, LifecycleUpdate::Restore, StoreOperation::Restored)
            .await
    }

    async fn delete_nodes(&self, ids: &[String]) -> Result<u64> {
        let affected = self
            .db
            .db_delete_nodes(ids)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete nodes: {}", e))?;

        self.emit_if_changed(
            affected,
            StoreChange::new(StoreOperation::Deleted, ids.to_vec()),
        );
        Ok(affected)
    }

    async fn apply_sort_orders(&self, updates: &[SortOrderUpdate]) -> Result<u64> {
        let affected = self
            .db
            .db_apply_sort_orders(updates)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to apply sort orders: {}", e))?;

        self.emit_if_changed(
            affected,
            StoreChange::new(
                StoreOperation::Reordered,
                updates.iter().map(|u| u.id.clone()).collect(),
            ),
        );
        Ok(affected)
    }

    async fn subtree_ids(&self, root_id: &str) -> Result<Vec<String>> {
        self.db
            .db_subtree_ids(root_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to collect subtree: {}", e))
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "libsql_store_test.rs"]
mod libsql_store_test;
