//! NodeStore Trait - Database Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! nodes. Services (`NodeService`, `HierarchyService`) depend on the trait,
//! not on libsql, so a different backend can be swapped in without touching
//! business logic.
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between the services and the database implementation
//! - **Change Notification**: Every committed write that affected rows emits one
//!   [`StoreChange`] on a broadcast channel exposed by [`NodeStore::subscribe`]
//! - **No Validation**: The store persists what it is given; hierarchy and
//!   lifecycle rules live in the service layer
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async
//! 2. **Ownership Semantics**: `upsert_node` takes the node by value
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//! 4. **Silent Misses**: Updates scoped by id return the affected row count;
//!    zero is not an error
//!
//! # Examples
//!
//! ```rust,no_run
//! use rubix_core::db::{DatabaseService, LibsqlStore, NodeStore};
//! use rubix_core::models::Node;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/rubix.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(LibsqlStore::new(db));
//!
//!     let folder = Node::folder("Trip", None);
//!     store.upsert_node(folder.clone()).await?;
//!
//!     let roots = store.list_children(None).await?;
//!     assert!(roots.iter().any(|n| n.id == folder.id));
//!     Ok(())
//! }
//! ```

use crate::db::events::StoreChange;
use crate::models::{Node, SortOrderUpdate};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Abstraction layer for node persistence operations
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts where
/// futures may be moved between threads.
///
/// # Method Categories
///
/// - **Queries**: children, archived, trashed, single node, search
/// - **Writes**: upsert, single-column updates, lifecycle flags
/// - **Batch**: delete, reorder (each one transaction)
/// - **Hierarchy**: subtree collection
/// - **Notification**: change subscription
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // QUERIES
    //

    /// Active (not archived, not trashed) children of `parent_id`
    ///
    /// `None` selects root-level nodes. Ordered pinned-first, then by
    /// ascending `sort_order`.
    async fn list_children(&self, parent_id: Option<&str>) -> Result<Vec<Node>>;

    /// Archived, non-trashed nodes ordered by descending `sort_order`
    async fn list_archived(&self) -> Result<Vec<Node>>;

    /// Trashed nodes ordered by descending `sort_order`
    async fn list_trashed(&self) -> Result<Vec<Node>>;

    /// One-shot read by id
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no node has this id
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Case-insensitive substring search over title and content
    ///
    /// Active nodes only, newest first. `%`, `_` and `\` in `text` match
    /// literally. A blank `text` returns an empty list without a query.
    async fn search(&self, text: &str) -> Result<Vec<Node>>;

    //
    // WRITES
    //

    /// Insert or replace the full record (idempotent)
    async fn upsert_node(&self, node: Node) -> Result<()>;

    /// Rewrite `parent_id`; returns affected rows
    async fn set_parent(&self, id: &str, parent_id: Option<&str>) -> Result<u64>;

    /// Rewrite `sort_order`; returns affected rows
    async fn set_sort_order(&self, id: &str, sort_order: i64) -> Result<u64>;

    /// Set `is_pinned`; returns affected rows
    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<u64>;

    /// Flip `is_pinned`; returns affected rows
    async fn toggle_pinned(&self, id: &str) -> Result<u64>;

    /// Set `is_archived`; returns affected rows
    async fn move_to_archive(&self, id: &str) -> Result<u64>;

    /// Set `is_trashed`; returns affected rows
    async fn move_to_trash(&self, id: &str) -> Result<u64>;

    /// Clear both `is_archived` and `is_trashed`; returns affected rows
    async fn restore(&self, id: &str) -> Result<u64>;

    //
    // BATCH
    //

    /// Remove the listed rows in one transaction; returns deleted rows
    ///
    /// Rows not listed are never touched, including children of a listed
    /// folder. Cascading is the service layer's decision.
    async fn delete_nodes(&self, ids: &[String]) -> Result<u64>;

    /// Apply a reorder batch in one transaction (all-or-nothing)
    ///
    /// A concurrent reader never observes a partially applied batch.
    async fn apply_sort_orders(&self, updates: &[SortOrderUpdate]) -> Result<u64>;

    //
    // HIERARCHY
    //

    /// Ids of `root_id` and all its descendants, whatever their lifecycle state
    ///
    /// Empty when `root_id` does not exist.
    async fn subtree_ids(&self, root_id: &str) -> Result<Vec<String>>;

    //
    // NOTIFICATION
    //

    /// Receive a [`StoreChange`] after each committed write that affected rows
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
