//! Node Service - Store Facade and Lifecycle Rules
//!
//! This module provides the main business logic layer for node operations:
//!
//! - Live queries (children, archived, trashed, single node)
//! - Search and one-shot reads
//! - Folder creation and note drafts with parent validation
//! - Lifecycle transitions (archive / trash / restore / delete forever)
//! - Pinning and manual reordering
//!
//! # Lifecycle
//!
//! ```text
//! ACTIVE   --archive--> ARCHIVED --restore--> ACTIVE
//! ACTIVE   --trash-->   TRASHED  --restore--> ACTIVE
//! ARCHIVED --trash-->   TRASHED
//! TRASHED  --delete_forever--> (removed)
//! ```
//!
//! A transition with no matching edge fails with
//! `NodeServiceError::InvalidTransition`. Re-applying the state a node is
//! already in does nothing, and so does any operation on a missing id.
//!
//! # Delete Forever
//!
//! Permanently deleting a folder removes its entire subtree, whatever the
//! lifecycle state of the descendants, in one transaction. Asset files of
//! every removed node are deleted afterwards.

use crate::db::{LiveQuery, NodeStore};
use crate::ingest::remove_files;
use crate::models::{Lifecycle, Node, NodeType, SortOrderUpdate, SystemTimeProvider, TimeProvider, ValidationError};
use crate::services::error::NodeServiceError;
use crate::services::ordering::compute_reorder;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of undelivered snapshots buffered per live query
const DEFAULT_LIVE_QUERY_BUFFER: usize = 16;

/// Lifecycle command requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Archive,
    Trash,
    Restore,
}

impl Transition {
    fn action(&self) -> &'static str {
        match self {
            Transition::Archive => "archive",
            Transition::Trash => "trash",
            Transition::Restore => "restore",
        }
    }

    /// State reached by this transition
    fn target(&self) -> Lifecycle {
        match self {
            Transition::Archive => Lifecycle::Archived,
            Transition::Trash => Lifecycle::Trashed,
            Transition::Restore => Lifecycle::Active,
        }
    }

    /// Whether an edge exists from `from`
    fn allowed_from(&self, from: Lifecycle) -> bool {
        matches!(
            (self, from),
            (Transition::Archive, Lifecycle::Active)
                | (Transition::Trash, Lifecycle::Active)
                | (Transition::Trash, Lifecycle::Archived)
                | (Transition::Restore, Lifecycle::Archived)
                | (Transition::Restore, Lifecycle::Trashed)
        )
    }
}

/// Result of a permanent delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Ids removed from the store (the node and its descendants)
    pub deleted_ids: Vec<String>,

    /// Asset files removed from disk
    pub files_removed: usize,
}

impl DeleteResult {
    pub fn existed(&self) -> bool {
        !self.deleted_ids.is_empty()
    }
}

/// Core service for node operations
///
/// Cheap to clone; all clones share the same store and clock.
///
/// # Examples
///
/// ```no_run
/// use rubix_core::db::{DatabaseService, LibsqlStore};
/// use rubix_core::services::NodeService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/rubix.db")).await?);
///     let service = NodeService::new(Arc::new(LibsqlStore::new(db)));
///
///     let trip = service.create_folder("Trip", None).await?;
///     service.archive(&trip.id).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    time: Arc<dyn TimeProvider>,
    live_query_buffer: usize,
}

impl NodeService {
    /// Create a NodeService using the system clock
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            store,
            time: Arc::new(SystemTimeProvider),
            live_query_buffer: DEFAULT_LIVE_QUERY_BUFFER,
        }
    }

    /// Replace the clock (tests pin time with a mock provider)
    pub fn with_time_provider(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    /// Set the per-subscription snapshot buffer
    pub fn with_live_query_buffer(mut self, buffer: usize) -> Self {
        self.live_query_buffer = buffer.max(1);
        self
    }

    /// Access the underlying store
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Access the clock
    pub fn time_provider(&self) -> &Arc<dyn TimeProvider> {
        &self.time
    }

    //
    // LIVE QUERIES
    //

    /// Live list of active children of `parent_id` (`None` = root)
    pub fn watch_children(&self, parent_id: Option<&str>) -> LiveQuery<Vec<Node>> {
        let store = Arc::clone(&self.store);
        let parent_id = parent_id.map(str::to_string);
        LiveQuery::spawn(
            self.store.subscribe(),
            self.live_query_buffer,
            "children",
            move || {
                let store = Arc::clone(&store);
                let parent_id = parent_id.clone();
                async move { store.list_children(parent_id.as_deref()).await }
            },
        )
    }

    /// Live list of archived nodes
    pub fn watch_archived(&self) -> LiveQuery<Vec<Node>> {
        let store = Arc::clone(&self.store);
        LiveQuery::spawn(
            self.store.subscribe(),
            self.live_query_buffer,
            "archived",
            move || {
                let store = Arc::clone(&store);
                async move { store.list_archived().await }
            },
        )
    }

    /// Live list of trashed nodes
    pub fn watch_trashed(&self) -> LiveQuery<Vec<Node>> {
        let store = Arc::clone(&self.store);
        LiveQuery::spawn(
            self.store.subscribe(),
            self.live_query_buffer,
            "trashed",
            move || {
                let store = Arc::clone(&store);
                async move { store.list_trashed().await }
            },
        )
    }

    /// Live view of a single node; `None` while it does not exist
    pub fn watch_node(&self, id: &str) -> LiveQuery<Option<Node>> {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        LiveQuery::spawn(
            self.store.subscribe(),
            self.live_query_buffer,
            "node",
            move || {
                let store = Arc::clone(&store);
                let id = id.clone();
                async move { store.get_node(&id).await }
            },
        )
    }

    //
    // READS
    //

    pub async fn get_node(&self, id: &str) -> Result<Option<Node>, NodeServiceError> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }

    pub async fn list_children(&self, parent_id: Option<&str>) -> Result<Vec<Node>, NodeServiceError> {
        self.store
            .list_children(parent_id)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }

    pub async fn list_archived(&self) -> Result<Vec<Node>, NodeServiceError> {
        self.store
            .list_archived()
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }

    pub async fn list_trashed(&self) -> Result<Vec<Node>, NodeServiceError> {
        self.store
            .list_trashed()
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }

    /// Substring search over titles and note bodies
    ///
    /// A blank query returns an empty list without touching the database.
    pub async fn search(&self, text: &str) -> Result<Vec<Node>, NodeServiceError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .search(text)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }

    //
    // WRITES
    //

    /// Validate and persist a full node record (insert or replace)
    ///
    /// The parent reference is not checked here; callers placing a node in
    /// the tree go through `create_folder`, `create_note` or
    /// `HierarchyService::move_node`.
    pub async fn upsert(&self, node: Node) -> Result<(), NodeServiceError> {
        node.validate()?;

        let id = node.id.clone();
        self.store
            .upsert_node(node)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        tracing::debug!(node_id = %id, "Upserted node");
        Ok(())
    }

    /// Create and persist a folder
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `name` is blank
    /// - `InvalidParent` / `HierarchyViolation` if `parent_id` is not an existing folder
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Node, NodeServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("title".to_string()).into());
        }

        if let Some(parent_id) = parent_id {
            self.require_folder(parent_id).await?;
        }

        let node = self.stamp(Node::folder(name, parent_id.map(str::to_string)));
        self.upsert(node.clone()).await?;

        tracing::info!(node_id = %node.id, title = %node.title, "Created folder");
        Ok(node)
    }

    /// Start an unsaved note draft under `parent_id`
    ///
    /// Nothing is written; the note editor persists the draft on its first
    /// save.
    pub async fn create_note(&self, parent_id: Option<&str>) -> Result<Node, NodeServiceError> {
        if let Some(parent_id) = parent_id {
            self.require_folder(parent_id).await?;
        }

        Ok(self.stamp(Node::note(parent_id.map(str::to_string))))
    }

    /// Check that `parent_id` names an existing folder
    pub(crate) async fn require_folder(&self, parent_id: &str) -> Result<Node, NodeServiceError> {
        let parent = self
            .get_node(parent_id)
            .await?
            .ok_or_else(|| NodeServiceError::invalid_parent(parent_id))?;

        if parent.node_type != NodeType::Folder {
            return Err(NodeServiceError::hierarchy_violation(format!(
                "Parent {} is a {}, only folders can contain nodes",
                parent_id, parent.node_type
            )));
        }

        Ok(parent)
    }

    /// Take timestamps and the default sort key from the service clock
    fn stamp(&self, mut node: Node) -> Node {
        let now = self.time.now();
        node.creation_date = now;
        node.modified_date = now;
        node.sort_order = now.timestamp_millis();
        node
    }

    //
    // LIFECYCLE
    //

    pub async fn archive(&self, id: &str) -> Result<(), NodeServiceError> {
        self.transition(id, Transition::Archive).await
    }

    pub async fn trash(&self, id: &str) -> Result<(), NodeServiceError> {
        self.transition(id, Transition::Trash).await
    }

    /// Return an archived or trashed node to the active lists
    pub async fn restore(&self, id: &str) -> Result<(), NodeServiceError> {
        self.transition(id, Transition::Restore).await
    }

    async fn transition(&self, id: &str, transition: Transition) -> Result<(), NodeServiceError> {
        let Some(node) = self.get_node(id).await? else {
            return Ok(());
        };

        let from = node.lifecycle();
        if from == transition.target() {
            return Ok(());
        }

        if !transition.allowed_from(from) {
            return Err(NodeServiceError::invalid_transition(id, from, transition.action()));
        }

        let result = match transition {
            Transition::Archive => self.store.move_to_archive(id).await,
            Transition::Trash => self.store.move_to_trash(id).await,
            Transition::Restore => self.store.restore(id).await,
        };
        result.map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        tracing::info!(node_id = %id, from = %from, to = %transition.target(), "Lifecycle transition");
        Ok(())
    }

    /// Permanently delete a trashed node, its subtree and their files
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the node is not in the trash. A missing id is
    /// a no-op returning an empty result.
    pub async fn delete_forever(&self, id: &str) -> Result<DeleteResult, NodeServiceError> {
        let Some(node) = self.get_node(id).await? else {
            return Ok(DeleteResult::default());
        };

        let from = node.lifecycle();
        if from != Lifecycle::Trashed {
            return Err(NodeServiceError::invalid_transition(id, from, "delete forever"));
        }

        let ids = self
            .store
            .subtree_ids(id)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        // Collect asset paths before the rows disappear
        let mut files: Vec<PathBuf> = Vec::new();
        for node_id in &ids {
            if let Some(doomed) = self.get_node(node_id).await? {
                files.extend(doomed.asset_paths().map(PathBuf::from));
            }
        }

        self.store
            .delete_nodes(&ids)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        let files_removed = remove_files(files.iter().map(PathBuf::as_path)).await;

        tracing::info!(
            node_id = %id,
            deleted = ids.len(),
            files_removed,
            "Deleted forever"
        );

        Ok(DeleteResult {
            deleted_ids: ids,
            files_removed,
        })
    }

    /// Permanently delete everything in the trash
    pub async fn empty_trash(&self) -> Result<DeleteResult, NodeServiceError> {
        let mut total = DeleteResult::default();

        for node in self.list_trashed().await? {
            // An earlier cascade may already have removed this one
            if total.deleted_ids.contains(&node.id) {
                continue;
            }
            let result = self.delete_forever(&node.id).await?;
            total.files_removed += result.files_removed;
            total.deleted_ids.extend(result.deleted_ids);
        }

        Ok(total)
    }

    //
    // PINNING & ORDERING
    //

    pub async fn set_pinned(&self, id: &str, pinned: bool) -> Result<(), NodeServiceError> {
        self.store
            .set_pinned(id, pinned)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;
        Ok(())
    }

    pub async fn toggle_pinned(&self, id: &str) -> Result<(), NodeServiceError> {
        self.store
            .toggle_pinned(id)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;
        Ok(())
    }

    /// Move `visible[from]` to position `to` and persist the new keys
    ///
    /// `visible` is the list as currently displayed. Keys are renumbered
    /// from the current time and applied in one atomic batch.
    ///
    /// # Returns
    ///
    /// The applied updates (empty for out-of-range indices)
    pub async fn reorder_nodes(
        &self,
        visible: &[Node],
        from: usize,
        to: usize,
    ) -> Result<Vec<SortOrderUpdate>, NodeServiceError> {
        let updates = compute_reorder(visible, from, to, self.time.now_millis());
        if updates.is_empty() {
            return Ok(updates);
        }

        self.store
            .apply_sort_orders(&updates)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        tracing::debug!(from, to, updated = updates.len(), "Reordered nodes");
        Ok(updates)
    }
}

#[cfg(test)]
#[path = "node_service_test.rs"]
mod node_service_test;
