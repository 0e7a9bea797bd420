//! Hierarchy Service
//!
//! Folder tree navigation and re-parenting:
//!
//! - `get_ancestors` - breadcrumb path from the root down to a node's parent
//! - `move_node` - re-parent a node with target and cycle validation
//!
//! Parent links are followed one row at a time. Both walks carry a visited
//! set and a depth bound, so a corrupt parent chain ends the walk instead of
//! looping forever.

use crate::db::NodeStore;
use crate::models::{Node, NodeType};
use crate::services::error::NodeServiceError;
use std::collections::HashSet;
use std::sync::Arc;

/// Default upper bound on parent hops
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// What `move_node` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Parent changed
    Moved,

    /// Node already had that parent
    Unchanged,

    /// Node does not exist; nothing written
    NotFound,
}

/// Folder tree queries and moves
#[derive(Clone)]
pub struct HierarchyService {
    store: Arc<dyn NodeStore>,
    max_depth: usize,
}

impl HierarchyService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound the number of parent hops taken by a walk
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Ancestors of `id`, root first, excluding the node itself
    ///
    /// A missing id, or a root node, yields an empty list. A parent reference
    /// pointing at a missing row ends the path there. On a cycle the walk
    /// stops at the first repeated node and logs a warning.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use rubix_core::services::HierarchyService;
    /// # async fn example(hierarchy: HierarchyService) -> Result<(), Box<dyn std::error::Error>> {
    /// let crumbs = hierarchy.get_ancestors("photo-id").await?;
    /// let path: Vec<_> = crumbs.iter().map(|n| n.title.as_str()).collect();
    /// println!("{}", path.join(" / "));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_ancestors(&self, id: &str) -> Result<Vec<Node>, NodeServiceError> {
        let Some(node) = self.fetch(id).await? else {
            return Ok(Vec::new());
        };

        let mut visited: HashSet<String> = HashSet::from([node.id.clone()]);
        let mut ancestors = Vec::new();
        let mut next = node.parent_id;

        while let Some(parent_id) = next {
            if ancestors.len() >= self.max_depth {
                tracing::warn!(node_id = %id, max_depth = self.max_depth, "Ancestor walk hit depth bound");
                break;
            }

            if !visited.insert(parent_id.clone()) {
                tracing::warn!(node_id = %id, repeated = %parent_id, "Cycle in parent chain");
                break;
            }

            let Some(parent) = self.fetch(&parent_id).await? else {
                break;
            };

            next = parent.parent_id.clone();
            ancestors.push(parent);
        }

        ancestors.reverse();
        Ok(ancestors)
    }

    /// Whether `candidate` sits somewhere below `ancestor_id`
    ///
    /// Walks upward from `candidate` rather than down from the ancestor, so
    /// the cost is the depth of the candidate, not the size of the subtree.
    ///
    /// # Errors
    ///
    /// `CircularReference` if the walk reaches the depth bound without
    /// finding the root, since the answer is then unknown.
    pub async fn is_descendant(
        &self,
        ancestor_id: &str,
        candidate: &str,
    ) -> Result<bool, NodeServiceError> {
        let mut visited = HashSet::new();
        let mut current = candidate.to_string();

        for _ in 0..self.max_depth {
            if !visited.insert(current.clone()) {
                return Ok(false);
            }

            let Some(node) = self.fetch(&current).await? else {
                return Ok(false);
            };

            match node.parent_id {
                Some(parent_id) if parent_id == ancestor_id => return Ok(true),
                Some(parent_id) => current = parent_id,
                None => return Ok(false),
            }
        }

        tracing::warn!(
            ancestor_id = %ancestor_id,
            candidate = %candidate,
            max_depth = self.max_depth,
            "Descendant check hit depth bound"
        );
        Err(NodeServiceError::circular_reference(format!(
            "Cannot verify that {} is outside the subtree of {} within {} levels",
            candidate, ancestor_id, self.max_depth
        )))
    }

    /// Re-parent `id` under `new_parent` (`None` = root)
    ///
    /// # Errors
    ///
    /// - `CircularReference` if the target is the node itself or one of its descendants
    /// - `InvalidParent` if the target does not exist
    /// - `HierarchyViolation` if the target is not a folder
    pub async fn move_node(
        &self,
        id: &str,
        new_parent: Option<&str>,
    ) -> Result<MoveOutcome, NodeServiceError> {
        let Some(node) = self.fetch(id).await? else {
            return Ok(MoveOutcome::NotFound);
        };

        if let Some(parent_id) = new_parent {
            if parent_id == id {
                return Err(NodeServiceError::circular_reference(format!(
                    "Cannot move node {} into itself",
                    id
                )));
            }

            let parent = self
                .fetch(parent_id)
                .await?
                .ok_or_else(|| NodeServiceError::invalid_parent(parent_id))?;

            if parent.node_type != NodeType::Folder {
                return Err(NodeServiceError::hierarchy_violation(format!(
                    "Cannot move node {} into {} {}",
                    id, parent.node_type, parent_id
                )));
            }

            if self.is_descendant(id, parent_id).await? {
                return Err(NodeServiceError::circular_reference(format!(
                    "Cannot move node {} into its descendant {}",
                    id, parent_id
                )));
            }
        }

        if node.parent_id.as_deref() == new_parent {
            return Ok(MoveOutcome::Unchanged);
        }

        self.store
            .set_parent(id, new_parent)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))?;

        tracing::info!(
            node_id = %id,
            from = node.parent_id.as_deref().unwrap_or("<root>"),
            to = new_parent.unwrap_or("<root>"),
            "Moved node"
        );

        Ok(MoveOutcome::Moved)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Node>, NodeServiceError> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| NodeServiceError::query_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, LibsqlStore};
    use tempfile::TempDir;

    async fn setup() -> (HierarchyService, Arc<dyn NodeStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(DatabaseService::new(temp_dir.path().join("test.db")).await.unwrap());
        let store: Arc<dyn NodeStore> = Arc::new(LibsqlStore::new(db));
        (HierarchyService::new(store.clone()), store, temp_dir)
    }

    async fn folder(store: &Arc<dyn NodeStore>, id: &str, parent: Option<&str>) {
        let node = Node::new_with_id(id, NodeType::Folder, id.to_uppercase(), parent.map(str::to_string));
        store.upsert_node(node).await.unwrap();
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_ancestors_root_first() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "a", None).await;
        folder(&store, "b", Some("a")).await;
        folder(&store, "c", Some("b")).await;

        assert_eq!(ids(&hierarchy.get_ancestors("c").await.unwrap()), vec!["a", "b"]);
        assert!(hierarchy.get_ancestors("a").await.unwrap().is_empty());
        assert!(hierarchy.get_ancestors("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ancestors_stop_at_dangling_parent() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "b", Some("vanished")).await;
        folder(&store, "c", Some("b")).await;

        assert_eq!(ids(&hierarchy.get_ancestors("c").await.unwrap()), vec!["b"]);
    }

    #[tokio::test]
    async fn test_ancestors_terminate_on_cycle() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "x", Some("y")).await;
        folder(&store, "y", Some("x")).await;

        let ancestors = hierarchy.get_ancestors("x").await.unwrap();
        assert_eq!(ids(&ancestors), vec!["y"]);
    }

    #[tokio::test]
    async fn test_ancestors_respect_depth_bound() {
        let (hierarchy, store, _temp_dir) = setup().await;
        let hierarchy = hierarchy.with_max_depth(2);
        folder(&store, "a", None).await;
        folder(&store, "b", Some("a")).await;
        folder(&store, "c", Some("b")).await;
        folder(&store, "d", Some("c")).await;

        assert_eq!(ids(&hierarchy.get_ancestors("d").await.unwrap()), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_move_into_folder_and_back_to_root() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "trip", None).await;
        folder(&store, "loose", None).await;

        assert_eq!(hierarchy.move_node("loose", Some("trip")).await.unwrap(), MoveOutcome::Moved);
        let children = store.list_children(Some("trip")).await.unwrap();
        assert_eq!(ids(&children), vec!["loose"]);

        assert_eq!(hierarchy.move_node("loose", Some("trip")).await.unwrap(), MoveOutcome::Unchanged);

        assert_eq!(hierarchy.move_node("loose", None).await.unwrap(), MoveOutcome::Moved);
        assert!(store.list_children(Some("trip")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_missing_node() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "trip", None).await;

        assert_eq!(hierarchy.move_node("ghost", Some("trip")).await.unwrap(), MoveOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_move_into_self_or_descendant_is_circular() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "a", None).await;
        folder(&store, "b", Some("a")).await;
        folder(&store, "c", Some("b")).await;

        let err = hierarchy.move_node("a", Some("a")).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let err = hierarchy.move_node("a", Some("c")).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        // Tree untouched
        assert_eq!(ids(&hierarchy.get_ancestors("c").await.unwrap()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_move_requires_existing_folder_target() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "a", None).await;

        let err = hierarchy.move_node("a", Some("nowhere")).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::InvalidParent { .. }));

        let mut note = Node::new_with_id("memo", NodeType::Note, "Memo", None);
        note.content = Some("text".to_string());
        store.upsert_node(note).await.unwrap();

        let err = hierarchy.move_node("a", Some("memo")).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::HierarchyViolation(_)));
    }

    #[tokio::test]
    async fn test_move_rejected_when_depth_bound_is_reached() {
        let (hierarchy, store, _temp_dir) = setup().await;
        let hierarchy = hierarchy.with_max_depth(2);
        folder(&store, "a", None).await;
        folder(&store, "b", Some("a")).await;
        folder(&store, "c", Some("b")).await;
        folder(&store, "d", Some("c")).await;

        // d sits three levels below a, deeper than the bound
        let err = hierarchy.is_descendant("a", "d").await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let err = hierarchy.move_node("a", Some("d")).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let a = store.get_node("a").await.unwrap().unwrap();
        assert!(a.parent_id.is_none());

        // Shallow checks still answer normally
        assert!(hierarchy.is_descendant("a", "b").await.unwrap());
        assert!(hierarchy.is_descendant("a", "c").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_descendant() {
        let (hierarchy, store, _temp_dir) = setup().await;
        folder(&store, "a", None).await;
        folder(&store, "b", Some("a")).await;
        folder(&store, "c", Some("b")).await;
        folder(&store, "z", None).await;

        assert!(hierarchy.is_descendant("a", "c").await.unwrap());
        assert!(!hierarchy.is_descendant("c", "a").await.unwrap());
        assert!(!hierarchy.is_descendant("a", "z").await.unwrap());
    }
}
