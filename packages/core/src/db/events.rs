//! Store Change Events
//!
//! `LibsqlStore` broadcasts a `StoreChange` after every committed write that
//! touched at least one row. Live queries listen on the same channel and
//! re-run their query on every event.
//!
//! # Event Flow
//!
//! 1. A store method commits a write
//! 2. If the write affected rows, one `StoreChange` is sent on the broadcast channel
//! 3. Every `LiveQuery` wakes up, re-runs its query and pushes a fresh snapshot
//!
//! Events carry the affected ids for logging and targeted consumers; live
//! queries ignore them and always re-query.

use serde::{Deserialize, Serialize};

/// Kind of write that produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreOperation {
    Upserted,
    Moved,
    Reordered,
    Pinned,
    Archived,
    Trashed,
    Restored,
    Deleted,
}

/// A committed write, emitted after the transaction completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreChange {
    pub operation: StoreOperation,
    pub node_ids: Vec<String>,
}

impl StoreChange {
    pub fn new(operation: StoreOperation, node_ids: Vec<String>) -> Self {
        Self {
            operation,
            node_ids,
        }
    }

    /// Convenience constructor for a change touching a single node
    pub fn single(operation: StoreOperation, node_id: &str) -> Self {
        Self::new(operation, vec![node_id.to_string()])
    }

    /// Get a string representation of the event type, for logging
    pub fn event_type(&self) -> &'static str {
        match self.operation {
            StoreOperation::Upserted => "node:upserted",
            StoreOperation::Moved => "node:moved",
            StoreOperation::Reordered => "nodes:reordered",
            StoreOperation::Pinned => "node:pinned",
            StoreOperation::Archived => "node:archived",
            StoreOperation::Trashed => "node:trashed",
            StoreOperation::Restored => "node:restored",
            StoreOperation::Deleted => "nodes:deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test for the JSON shape forwarded to external consumers
    #[test]
    fn test_store_change_serialization_contract() {
        let change = StoreChange::single(StoreOperation::Trashed, "node-1");
        let parsed = serde_json::to_value(&change).unwrap();

        assert_eq!(parsed["operation"], "trashed");
        assert_eq!(parsed["nodeIds"][0], "node-1");
    }

    #[test]
    fn test_event_type() {
        let change = StoreChange::new(
            StoreOperation::Reordered,
            vec!["a".to_string(), "b".to_string()],
        );
        assert_eq!(change.event_type(), "nodes:reordered");
    }
}
