//! Manual ordering
//!
//! Sibling order is the `sort_order` key. A drag from index `from` to index
//! `to` renumbers the whole visible list as `base + index * SORT_ORDER_GAP`,
//! where `base` is the current time in milliseconds, and writes back only
//! the keys that changed.
//!
//! ```rust
//! use rubix_core::models::Node;
//! use rubix_core::services::ordering::{compute_reorder, SORT_ORDER_GAP};
//!
//! let mut a = Node::folder("A", None);
//! let mut b = Node::folder("B", None);
//! a.sort_order = 0;
//! b.sort_order = SORT_ORDER_GAP;
//!
//! let updates = compute_reorder(&[a.clone(), b.clone()], 1, 0, 0);
//! assert_eq!(updates.len(), 2);
//! assert_eq!(updates[0].id, b.id);
//! assert_eq!(updates[0].sort_order, 0);
//! ```

use crate::models::{Node, SortOrderUpdate};

/// Distance between consecutive keys after a renumber
pub const SORT_ORDER_GAP: i64 = 1000;

/// Compute the key updates for moving `visible[from]` to position `to`
///
/// Pure: reads only its arguments. Returns an empty batch when either index
/// is out of range.
pub fn compute_reorder(
    visible: &[Node],
    from: usize,
    to: usize,
    base_timestamp: i64,
) -> Vec<SortOrderUpdate> {
    if from >= visible.len() || to >= visible.len() {
        return Vec::new();
    }

    let mut order: Vec<&Node> = visible.iter().collect();
    let moved = order.remove(from);
    order.insert(to, moved);

    order
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let key = base_timestamp + index as i64 * SORT_ORDER_GAP;
            (node.sort_order != key).then(|| SortOrderUpdate::new(node.id.clone(), key))
        })
        .collect()
}
