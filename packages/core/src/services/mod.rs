//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `NodeService` - reads, live queries, lifecycle transitions, pinning and ordering
//! - `HierarchyService` - ancestor paths and validated moves
//! - `NoteEditor` - note editing with debounced autosave
//! - `Library` - composition root wiring config, store, services and ingestion
//!
//! Services coordinate between the database layer and application logic,
//! implementing business rules and orchestrating multi-step operations.

pub mod error;
pub mod hierarchy_service;
pub mod library;
pub mod node_service;
pub mod note_editor;
pub mod ordering;

pub use error::NodeServiceError;
pub use hierarchy_service::{HierarchyService, MoveOutcome};
pub use library::{BatchReport, Library};
pub use node_service::{DeleteResult, NodeService};
pub use note_editor::NoteEditor;
pub use ordering::{compute_reorder, SORT_ORDER_GAP};
