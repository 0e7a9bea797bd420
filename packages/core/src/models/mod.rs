//! Data Models
//!
//! This module contains the core data structures used throughout Rubix:
//!
//! - `Node` - Universal record for folders, notes, images and PDFs
//! - `NodeType` / `Lifecycle` - Kind and lifecycle state of a node
//! - `SortOrderUpdate` - One entry of a reorder batch
//! - `TimeProvider` - Clock abstraction used by the services

mod node;
pub mod time;

pub use node::{Lifecycle, Node, NodeType, SortOrderUpdate, ValidationError};
pub use time::{SystemTimeProvider, TimeProvider};
