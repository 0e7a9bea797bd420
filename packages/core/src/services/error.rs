//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for business logic failures.

use crate::db::DatabaseError;
use crate::ingest::IngestError;
use crate::models::{Lifecycle, ValidationError};
use thiserror::Error;

/// Service operation errors
///
/// Provides high-level error types for all service operations,
/// with detailed context and proper error chaining.
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Validation failed for node
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Invalid parent reference
    #[error("Invalid parent node: {parent_id}")]
    InvalidParent { parent_id: String },

    /// Circular reference detected
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// Node hierarchy constraint violation
    #[error("Hierarchy constraint violated: {0}")]
    HierarchyViolation(String),

    /// Lifecycle transition with no matching edge
    #[error("Cannot {action} node {node_id} while it is {from}")]
    InvalidTransition {
        node_id: String,
        from: Lifecycle,
        action: &'static str,
    },

    /// Query execution error
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Asset ingestion failed
    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// Filesystem error outside ingestion
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(parent_id: impl Into<String>) -> Self {
        Self::InvalidParent {
            parent_id: parent_id.into(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create a hierarchy violation error
    pub fn hierarchy_violation(msg: impl Into<String>) -> Self {
        Self::HierarchyViolation(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(node_id: impl Into<String>, from: Lifecycle, action: &'static str) -> Self {
        Self::InvalidTransition {
            node_id: node_id.into(),
            from,
            action,
        }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
