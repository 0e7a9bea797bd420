//! Node Data Structures
//!
//! This module defines the `Node` struct, the single polymorphic entity of the
//! Rubix store. A node is a folder, a note, an image or a PDF; all four share
//! one table and one struct.
//!
//! # Architecture
//!
//! - **Single table**: every entity lives in the `nodes` table (adjacency list via `parent_id`)
//! - **Soft lifecycle**: `is_archived` / `is_trashed` flags instead of row deletion
//! - **Manual ordering**: `sort_order` key within a sibling group, pinned nodes first
//! - **Assets on disk**: images and PDFs reference their files by path
//!
//! # Examples
//!
//! ```rust
//! use rubix_core::models::{Node, NodeType};
//!
//! let trip = Node::folder("Trip", None);
//! let note = Node::new(NodeType::Note, "Packing list", Some(trip.id.clone()));
//!
//! assert_eq!(note.parent_id.as_deref(), Some(trip.id.as_str()));
//! assert!(note.validate().is_ok());
//! ```

use crate::models::time::truncate_to_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Node operations
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(f64),

    #[error("Invalid asset reference: {0}")]
    InvalidAsset(String),
}

/// Kind of entity a node represents. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Folder,
    Note,
    Image,
    Pdf,
}

impl NodeType {
    /// Database representation (`FOLDER`, `NOTE`, `IMAGE`, `PDF`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Folder => "FOLDER",
            NodeType::Note => "NOTE",
            NodeType::Image => "IMAGE",
            NodeType::Pdf => "PDF",
        }
    }

    /// Whether nodes of this type are backed by files on disk
    pub fn is_asset(&self) -> bool {
        matches!(self, NodeType::Image | NodeType::Pdf)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FOLDER" => Ok(NodeType::Folder),
            "NOTE" => Ok(NodeType::Note),
            "IMAGE" => Ok(NodeType::Image),
            "PDF" => Ok(NodeType::Pdf),
            other => Err(ValidationError::InvalidNodeType(other.to_string())),
        }
    }
}

/// Lifecycle state derived from the `is_archived` / `is_trashed` flags.
///
/// ```text
/// Active   --archive--> Archived --restore--> Active
/// Active   --trash-->   Trashed  --restore--> Active
/// Archived --trash-->   Trashed
/// Trashed  --delete forever--> (removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Active,
    Archived,
    Trashed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Active => "active",
            Lifecycle::Archived => "archived",
            Lifecycle::Trashed => "trashed",
        };
        f.write_str(name)
    }
}

/// Universal node record.
///
/// # Fields
///
/// - `id`: UUID, generated at creation, never reused
/// - `parent_id`: containing folder (`None` = root)
/// - `node_type`: folder / note / image / PDF
/// - `title`: display name
/// - `content`: note body (inline `<b>`, `<i>`, `<u>` markup allowed)
/// - `creation_date`: set once at creation
/// - `modified_date`: last write through the editor or a rename
/// - `aspect_ratio`: width / height of the rendered asset (1.0 otherwise)
/// - `sort_order`: manual ordering key within the sibling group
/// - `thumbnail_path` / `preview_path` / `original_path`: asset files
/// - `dominant_color`: ARGB center pixel of an image
/// - `is_archived` / `is_trashed` / `is_pinned`: lifecycle and pinning flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    pub parent_id: Option<String>,

    pub node_type: NodeType,

    pub title: String,

    #[serde(default)]
    pub content: Option<String>,

    pub creation_date: DateTime<Utc>,

    pub modified_date: DateTime<Utc>,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    pub sort_order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_color: Option<u32>,

    #[serde(default)]
    pub is_archived: bool,

    #[serde(default)]
    pub is_trashed: bool,

    #[serde(default)]
    pub is_pinned: bool,
}

fn default_aspect_ratio() -> f64 {
    1.0
}

impl Node {
    /// Create a new node with an auto-generated UUID.
    ///
    /// `creation_date`, `modified_date` and the default `sort_order` are all
    /// taken from the same instant, so freshly created siblings sort in
    /// creation order.
    pub fn new(node_type: NodeType, title: impl Into<String>, parent_id: Option<String>) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, title, parent_id)
    }

    /// Create a new node with a caller-chosen id (used by ingestion, which
    /// names asset files after the id before the record exists).
    pub fn new_with_id(
        id: impl Into<String>,
        node_type: NodeType,
        title: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        let now = truncate_to_millis(Utc::now());

        Self {
            id: id.into(),
            parent_id,
            node_type,
            title: title.into(),
            content: None,
            creation_date: now,
            modified_date: now,
            aspect_ratio: default_aspect_ratio(),
            sort_order: now.timestamp_millis(),
            thumbnail_path: None,
            preview_path: None,
            original_path: None,
            dominant_color: None,
            is_archived: false,
            is_trashed: false,
            is_pinned: false,
        }
    }

    /// Create a folder
    pub fn folder(title: impl Into<String>, parent_id: Option<String>) -> Self {
        Self::new(NodeType::Folder, title, parent_id)
    }

    /// Create an empty note (title and body both blank)
    pub fn note(parent_id: Option<String>) -> Self {
        let mut node = Self::new(NodeType::Note, "", parent_id);
        node.content = Some(String::new());
        node
    }

    /// Builder-style parent assignment
    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Check if this node sits at the root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    /// Current lifecycle state derived from the flags
    pub fn lifecycle(&self) -> Lifecycle {
        if self.is_trashed {
            Lifecycle::Trashed
        } else if self.is_archived {
            Lifecycle::Archived
        } else {
            Lifecycle::Active
        }
    }

    /// All asset files referenced by this node
    pub fn asset_paths(&self) -> impl Iterator<Item = &Path> {
        [
            self.original_path.as_deref(),
            self.preview_path.as_deref(),
            self.thumbnail_path.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Validate node structure
    ///
    /// Checks:
    /// - id is present
    /// - node is not its own parent
    /// - aspect ratio is finite and positive
    /// - folders and notes carry no asset paths
    /// - images and PDFs carry an original
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::InvalidParent(
                "Node cannot be its own parent".to_string(),
            ));
        }

        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(ValidationError::InvalidAspectRatio(self.aspect_ratio));
        }

        if self.node_type.is_asset() {
            if self.original_path.is_none() {
                return Err(ValidationError::InvalidAsset(format!(
                    "{} node {} has no original file",
                    self.node_type, self.id
                )));
            }
        } else if self.asset_paths().next().is_some() {
            return Err(ValidationError::InvalidAsset(format!(
                "{} node {} cannot reference asset files",
                self.node_type, self.id
            )));
        }

        Ok(())
    }
}

/// A single `(id, new sort key)` pair of a reorder batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrderUpdate {
    pub id: String,
    pub sort_order: i64,
}

impl SortOrderUpdate {
    pub fn new(id: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id: id.into(),
            sort_order,
        }
    }
}
