//! Rubix Core Business Logic Layer
//!
//! This crate provides storage, ingestion and organisation logic for the
//! Rubix note and file organiser: folders, notes, images and PDFs arranged
//! in one tree.
//!
//! # Architecture
//!
//! - **Single node table**: every item is a `Node` row; the type decides which fields matter
//! - **libsql**: embedded SQLite-compatible database with forward-only migrations
//! - **Live queries**: list screens subscribe to complete snapshots that refresh after each write
//! - **Ingestion**: originals are copied into the data directory and derived JPEG renditions
//!   are generated off the async runtime
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeType, lifecycle)
//! - [`db`] - Database layer, node store and live queries
//! - [`ingest`] - Image and PDF ingestion pipeline
//! - [`services`] - Business services (NodeService, HierarchyService, Library)
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod ingest;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{IngestConfig, RubixConfig};
pub use models::*;
pub use services::*;
