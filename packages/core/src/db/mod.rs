//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization, connection management and forward migrations
//! - The `NodeStore` trait and its libsql implementation
//! - Change events and live queries built on top of them
//!
//! # Architecture
//!
//! `DatabaseService` owns the raw SQL. `LibsqlStore` wraps it, converts rows
//! to `Node`, and broadcasts a `StoreChange` after each effective write.
//! `LiveQuery` turns that broadcast into a stream of complete snapshots.

mod database;
mod error;
pub mod events;
mod libsql_store;
pub mod live_query;
pub mod migrations;
mod node_store;

pub use database::{DatabaseService, DbNodeParams, LifecycleUpdate, LIKE_ESCAPE, NODE_COLUMNS};
pub use error::DatabaseError;
pub use events::{StoreChange, StoreOperation};
pub use libsql_store::{like_pattern, LibsqlStore, DEFAULT_EVENT_CAPACITY};
pub use live_query::LiveQuery;
pub use node_store::NodeStore;
