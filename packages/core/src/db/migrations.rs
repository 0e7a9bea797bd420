//! Forward-only schema migrations
//!
//! The schema version lives in `PRAGMA user_version`. On open,
//! `DatabaseService` applies every migration whose version is above the
//! stored one, each in its own transaction together with the version bump.
//!
//! | version | change |
//! |---|---|
//! | 1 | `nodes` table |
//! | 2 | `modified_date` column, back-filled from `creation_date` |
//! | 3 | list / search indexes |
//!
//! Never edit a released migration; append a new one.

/// A numbered schema change
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

/// Highest schema version this build understands
pub const LATEST_SCHEMA_VERSION: i64 = 3;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create nodes table",
        statements: &["CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY NOT NULL,
                parent_id TEXT,
                node_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT,
                creation_date INTEGER NOT NULL,
                aspect_ratio REAL NOT NULL DEFAULT 1.0,
                sort_order INTEGER NOT NULL,
                thumbnail_path TEXT,
                preview_path TEXT,
                original_path TEXT,
                dominant_color INTEGER,
                is_archived INTEGER NOT NULL DEFAULT 0,
                is_trashed INTEGER NOT NULL DEFAULT 0,
                is_pinned INTEGER NOT NULL DEFAULT 0
            )"],
    },
    Migration {
        version: 2,
        description: "add modified_date",
        statements: &[
            "ALTER TABLE nodes ADD COLUMN modified_date INTEGER NOT NULL DEFAULT 0",
            "UPDATE nodes SET modified_date = creation_date",
        ],
    },
    Migration {
        version: 3,
        description: "add list and search indexes",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_nodes_lifecycle ON nodes(is_archived, is_trashed)",
            "CREATE INDEX IF NOT EXISTS idx_nodes_sort_order ON nodes(sort_order)",
            "CREATE INDEX IF NOT EXISTS idx_nodes_creation_date ON nodes(creation_date)",
        ],
    },
];

/// Migrations that still need to run for a database at `current`
pub fn pending(current: i64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > current)
}
