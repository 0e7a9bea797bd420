//! Library - Composition Root
//!
//! `Library` wires configuration, database, store, services and the
//! ingestion pipeline together, and exposes the commands a front end issues:
//! folder creation, file import (single and camera batch), note editing and
//! fire-and-forget dispatch.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rubix_core::config::RubixConfig;
//! use rubix_core::services::Library;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = Library::open(RubixConfig::with_data_dir("./data")).await?;
//!     let trip = library.create_folder("Trip", None).await?;
//!     library.import_file(Path::new("beach.jpg"), Some(&trip.id)).await?;
//!     Ok(())
//! }
//! ```

use crate::config::RubixConfig;
use crate::db::{DatabaseService, LibsqlStore, NodeStore};
use crate::ingest::{remove_files, IngestError, IngestionPipeline, StorageLayout};
use crate::models::Node;
use crate::services::error::NodeServiceError;
use crate::services::hierarchy_service::HierarchyService;
use crate::services::node_service::NodeService;
use crate::services::note_editor::NoteEditor;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::task::JoinHandle;

/// Outcome of a camera batch import
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Nodes created, in input order
    pub imported: Vec<Node>,

    /// Sources that failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

/// Asset kind requested by an import command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportKind {
    Image,
    Pdf,
    Detect,
}

/// Opened library: one database plus one asset directory tree
#[derive(Clone)]
pub struct Library {
    config: RubixConfig,
    db: Arc<DatabaseService>,
    store: Arc<dyn NodeStore>,
    nodes: NodeService,
    hierarchy: HierarchyService,
    pipeline: IngestionPipeline,
}

impl Library {
    /// Open (or create) the library described by `config`
    ///
    /// Creates the data and asset directories, opens the database (running
    /// pending migrations), and builds the services.
    pub async fn open(config: RubixConfig) -> Result<Self, NodeServiceError> {
        config.validate().map_err(NodeServiceError::invalid_config)?;

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let layout = StorageLayout::new(&config.data_dir);
        layout.ensure().await?;

        let db = Arc::new(DatabaseService::new(config.database_path()).await?);
        let store: Arc<dyn NodeStore> = Arc::new(LibsqlStore::new(Arc::clone(&db)));

        let nodes = NodeService::new(Arc::clone(&store))
            .with_live_query_buffer(config.live_query_buffer);
        let hierarchy =
            HierarchyService::new(Arc::clone(&store)).with_max_depth(config.max_ancestor_depth);
        let pipeline = IngestionPipeline::new(layout, config.ingest.clone());

        tracing::info!(
            data_dir = %config.data_dir.display(),
            database = %config.database_path().display(),
            "Opened library"
        );

        Ok(Self {
            config,
            db,
            store,
            nodes,
            hierarchy,
            pipeline,
        })
    }

    pub fn config(&self) -> &RubixConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    pub fn nodes(&self) -> &NodeService {
        &self.nodes
    }

    pub fn hierarchy(&self) -> &HierarchyService {
        &self.hierarchy
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Node, NodeServiceError> {
        self.nodes.create_folder(name, parent_id).await
    }

    /// Import an image file under `parent_id`
    pub async fn import_image(
        &self,
        path: &Path,
        parent_id: Option<&str>,
    ) -> Result<Node, NodeServiceError> {
        self.import(path, parent_id, ImportKind::Image).await
    }

    /// Import a PDF file under `parent_id`
    pub async fn import_pdf(
        &self,
        path: &Path,
        parent_id: Option<&str>,
    ) -> Result<Node, NodeServiceError> {
        self.import(path, parent_id, ImportKind::Pdf).await
    }

    /// Import an image or PDF, detected from the file header
    pub async fn import_file(
        &self,
        path: &Path,
        parent_id: Option<&str>,
    ) -> Result<Node, NodeServiceError> {
        self.import(path, parent_id, ImportKind::Detect).await
    }

    async fn import(
        &self,
        path: &Path,
        parent_id: Option<&str>,
        kind: ImportKind,
    ) -> Result<Node, NodeServiceError> {
        if let Some(parent_id) = parent_id {
            self.nodes.require_folder(parent_id).await?;
        }

        let node = match kind {
            ImportKind::Detect => self.pipeline.ingest_file(path).await?,
            ImportKind::Image | ImportKind::Pdf => {
                let file = File::open(path)
                    .await
                    .map_err(|e| IngestError::io(path, e))?;
                if kind == ImportKind::Image {
                    self.pipeline.ingest_image(file).await?
                } else {
                    self.pipeline.ingest_pdf(file).await?
                }
            }
        };

        let node = node.with_parent(parent_id.map(str::to_string));

        if let Err(e) = self.nodes.upsert(node.clone()).await {
            let removed = remove_files(node.asset_paths()).await;
            tracing::warn!(
                node_id = %node.id,
                removed,
                error = %e,
                "Import rolled back"
            );
            return Err(e);
        }

        tracing::info!(
            node_id = %node.id,
            node_type = %node.node_type,
            source = %path.display(),
            "Imported file"
        );
        Ok(node)
    }

    /// Import a batch of camera captures
    ///
    /// Each source is a temporary file; it is deleted once its image has
    /// been stored. Failures are logged and the source is left in place.
    pub async fn import_batch(&self, paths: &[PathBuf], parent_id: Option<&str>) -> BatchReport {
        let mut report = BatchReport::default();

        for path in paths {
            match self.import_image(path, parent_id).await {
                Ok(node) => {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        tracing::warn!(source = %path.display(), error = %e, "Failed to remove capture");
                    }
                    report.imported.push(node);
                }
                Err(e) => {
                    tracing::error!(source = %path.display(), error = %e, "Batch import failed");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Open an existing note using the configured autosave debounce
    pub async fn open_note(&self, id: &str) -> Result<NoteEditor, NodeServiceError> {
        Ok(NoteEditor::open(self.nodes.clone(), id)
            .await?
            .with_debounce(self.config.autosave_debounce()))
    }

    /// Start a new note draft using the configured autosave debounce
    pub async fn new_note(&self, parent_id: Option<&str>) -> Result<NoteEditor, NodeServiceError> {
        Ok(NoteEditor::new_note(self.nodes.clone(), parent_id)
            .await?
            .with_debounce(self.config.autosave_debounce()))
    }

    /// Run a command in the background, logging and discarding its error
    pub fn dispatch<F, T, E>(&self, label: &'static str, command: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = command.await {
                tracing::error!(command = label, error = %e, "Command failed");
            }
        })
    }
}
