//! On-disk asset layout
//!
//! ```text
//! {data_dir}/
//!   originals/{id}.{ext}   verbatim copy of the source
//!   previews/{id}.jpg      display rendition (images only)
//!   thumbnails/{id}.jpg    grid rendition
//! ```

use crate::ingest::error::IngestError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Paths of the three asset directories under a data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    originals: PathBuf,
    thumbnails: PathBuf,
    previews: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            originals: root.join("originals"),
            thumbnails: root.join("thumbnails"),
            previews: root.join("previews"),
            root,
        }
    }

    /// Create the three directories if missing
    pub async fn ensure(&self) -> Result<(), IngestError> {
        for dir in [&self.originals, &self.thumbnails, &self.previews] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| IngestError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn originals_dir(&self) -> &Path {
        &self.originals
    }

    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails
    }

    pub fn previews_dir(&self) -> &Path {
        &self.previews
    }

    /// `originals/{id}.{ext}`
    pub fn original_path(&self, id: &str, ext: &str) -> PathBuf {
        self.originals.join(format!("{}.{}", id, ext))
    }

    /// `thumbnails/{id}.jpg`
    pub fn thumbnail_path(&self, id: &str) -> PathBuf {
        self.thumbnails.join(format!("{}.jpg", id))
    }

    /// `previews/{id}.jpg`
    pub fn preview_path(&self, id: &str) -> PathBuf {
        self.previews.join(format!("{}.jpg", id))
    }
}

/// Delete asset files, ignoring ones that are already gone
///
/// Other I/O errors are logged and skipped so one unreadable file does not
/// keep the rest on disk.
pub async fn remove_files<'a, I>(paths: I) -> usize
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove asset file");
            }
        }
    }
    removed
}

/// Files created by an in-flight ingestion
///
/// Every path is registered *before* the file is created. Unless
/// [`PendingFiles::commit`] is called, dropping the guard deletes all of
/// them, which covers early returns, panics and cancelled futures alike.
#[derive(Debug, Default)]
pub struct PendingFiles {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl PendingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` and hand it back for convenience
    pub fn register(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Keep the files; the guard no longer deletes anything
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for PendingFiles {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Removed partial ingest file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove partial ingest file"
                    );
                }
            }
        }
    }
}
