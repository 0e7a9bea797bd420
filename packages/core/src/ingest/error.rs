//! Ingestion Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while copying an asset and deriving its renditions
///
/// Whatever the variant, every file created by the failed ingestion has
/// already been removed when the error reaches the caller.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Reading the source or writing into the storage layout failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The source bytes are not a recognised image (or PDF) format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The original could not be decoded into a raster
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A rendition could not be encoded
    #[error("Failed to encode rendition: {0}")]
    Encode(String),

    /// The PDF could not be parsed or rendered
    #[error("Failed to render PDF: {0}")]
    Pdf(String),

    /// The PDF parsed but has no pages
    #[error("PDF has no pages")]
    EmptyPdf,

    /// A blocking worker panicked or was cancelled
    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}

impl IngestError {
    /// Create an I/O error tagged with the path involved
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn pdf(msg: impl Into<String>) -> Self {
        Self::Pdf(msg.into())
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskFailed(e.to_string())
    }
}
