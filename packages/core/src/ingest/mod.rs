//! Asset Ingestion
//!
//! Copies images and PDFs into the data directory and derives their
//! renditions:
//!
//! - [`StorageLayout`] - `originals/`, `previews/`, `thumbnails/` under the data dir
//! - [`IngestionPipeline`] - image / PDF / sniffed-file ingestion producing an unsaved `Node`
//! - [`PdfRasterizer`] - seam for PDF page rendering, with the bundled [`LopdfRasterizer`]
//! - [`PendingFiles`] - drop guard removing half-written files on failure
//!
//! CPU-bound work (decode, resize, encode, PDF parse) runs on
//! `tokio::task::spawn_blocking` workers.

mod error;
mod layout;
mod pdf;
mod pipeline;
pub mod raster;

pub use error::IngestError;
pub use layout::{remove_files, PendingFiles, StorageLayout};
pub use pdf::{LopdfRasterizer, PdfRasterizer, RenderedPage};
pub use pipeline::IngestionPipeline;
