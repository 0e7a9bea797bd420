//! Ingestion Pipeline
//!
//! Turns an image or PDF byte stream into an unsaved `Node` plus files in
//! the [`StorageLayout`]. The database is never touched here; callers decide
//! where the node goes and persist it.
//!
//! # Image flow
//!
//! 1. Sniff the header to pick the original's extension
//! 2. Copy the stream verbatim to `originals/{id}.{ext}`
//! 3. On a blocking worker: decode, write `previews/{id}.jpg` and
//!    `thumbnails/{id}.jpg`, sample the center pixel
//! 4. Build the node (`Image_{id}`)
//!
//! # PDF flow
//!
//! 1. Copy the stream verbatim to `originals/{id}.pdf`
//! 2. On a blocking worker: render page 0 at thumbnail width, write
//!    `thumbnails/{id}.jpg`
//! 3. Build the node (`PDF_{id}`, no preview)
//!
//! # Failure
//!
//! Every path is registered with a [`PendingFiles`] guard before the file is
//! created. Any error, panic or cancellation drops the guard and removes
//! them, leaving the layout as it was.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rubix_core::config::IngestConfig;
//! use rubix_core::ingest::{IngestionPipeline, StorageLayout};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = StorageLayout::new("/tmp/rubix");
//! layout.ensure().await?;
//! let pipeline = IngestionPipeline::new(layout, IngestConfig::default());
//!
//! let node = pipeline.ingest_file("scan.jpg".as_ref()).await?;
//! assert!(node.thumbnail_path.is_some());
//! # Ok(())
//! # }
//! ```

use crate::config::IngestConfig;
use crate::ingest::error::IngestError;
use crate::ingest::layout::{PendingFiles, StorageLayout};
use crate::ingest::pdf::{LopdfRasterizer, PdfRasterizer};
use crate::ingest::raster::{render_image_renditions, write_rendition};
use crate::models::{Node, NodeType};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

/// Bytes inspected to recognise a format
const SNIFF_LEN: usize = 32;

/// Magic prefix of a PDF file
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Copies assets into the layout and derives their renditions
#[derive(Clone)]
pub struct IngestionPipeline {
    layout: StorageLayout,
    config: IngestConfig,
    rasterizer: Arc<dyn PdfRasterizer>,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("layout", &self.layout)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    /// Create a pipeline using the bundled `lopdf` rasterizer
    pub fn new(layout: StorageLayout, config: IngestConfig) -> Self {
        Self::with_rasterizer(layout, config, Arc::new(LopdfRasterizer))
    }

    /// Create a pipeline with a custom PDF rasterizer
    pub fn with_rasterizer(
        layout: StorageLayout,
        config: IngestConfig,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        Self {
            layout,
            config,
            rasterizer,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest an image stream
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` if the header is not a readable image format
    ///   (no file is created in that case)
    /// - `Decode` if the bytes cannot be decoded
    /// - `Io` / `Encode` / `TaskFailed` for storage and worker failures
    pub async fn ingest_image<R>(&self, mut source: R) -> Result<Node, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let id = Uuid::new_v4().to_string();

        let header = read_header(&mut source)
            .await
            .map_err(|e| IngestError::io("<source>", e))?;
        let extension = image_extension(&header)?;

        let mut pending = PendingFiles::new();
        let original = pending.register(self.layout.original_path(&id, extension));
        copy_to(&header, &mut source, &original).await?;

        let preview = pending.register(self.layout.preview_path(&id));
        let thumbnail = pending.register(self.layout.thumbnail_path(&id));

        // The guard travels with the blocking job so a cancelled await still
        // cleans up once the worker finishes.
        let config = self.config.clone();
        let (summary, pending) = {
            let original = original.clone();
            let preview = preview.clone();
            let thumbnail = thumbnail.clone();
            tokio::task::spawn_blocking(move || {
                render_image_renditions(&original, &preview, &thumbnail, &config)
                    .map(|summary| (summary, pending))
            })
            .await??
        };

        let mut node = Node::new_with_id(id.clone(), NodeType::Image, format!("Image_{}", id), None);
        node.aspect_ratio = summary.aspect_ratio;
        node.dominant_color = Some(summary.dominant_color);
        node.original_path = Some(original);
        node.preview_path = Some(preview);
        node.thumbnail_path = Some(thumbnail);

        pending.commit();

        tracing::info!(
            node_id = %id,
            format = extension,
            width = summary.width,
            height = summary.height,
            "Ingested image"
        );

        Ok(node)
    }

    /// Ingest a PDF stream
    ///
    /// # Errors
    ///
    /// - `EmptyPdf` if the document has no pages
    /// - `Pdf` if it cannot be parsed or rendered
    /// - `Io` / `Encode` / `TaskFailed` for storage and worker failures
    pub async fn ingest_pdf<R>(&self, mut source: R) -> Result<Node, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let id = Uuid::new_v4().to_string();

        let mut pending = PendingFiles::new();
        let original = pending.register(self.layout.original_path(&id, "pdf"));
        copy_to(&[], &mut source, &original).await?;

        let thumbnail = pending.register(self.layout.thumbnail_path(&id));

        let rasterizer = Arc::clone(&self.rasterizer);
        let width = self.config.thumbnail_width;
        let quality = self.config.thumbnail_quality;
        let (aspect_ratio, pending) = {
            let original = original.clone();
            let thumbnail = thumbnail.clone();
            tokio::task::spawn_blocking(move || {
                let page = rasterizer.render_page(&original, 0, width)?;
                write_rendition(&page.image, &thumbnail, width, quality)?;
                Ok::<_, IngestError>((page.aspect_ratio, pending))
            })
            .await??
        };

        let mut node = Node::new_with_id(id.clone(), NodeType::Pdf, format!("PDF_{}", id), None);
        node.aspect_ratio = aspect_ratio;
        node.original_path = Some(original);
        node.thumbnail_path = Some(thumbnail);
        node.preview_path = None;

        pending.commit();

        tracing::info!(node_id = %id, aspect_ratio, "Ingested PDF");

        Ok(node)
    }

    /// Ingest a file from disk, dispatching on its header
    ///
    /// `%PDF-` goes to [`Self::ingest_pdf`], anything else to
    /// [`Self::ingest_image`].
    pub async fn ingest_file(&self, path: &Path) -> Result<Node, IngestError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| IngestError::io(path, e))?;

        let header = read_header(&mut file)
            .await
            .map_err(|e| IngestError::io(path, e))?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| IngestError::io(path, e))?;

        if header.starts_with(PDF_MAGIC) {
            self.ingest_pdf(file).await
        } else {
            self.ingest_image(file).await
        }
    }
}

/// Read up to `SNIFF_LEN` bytes (fewer only at end of stream)
async fn read_header<R>(source: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = source.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    Ok(header)
}

/// File extension for a decodable image header
fn image_extension(header: &[u8]) -> Result<&'static str, IngestError> {
    let format = image::guess_format(header)
        .map_err(|_| IngestError::UnsupportedFormat("unrecognised image header".to_string()))?;

    if !format.reading_enabled() {
        return Err(IngestError::UnsupportedFormat(format!("{:?}", format)));
    }

    format
        .extensions_str()
        .first()
        .copied()
        .ok_or_else(|| IngestError::UnsupportedFormat(format!("{:?}", format)))
}

/// Write `prefix` followed by the rest of `source` to `path`
async fn copy_to<R>(prefix: &[u8], source: &mut R, path: &Path) -> Result<(), IngestError>
where
    R: AsyncRead + Unpin,
{
    let mut file = File::create(path)
        .await
        .map_err(|e| IngestError::io(path, e))?;

    file.write_all(prefix)
        .await
        .map_err(|e| IngestError::io(path, e))?;
    tokio::io::copy(source, &mut file)
        .await
        .map_err(|e| IngestError::io(path, e))?;
    file.flush().await.map_err(|e| IngestError::io(path, e))?;

    Ok(())
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
