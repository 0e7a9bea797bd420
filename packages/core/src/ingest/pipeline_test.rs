//! Tests for IngestionPipeline
//!
//! Exercise full image/PDF ingestion against a temporary layout, including
//! the cleanup guarantees on failure.

use super::*;
use crate::ingest::pdf::test_support::{empty_pdf, single_page_pdf};
use crate::ingest::pdf::RenderedPage;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

async fn create_test_pipeline() -> (IngestionPipeline, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(temp_dir.path());
    layout.ensure().await.unwrap();
    (IngestionPipeline::new(layout, IngestConfig::default()), temp_dir)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if x == width / 2 && y == height / 2 {
            Rgb([0x10, 0x20, 0x30])
        } else {
            Rgb([200, 200, 200])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn assert_layout_empty(layout: &StorageLayout) {
    assert_eq!(file_count(layout.originals_dir()), 0);
    assert_eq!(file_count(layout.previews_dir()), 0);
    assert_eq!(file_count(layout.thumbnails_dir()), 0);
}

#[tokio::test]
async fn test_ingest_image_creates_three_renditions() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;
    let source = png_bytes(2000, 1000);

    let node = pipeline.ingest_image(Cursor::new(source.clone())).await.unwrap();

    assert_eq!(node.node_type, NodeType::Image);
    assert_eq!(node.title, format!("Image_{}", node.id));
    assert!(node.parent_id.is_none());
    assert!((node.aspect_ratio - 2.0).abs() < 1e-9);
    assert_eq!(node.dominant_color, Some(0xFF10_2030));
    assert!(node.validate().is_ok());

    let original = node.original_path.clone().unwrap();
    assert_eq!(original, pipeline.layout().original_path(&node.id, "png"));
    assert_eq!(std::fs::read(&original).unwrap(), source);

    let preview = image::open(node.preview_path.as_ref().unwrap()).unwrap();
    assert_eq!(preview.dimensions(), (1080, 540));

    let thumbnail = image::open(node.thumbnail_path.as_ref().unwrap()).unwrap();
    assert_eq!(thumbnail.dimensions(), (300, 150));
}

#[tokio::test]
async fn test_small_image_is_not_upscaled() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let node = pipeline
        .ingest_image(Cursor::new(png_bytes(120, 80)))
        .await
        .unwrap();

    let thumbnail = image::open(node.thumbnail_path.as_ref().unwrap()).unwrap();
    let preview = image::open(node.preview_path.as_ref().unwrap()).unwrap();
    assert_eq!(thumbnail.dimensions(), (120, 80));
    assert_eq!(preview.dimensions(), (120, 80));
}

#[tokio::test]
async fn test_undecodable_image_leaves_no_files() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let mut corrupt = png_bytes(64, 64);
    corrupt.truncate(40);

    let result = pipeline.ingest_image(Cursor::new(corrupt)).await;
    assert!(matches!(result, Err(IngestError::Decode(_))));
    assert_layout_empty(pipeline.layout());
}

#[tokio::test]
async fn test_unrecognised_bytes_are_unsupported() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let result = pipeline
        .ingest_image(Cursor::new(b"just some plain text".to_vec()))
        .await;
    assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    assert_layout_empty(pipeline.layout());

    let result = pipeline.ingest_image(Cursor::new(Vec::new())).await;
    assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
}

#[tokio::test]
async fn test_ingest_pdf_creates_thumbnail_only() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;
    let source = single_page_pdf(595, 842, 0, Some([30, 30, 200]));

    let node = pipeline.ingest_pdf(Cursor::new(source.clone())).await.unwrap();

    assert_eq!(node.node_type, NodeType::Pdf);
    assert_eq!(node.title, format!("PDF_{}", node.id));
    assert!(node.preview_path.is_none());
    assert!((node.aspect_ratio - 595.0 / 842.0).abs() < 1e-6);
    assert!(node.validate().is_ok());

    let original = node.original_path.clone().unwrap();
    assert_eq!(original, pipeline.layout().original_path(&node.id, "pdf"));
    assert_eq!(std::fs::read(&original).unwrap(), source);

    let thumbnail = image::open(node.thumbnail_path.as_ref().unwrap()).unwrap();
    assert_eq!(thumbnail.width(), 300);
    assert_eq!(file_count(pipeline.layout().previews_dir()), 0);
}

#[tokio::test]
async fn test_empty_pdf_fails_and_leaves_layout_unchanged() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let result = pipeline.ingest_pdf(Cursor::new(empty_pdf())).await;
    assert!(matches!(result, Err(IngestError::EmptyPdf)));
    assert_layout_empty(pipeline.layout());
}

#[tokio::test]
async fn test_ingest_file_dispatches_on_header() {
    let (pipeline, temp_dir) = create_test_pipeline().await;

    let pdf_path = temp_dir.path().join("document.bin");
    std::fs::write(&pdf_path, single_page_pdf(200, 100, 0, None)).unwrap();
    let image_path = temp_dir.path().join("photo.bin");
    std::fs::write(&image_path, png_bytes(50, 50)).unwrap();

    let pdf = pipeline.ingest_file(&pdf_path).await.unwrap();
    let image = pipeline.ingest_file(&image_path).await.unwrap();

    assert_eq!(pdf.node_type, NodeType::Pdf);
    assert_eq!(image.node_type, NodeType::Image);
    assert!(image.original_path.unwrap().extension().unwrap() == "png");
}

#[tokio::test]
async fn test_ingest_file_missing_path_is_io_error() {
    let (pipeline, temp_dir) = create_test_pipeline().await;

    let result = pipeline
        .ingest_file(&temp_dir.path().join("missing.jpg"))
        .await;
    assert!(matches!(result, Err(IngestError::Io { .. })));
}

struct FailingRasterizer;

impl PdfRasterizer for FailingRasterizer {
    fn render_page(&self, _: &Path, _: usize, _: u32) -> Result<RenderedPage, IngestError> {
        Err(IngestError::pdf("renderer unavailable"))
    }
}

#[tokio::test]
async fn test_rasterizer_failure_removes_copied_original() {
    let temp_dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(temp_dir.path());
    layout.ensure().await.unwrap();
    let pipeline = IngestionPipeline::with_rasterizer(
        layout,
        IngestConfig::default(),
        Arc::new(FailingRasterizer),
    );

    let result = pipeline
        .ingest_pdf(Cursor::new(single_page_pdf(100, 100, 0, None)))
        .await;
    assert!(matches!(result, Err(IngestError::Pdf(_))));
    assert_layout_empty(pipeline.layout());
}

#[tokio::test]
async fn test_custom_thumbnail_config() {
    let temp_dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(temp_dir.path());
    layout.ensure().await.unwrap();
    let config = IngestConfig {
        thumbnail_width: 64,
        ..IngestConfig::default()
    };
    let pipeline = IngestionPipeline::new(layout, config);

    let node = pipeline
        .ingest_image(Cursor::new(png_bytes(640, 320)))
        .await
        .unwrap();

    let thumbnail = image::open(node.thumbnail_path.as_ref().unwrap()).unwrap();
    assert_eq!(thumbnail.dimensions(), (64, 32));
}
