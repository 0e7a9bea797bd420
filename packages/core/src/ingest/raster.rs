//! Raster helpers for rendition generation
//!
//! Everything here is synchronous and CPU-bound; callers run it inside
//! `tokio::task::spawn_blocking`.

use crate::config::IngestConfig;
use crate::ingest::error::IngestError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Facts about a decoded original, collected before the raster is dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSummary {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    /// ARGB of the center pixel
    pub dominant_color: u32,
}

/// Target size for a rendition of at most `max_width` pixels wide
///
/// Never upscales: an original narrower than `max_width` keeps its width.
/// Height follows the original aspect ratio and is at least 1.
pub fn fit_to_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let target_width = width.min(max_width).max(1);
    let target_height = (target_width as f64 * height as f64 / width.max(1) as f64)
        .round()
        .max(1.0) as u32;
    (target_width, target_height)
}

/// Packed ARGB of the pixel at `(w / 2, h / 2)`
pub fn center_argb(image: &DynamicImage) -> u32 {
    let (width, height) = image.dimensions();
    let [r, g, b, a] = image.get_pixel(width / 2, height / 2).0;
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Encode as baseline JPEG (alpha dropped)
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, IngestError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| IngestError::encode(e.to_string()))?;
    Ok(buffer)
}

/// Resize to fit `max_width` and write a JPEG to `path`
///
/// # Returns
///
/// The written `(width, height)`
pub fn write_rendition(
    image: &DynamicImage,
    path: &Path,
    max_width: u32,
    quality: u8,
) -> Result<(u32, u32), IngestError> {
    let (width, height) = image.dimensions();
    let target = fit_to_width(width, height, max_width);

    let encoded = if target == (width, height) {
        encode_jpeg(image, quality)?
    } else {
        let resized = image.resize_exact(target.0, target.1, FilterType::Triangle);
        encode_jpeg(&resized, quality)?
    };

    std::fs::write(path, encoded).map_err(|e| IngestError::io(path, e))?;
    Ok(target)
}

/// Decode the original and write its preview and thumbnail
///
/// The decoded raster lives only for the duration of this call.
pub fn render_image_renditions(
    original: &Path,
    preview: &Path,
    thumbnail: &Path,
    config: &IngestConfig,
) -> Result<ImageSummary, IngestError> {
    let bytes = std::fs::read(original).map_err(|e| IngestError::io(original, e))?;
    let image = image::load_from_memory(&bytes).map_err(|e| IngestError::decode(e.to_string()))?;
    drop(bytes);

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(IngestError::decode("image has no pixels"));
    }

    let summary = ImageSummary {
        width,
        height,
        aspect_ratio: width as f64 / height as f64,
        dominant_color: center_argb(&image),
    };

    write_rendition(&image, preview, config.preview_width, config.preview_quality)?;
    write_rendition(
        &image,
        thumbnail,
        config.thumbnail_width,
        config.thumbnail_quality,
    )?;

    tracing::debug!(
        width,
        height,
        preview = %preview.display(),
        thumbnail = %thumbnail.display(),
        "Generated image renditions"
    );

    Ok(summary)
}
