//! PDF first-page rendering
//!
//! The pipeline talks to PDFs through the [`PdfRasterizer`] trait so a
//! full renderer can be plugged in without touching ingestion. The bundled
//! [`LopdfRasterizer`] covers the scanned-document case: it resolves the page
//! geometry with `lopdf` and composites the page's first JPEG image onto a
//! white canvas.

use crate::ingest::error::IngestError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object};
use std::path::Path;

/// US Letter, used when no `MediaBox` is found in the page tree
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Bound on `Parent` hops when resolving inherited page attributes
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// A rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: DynamicImage,
    /// Width / height of the page as displayed (after `/Rotate`)
    pub aspect_ratio: f64,
}

/// Renders PDF pages to rasters
///
/// Implementations are synchronous; the pipeline calls them from a
/// blocking worker.
pub trait PdfRasterizer: Send + Sync {
    /// Render page `page_index` (0-based) scaled to `width` pixels
    ///
    /// # Errors
    ///
    /// - `IngestError::EmptyPdf` if the document has no pages
    /// - `IngestError::Pdf` if it cannot be parsed or the page is missing
    fn render_page(
        &self,
        pdf: &Path,
        page_index: usize,
        width: u32,
    ) -> Result<RenderedPage, IngestError>;
}

/// `lopdf`-backed rasterizer
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfRasterizer;

impl LopdfRasterizer {
    /// Look up `key` on the page, then on its `Parent` chain
    fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut current = page;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if let Ok(value) = current.get(key) {
                return doc.dereference(value).ok().map(|(_, object)| object);
            }
            let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
            current = doc.get_dictionary(parent_id).ok()?;
        }
        None
    }

    fn media_box(doc: &Document, page: &Dictionary) -> [f64; 4] {
        let Some(Ok(values)) = Self::inherited(doc, page, b"MediaBox").map(Object::as_array)
        else {
            return DEFAULT_MEDIA_BOX;
        };

        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| doc.dereference(v).ok())
            .filter_map(|(_, v)| v.as_float().ok())
            .map(f64::from)
            .collect();

        match numbers.as_slice() {
            [x0, y0, x1, y1] if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
                [*x0, *y0, *x1, *y1]
            }
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    /// Clockwise rotation normalised to 0, 90, 180 or 270
    fn rotation(doc: &Document, page: &Dictionary) -> i64 {
        Self::inherited(doc, page, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .map(|r| r.rem_euclid(360) / 90 * 90)
            .unwrap_or(0)
    }

    /// First `DCTDecode` image XObject in the page resources, decoded
    fn first_jpeg_image(doc: &Document, page: &Dictionary) -> Option<DynamicImage> {
        let resources = Self::inherited(doc, page, b"Resources")?.as_dict().ok()?;
        let xobjects = resources.get(b"XObject").ok()?;
        let xobjects = doc.dereference(xobjects).ok()?.1.as_dict().ok()?;

        xobjects.iter().find_map(|(_, value)| {
            let stream = doc.dereference(value).ok()?.1.as_stream().ok()?;

            let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok()?;
            if subtype != b"Image" {
                return None;
            }

            let is_jpeg = match stream.dict.get(b"Filter").ok()? {
                Object::Name(name) => name == b"DCTDecode",
                Object::Array(filters) => filters
                    .last()
                    .and_then(|f| f.as_name().ok())
                    .is_some_and(|name| name == b"DCTDecode"),
                _ => false,
            };
            if !is_jpeg {
                return None;
            }

            image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok()
        })
    }
}

impl PdfRasterizer for LopdfRasterizer {
    fn render_page(
        &self,
        pdf: &Path,
        page_index: usize,
        width: u32,
    ) -> Result<RenderedPage, IngestError> {
        let doc = Document::load(pdf).map_err(|e| IngestError::pdf(e.to_string()))?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(IngestError::EmptyPdf);
        }

        let page_id = *pages.values().nth(page_index).ok_or_else(|| {
            IngestError::pdf(format!(
                "page {} out of range ({} pages)",
                page_index,
                pages.len()
            ))
        })?;
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| IngestError::pdf(e.to_string()))?;

        let [x0, y0, x1, y1] = Self::media_box(&doc, page);
        let rotation = Self::rotation(&doc, page);
        let (mut page_width, mut page_height) = ((x1 - x0).abs(), (y1 - y0).abs());
        if rotation == 90 || rotation == 270 {
            std::mem::swap(&mut page_width, &mut page_height);
        }
        let aspect_ratio = page_width / page_height;

        // Canvas size derived from the page box, not from any embedded image
        let canvas_width = width.max(1);
        let canvas_height = (canvas_width as f64 / aspect_ratio).round().max(1.0) as u32;

        let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, Rgb([255, 255, 255]));

        if let Some(scan) = Self::first_jpeg_image(&doc, page) {
            let scan = match rotation {
                90 => scan.rotate90(),
                180 => scan.rotate180(),
                270 => scan.rotate270(),
                _ => scan,
            };
            let scaled = scan
                .resize_exact(canvas_width, canvas_height, FilterType::Triangle)
                .to_rgb8();
            image::imageops::overlay(&mut canvas, &scaled, 0, 0);
        }

        tracing::debug!(
            pdf = %pdf.display(),
            pages = pages.len(),
            rotation,
            canvas_width,
            canvas_height,
            "Rendered PDF page"
        );

        Ok(RenderedPage {
            image: DynamicImage::ImageRgb8(canvas),
            aspect_ratio,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use image::GenericImageView;
    use tempfile::TempDir;

    fn write_pdf(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_empty_pdf_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(&dir, "empty.pdf", &empty_pdf());

        let result = LopdfRasterizer.render_page(&path, 0, 300);
        assert!(matches!(result, Err(IngestError::EmptyPdf)));
    }

    #[test]
    fn test_garbage_is_a_pdf_error() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(&dir, "junk.pdf", b"not a pdf at all");

        let result = LopdfRasterizer.render_page(&path, 0, 300);
        assert!(matches!(result, Err(IngestError::Pdf(_))));
    }

    #[test]
    fn test_page_size_follows_inherited_media_box() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(&dir, "a4.pdf", &single_page_pdf(595, 842, 0, None));

        let page = LopdfRasterizer.render_page(&path, 0, 300).unwrap();
        assert_eq!(page.image.dimensions(), (300, 425));
        assert!((page.aspect_ratio - 595.0 / 842.0).abs() < 1e-6);

        // Blank page renders white
        let [r, g, b, _] = page.image.get_pixel(150, 200).0;
        assert_eq!((r, g, b), (255, 255, 255));
    }

    #[test]
    fn test_rotation_swaps_orientation() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(&dir, "rotated.pdf", &single_page_pdf(595, 842, 90, None));

        let page = LopdfRasterizer.render_page(&path, 0, 300).unwrap();
        assert!(page.aspect_ratio > 1.0);
        assert_eq!(page.image.dimensions(), (300, 212));
    }

    #[test]
    fn test_scanned_page_is_composited() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(
            &dir,
            "scan.pdf",
            &single_page_pdf(600, 600, 0, Some([220, 20, 20])),
        );

        let page = LopdfRasterizer.render_page(&path, 0, 300).unwrap();
        let [r, g, b, _] = page.image.get_pixel(150, 150).0;
        assert!(r > 180, "red channel {}", r);
        assert!(g < 80 && b < 80, "green {} blue {}", g, b);
    }

    #[test]
    fn test_page_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(&dir, "one.pdf", &single_page_pdf(100, 100, 0, None));

        assert!(matches!(
            LopdfRasterizer.render_page(&path, 3, 300),
            Err(IngestError::Pdf(_))
        ));
    }
}
