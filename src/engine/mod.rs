//! Rasterisation engines.
//!
//! The conversion layer never touches a PDF renderer directly; it drives a
//! [`RasterEngine`]: a blocking, thread-safe capability that can count
//! pages, rasterise a contiguous page range and read document metadata.
//!
//! | Engine | Backend | Selected by |
//! |--------|---------|-------------|
//! | [`PdfiumEngine`]  | pdfium shared library via `pdfium-render` | default |
//! | [`PopplerEngine`] | `pdftocairo` / `pdfinfo` subprocesses     | `use_alt_engine` |
//!
//! Methods are called from `spawn_blocking` worker threads, possibly several
//! at once for different page ranges of the same document.

mod pdfium;
mod poppler;

pub use pdfium::PdfiumEngine;
pub use poppler::PopplerEngine;

use crate::error::EngineError;
use crate::output::DocumentInfo;
use image::DynamicImage;

/// Rendering instructions for one contiguous page range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterJob {
    /// 1-indexed, inclusive.
    pub first_page: usize,
    /// 1-indexed, inclusive.
    pub last_page: usize,
    pub dpi: u32,
    pub grayscale: bool,
    /// Render with a fully transparent background.
    pub transparent: bool,
    /// Longest edge in pixels, overriding `dpi` while keeping aspect ratio.
    pub target_size: Option<u32>,
    /// Hard cap on the longest edge in pixels.
    pub max_pixels: u32,
}

impl RasterJob {
    pub fn page_count(&self) -> usize {
        self.last_page + 1 - self.first_page
    }

    /// Pixel dimensions for a page of `width_pts × height_pts` points.
    pub fn pixel_size(&self, width_pts: f32, height_pts: f32) -> (u32, u32) {
        let mut w = (width_pts * self.dpi as f32 / 72.0).max(1.0);
        let mut h = (height_pts * self.dpi as f32 / 72.0).max(1.0);

        if let Some(size) = self.target_size {
            let scale = size as f32 / w.max(h);
            w *= scale;
            h *= scale;
        }

        let longest = w.max(h);
        if longest > self.max_pixels as f32 {
            let scale = self.max_pixels as f32 / longest;
            w *= scale;
            h *= scale;
        }

        (w.round().max(1.0) as u32, h.round().max(1.0) as u32)
    }
}

/// A PDF rasterisation backend.
pub trait RasterEngine: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Number of pages in the document.
    fn page_count(&self, pdf: &[u8]) -> Result<usize, EngineError>;

    /// Rasterise `job.first_page..=job.last_page`, one image per page in page order.
    fn rasterize(&self, pdf: &[u8], job: &RasterJob) -> Result<Vec<DynamicImage>, EngineError>;

    /// Read document metadata without rendering.
    fn extract_info(&self, pdf: &[u8]) -> Result<DocumentInfo, EngineError>;
}
