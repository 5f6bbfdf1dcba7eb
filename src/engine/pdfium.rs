//! pdfium-backed engine.
//!
//! pdfium keeps global library state and is not re-entrant, so every call
//! binds, works and unbinds under one process-wide lock. Parallel page
//! chunks therefore queue here; the worker fan-out still bounds latency of
//! the encode step, which runs outside the lock.

use super::{RasterEngine, RasterJob};
use crate::error::EngineError;
use crate::output::DocumentInfo;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Rasterises through the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_dir: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Bind from `library_dir` when given, else from the system library path.
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| EngineError::NotInstalled {
            engine: self.name().to_string(),
            detail: format!("{e:?}"),
        })?;
        Ok(Pdfium::new(bindings))
    }

    /// Run `f` against a freshly bound pdfium with the global lock held.
    fn with_pdfium<T>(
        &self,
        f: impl FnOnce(&Pdfium) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let pdfium = self.bind()?;
        f(&pdfium)
    }
}

fn open<'a>(pdfium: &'a Pdfium, pdf: &'a [u8]) -> Result<PdfDocument<'a>, EngineError> {
    pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| EngineError::Corrupted(format!("{e:?}")))
}

impl RasterEngine for PdfiumEngine {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn page_count(&self, pdf: &[u8]) -> Result<usize, EngineError> {
        self.with_pdfium(|pdfium| Ok(open(pdfium, pdf)?.pages().len() as usize))
    }

    fn rasterize(&self, pdf: &[u8], job: &RasterJob) -> Result<Vec<DynamicImage>, EngineError> {
        self.with_pdfium(|pdfium| {
            let document = open(pdfium, pdf)?;
            let pages = document.pages();
            let total = pages.len() as usize;
            if job.last_page > total {
                return Err(EngineError::Failed(format!(
                    "page {} requested but document has {} pages",
                    job.last_page, total
                )));
            }

            let mut images = Vec::with_capacity(job.page_count());
            for page_num in job.first_page..=job.last_page {
                let page = pages
                    .get((page_num - 1) as u16)
                    .map_err(|e| EngineError::Failed(format!("page {page_num}: {e:?}")))?;

                let (w, h) = job.pixel_size(page.width().value, page.height().value);
                let mut render_config = PdfRenderConfig::new()
                    .set_target_width(w as i32)
                    .set_maximum_height(h as i32)
                    .use_grayscale_rendering(job.grayscale);
                if job.transparent {
                    render_config = render_config.set_clear_color(PdfColor::new(255, 255, 255, 0));
                }

                let bitmap = page
                    .render_with_config(&render_config)
                    .map_err(|e| EngineError::Failed(format!("page {page_num}: {e:?}")))?;
                let image = bitmap.as_image();
                debug!(
                    "pdfium rendered page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
                images.push(image);
            }
            Ok(images)
        })
    }

    fn extract_info(&self, pdf: &[u8]) -> Result<DocumentInfo, EngineError> {
        self.with_pdfium(|pdfium| {
            let document = open(pdfium, pdf)?;
            let metadata = document.metadata();

            let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
                metadata.get(tag).and_then(|t| {
                    let v = t.value().trim().to_string();
                    if v.is_empty() {
                        None
                    } else {
                        Some(v)
                    }
                })
            };

            Ok(DocumentInfo {
                pages: document.pages().len() as usize,
                title: get_meta(PdfDocumentMetadataTagType::Title),
                subject: get_meta(PdfDocumentMetadataTagType::Subject),
                author: get_meta(PdfDocumentMetadataTagType::Author),
                creator: get_meta(PdfDocumentMetadataTagType::Creator),
                producer: get_meta(PdfDocumentMetadataTagType::Producer),
                creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
                modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_dir_reports_not_installed() {
        let engine = PdfiumEngine::new(Some(PathBuf::from("/definitely/not/a/pdfium/dir")));
        match engine.page_count(b"%PDF-1.4") {
            Err(EngineError::NotInstalled { engine, .. }) => assert_eq!(engine, "pdfium"),
            other => panic!("expected NotInstalled, got {other:?}"),
        }
    }
}
