//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use edgequake_pdf2img::{
    Converter, DocumentInfo, EngineError, RasterEngine, RasterJob, ServiceConfig,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic stand-in for a real rasteriser.
///
/// Page `n` renders as a `(10 + n) x 5` white image, so tests can recover
/// the page number from the decoded width.
pub struct FakeEngine {
    pub pages: usize,
    /// Sleep per `rasterize` call.
    pub delay: Duration,
    /// When set, chunks starting on a lower page sleep longer, so later
    /// chunks finish first.
    pub reverse_finish: bool,
    pub fail_with: Option<EngineError>,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            delay: Duration::ZERO,
            reverse_finish: false,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn finishing_in_reverse(mut self) -> Self {
        self.reverse_finish = true;
        self
    }

    pub fn failing(mut self, err: EngineError) -> Self {
        self.fail_with = Some(err);
        self
    }

    /// Number of engine calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RasterEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn page_count(&self, _pdf: &[u8]) -> Result<usize, EngineError> {
        self.check()?;
        Ok(self.pages)
    }

    fn rasterize(&self, _pdf: &[u8], job: &RasterJob) -> Result<Vec<DynamicImage>, EngineError> {
        self.check()?;
        let mut delay = self.delay;
        if self.reverse_finish {
            delay += Duration::from_millis(30 * (self.pages.saturating_sub(job.first_page)) as u64);
        }
        std::thread::sleep(delay);

        Ok((job.first_page..=job.last_page)
            .map(|page| {
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    10 + page as u32,
                    5,
                    Rgba([255, 255, 255, 255]),
                ))
            })
            .collect())
    }

    fn extract_info(&self, _pdf: &[u8]) -> Result<DocumentInfo, EngineError> {
        self.check()?;
        Ok(DocumentInfo {
            pages: self.pages,
            title: Some("Fixture".into()),
            author: Some("Tests".into()),
            creation_date: Some("D:20240101100000+08'00'".into()),
            ..Default::default()
        })
    }
}

/// A converter driving `engine`, storing under `output_dir`, with no
/// alternate engine.
pub fn converter(engine: Arc<FakeEngine>, output_dir: &Path) -> Converter {
    let config = ServiceConfig::builder()
        .output_dir(output_dir)
        .output_base_url("http://localhost:8000/files")
        .max_thread_count(8)
        .build()
        .expect("valid test config");
    Converter::new(config)
        .with_engine(engine)
        .with_alt_engine(None)
}

/// A small but well-formed PDF with `pages` blank pages and an Info
/// dictionary.
pub fn minimal_pdf(pages: usize) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let first_page_obj = 3;
    let info_obj = first_page_obj + pages;

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..pages)
        .map(|i| format!("{} 0 R", first_page_obj + i))
        .collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >>".to_string());
    }
    objects.push(
        "<< /Title (Fixture) /Author (Tests) /CreationDate (D:20240101100000+08'00') >>"
            .to_string(),
    );

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            info_obj,
            xref_at
        )
        .as_bytes(),
    );
    out
}

/// Width of a decoded inline or on-disk image.
pub fn decoded_width(bytes: &[u8]) -> u32 {
    image::load_from_memory(bytes)
        .expect("decodable image")
        .width()
}
