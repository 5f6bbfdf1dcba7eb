//! Conversion and info entry points.
//!
//! [`Converter`] owns the shared configuration and the engines. Each call is
//! independent: it normalises the parameters, acquires the source, renders,
//! stores, and turns any failure into an [`ErrorResult`] on the way out.

use crate::config::ServiceConfig;
use crate::engine::{PdfiumEngine, PopplerEngine, RasterEngine};
use crate::error::{ConvertError, ErrorResult};
use crate::output::{ConversionResult, DocumentInfo};
use crate::params::{ConversionParams, ConversionRequest};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::info::extract_info;
use crate::pipeline::{render, store};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const SUCCESS_MESSAGE: &str = "PDF converted successfully";

/// Entry point for conversion and info calls.
///
/// Cheap to clone; clones share configuration and engines.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServiceConfig>,
    engine: Arc<dyn RasterEngine>,
    alt_engine: Option<Arc<dyn RasterEngine>>,
}

impl Converter {
    /// pdfium as the primary engine, poppler's `pdftocairo` as the
    /// alternate. Both look in `config.engine_path` first.
    pub fn new(config: ServiceConfig) -> Self {
        let engine = Arc::new(PdfiumEngine::new(config.engine_path.clone()));
        let alt_engine = Arc::new(PopplerEngine::new(config.engine_path.clone()));
        Self {
            config: Arc::new(config),
            engine,
            alt_engine: Some(alt_engine),
        }
    }

    /// Replace the primary engine.
    pub fn with_engine(mut self, engine: Arc<dyn RasterEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the alternate engine; `None` makes `use_alt_engine` requests
    /// fail with `ENGINE_NOT_INSTALLED`.
    pub fn with_alt_engine(mut self, engine: Option<Arc<dyn RasterEngine>>) -> Self {
        self.alt_engine = engine;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Convert an already-acquired document.
    pub async fn convert(
        &self,
        source: &SourceDocument,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ErrorResult> {
        report(self.try_convert(source, params).await)
    }

    /// Validate an uploaded buffer and convert it.
    pub async fn convert_upload(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ErrorResult> {
        report(self.try_convert_upload(bytes, filename, params).await)
    }

    /// Download a PDF and convert it.
    ///
    /// Parameters are validated before the download starts.
    pub async fn convert_url(
        &self,
        url: &str,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ErrorResult> {
        report(self.try_convert_url(url, params).await)
    }

    async fn try_convert(
        &self,
        source: &SourceDocument,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ConvertError> {
        let request = params.normalize(&self.config)?;
        self.convert_request(source, &request).await
    }

    async fn try_convert_upload(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ConvertError> {
        let request = params.normalize(&self.config)?;
        let source = input::from_upload(bytes, filename, &self.config)?;
        self.convert_request(&source, &request).await
    }

    async fn try_convert_url(
        &self,
        url: &str,
        params: &ConversionParams,
    ) -> Result<ConversionResult, ConvertError> {
        let request = params.normalize(&self.config)?;
        let source = input::from_url(url, &self.config).await?;
        self.convert_request(&source, &request).await
    }

    async fn convert_request(
        &self,
        source: &SourceDocument,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConvertError> {
        let start = Instant::now();
        let engine = self.select_engine(request.use_alt_engine)?;
        info!(
            "Converting '{}' ({} bytes) with {}: dpi={} format={} threads={}",
            source.doc_id(),
            source.len(),
            engine.name(),
            request.dpi,
            request.format,
            request.thread_count
        );
        debug!("Normalised request: {:?}", request);

        let pages = render::render_pages(
            engine,
            source.shared_bytes(),
            request,
            self.config.max_rendered_pixels,
        )
        .await?;
        let render_ms = start.elapsed().as_millis();

        let stored = store::store_pages(&pages, request, source.doc_id(), &self.config).await?;
        info!(
            "Converted {} page(s) in {}ms (render {}ms)",
            pages.len(),
            start.elapsed().as_millis(),
            render_ms
        );

        Ok(ConversionResult {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            pages_count: pages.len(),
            images: stored.delivered(request.delivery_mode),
            file_urls: stored.file_urls(),
            format: request.format,
            storage_type: request.storage_type,
            delivery_mode: request.delivery_mode,
            warnings: stored.warnings,
            artifacts: stored.artifacts,
        })
    }

    fn select_engine(&self, alternate: bool) -> Result<Arc<dyn RasterEngine>, ConvertError> {
        if !alternate {
            return Ok(Arc::clone(&self.engine));
        }
        self.alt_engine
            .clone()
            .ok_or_else(|| ConvertError::EngineNotInstalled {
                engine: "alternate".into(),
                detail: "no alternate rasterisation engine is configured".into(),
            })
    }

    // ── Info ─────────────────────────────────────────────────────────────

    /// Read metadata from an already-acquired document.
    pub async fn info(&self, source: &SourceDocument) -> Result<DocumentInfo, ErrorResult> {
        report(self.info_source(source).await)
    }

    pub async fn info_upload(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
    ) -> Result<DocumentInfo, ErrorResult> {
        match input::from_upload(bytes, filename, &self.config) {
            Ok(source) => report(self.info_source(&source).await),
            Err(e) => report(Err(e)),
        }
    }

    pub async fn info_url(&self, url: &str) -> Result<DocumentInfo, ErrorResult> {
        match input::from_url(url, &self.config).await {
            Ok(source) => report(self.info_source(&source).await),
            Err(e) => report(Err(e)),
        }
    }

    async fn info_source(&self, source: &SourceDocument) -> Result<DocumentInfo, ConvertError> {
        let info = extract_info(
            Arc::clone(&self.engine),
            source.shared_bytes(),
            self.config.default_timeout_secs,
        )
        .await?;
        info!("'{}': {} page(s)", source.doc_id(), info.pages);
        Ok(info)
    }
}

/// Funnel an internal result through the error mapper.
fn report<T>(result: Result<T, ConvertError>) -> Result<T, ErrorResult> {
    result.map_err(|e| {
        warn!("Request failed [{}]: {}", e.code(), e);
        ErrorResult::from(e)
    })
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("engine", &self.engine.name())
            .field("alt_engine", &self.alt_engine.as_ref().map(|e| e.name()))
            .field("output_dir", &self.config.output_dir)
            .finish()
    }
}
