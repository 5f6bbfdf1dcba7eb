//! # edgequake-pdf2img
//!
//! Rasterise PDF documents into one image per page and deliver the pages
//! inline (base64), as files under an output directory, or both.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (upload or URL)
//!  │
//!  ├─ 1. Params  validate and default the request against ServiceConfig
//!  ├─ 2. Input   size cap, %PDF- signature, guarded download
//!  ├─ 3. Render  page range split across spawn_blocking workers
//!  ├─ 4. Encode  png / jpeg / tiff / ppm, per worker
//!  ├─ 5. Store   base64 inline, files + URLs, or both
//!  └─ 6. Result  ConversionResult, or ErrorResult with a stable code
//! ```
//!
//! Rasterisation itself is delegated to a [`RasterEngine`]: pdfium through
//! `pdfium-render` by default, poppler's `pdftocairo` as the alternate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{ConversionParams, Converter, ServiceConfig, StorageType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::from_env()?;
//!     let converter = Converter::new(config);
//!
//!     let bytes = std::fs::read("document.pdf")?;
//!     let params = ConversionParams {
//!         dpi: Some(150),
//!         storage_type: Some(StorageType::Inline),
//!         ..Default::default()
//!     };
//!     let result = converter.convert_upload(bytes, Some("document.pdf"), &params).await?;
//!     println!("{} pages", result.pages_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod params;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DeliveryMode, OutputFormat, ServiceConfig, ServiceConfigBuilder, StorageType};
pub use convert::Converter;
pub use engine::{PdfiumEngine, PopplerEngine, RasterEngine, RasterJob};
pub use error::{ConvertError, EngineError, ErrorCode, ErrorResult};
pub use output::{ConversionResult, DocumentInfo, PageImage, StoredArtifact};
pub use params::{ConversionParams, ConversionRequest};
pub use pipeline::input::{SourceDocument, SourceOrigin};
