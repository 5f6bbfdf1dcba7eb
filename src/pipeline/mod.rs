//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements one step; [`crate::convert::Converter`] wires
//! them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ store
//! (upload/URL)  (engine)   (png/jpeg/…)  (inline/file/both)
//!
//! input ──▶ info
//!             (metadata only, no rasterisation)
//! ```
//!
//! 1. [`input`]: validate an upload or download a URL into PDF bytes
//! 2. [`render`]: split the page range across blocking workers; each one
//!    rasterises its chunk through a [`crate::engine::RasterEngine`]
//! 3. [`encode`]: write each page in the target image format (runs on the
//!    render workers)
//! 4. [`store`]: base64 the pages, write them to the output directory, or both
//! 5. [`info`]: page count and document-info fields

pub mod encode;
pub mod info;
pub mod input;
pub mod render;
pub mod store;
