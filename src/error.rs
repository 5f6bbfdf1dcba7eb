//! Error types for the edgequake-pdf2img library.
//!
//! Three layers, each with its own job:
//!
//! * [`EngineError`]: what a [`crate::engine::RasterEngine`] adapter can
//!   report: the engine is missing, the document would not open, or
//!   something else went wrong while rendering.
//!
//! * [`ConvertError`]: every failure the orchestration layer can hit,
//!   with enough structure for logs and tests to match on.
//!
//! * [`ErrorResult`]: the caller-visible shape: `success = false`, a
//!   readable message and one stable [`ErrorCode`]. Built from any
//!   `ConvertError`; nothing else crosses the public boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidFileFormat,
    FileTooLarge,
    DownloadFailed,
    ConversionFailed,
    PdfCorrupted,
    EngineNotInstalled,
    Timeout,
    ValidationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFileFormat => "INVALID_FILE_FORMAT",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::ConversionFailed => "CONVERSION_FAILED",
            ErrorCode::PdfCorrupted => "PDF_CORRUPTED",
            ErrorCode::EngineNotInstalled => "ENGINE_NOT_INSTALLED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by a rasterisation engine adapter.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine binary or shared library could not be found or loaded.
    #[error("{engine} is not installed: {detail}")]
    NotInstalled { engine: String, detail: String },

    /// The engine refused to open the document.
    #[error("document could not be opened: {0}")]
    Corrupted(String),

    /// Any other engine-side failure.
    #[error("{0}")]
    Failed(String),
}

/// All failures of the conversion orchestration layer.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Payload is empty or lacks the `%PDF-` signature.
    #[error("Not a valid PDF file: {reason}")]
    InvalidFileFormat { reason: String },

    /// Uploaded payload exceeds the configured maximum.
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// URL fetch failed: connection, DNS, non-2xx or body over the cap.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// URL fetch exceeded the download timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Parameter errors ──────────────────────────────────────────────────
    /// A request parameter is out of range or inconsistent.
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The selected rasterisation engine is unavailable.
    #[error("Rasterisation engine '{engine}' is not installed: {detail}")]
    EngineNotInstalled { engine: String, detail: String },

    /// The engine could not parse or open the document.
    #[error("PDF is corrupted or unreadable: {0}")]
    PdfCorrupted(String),

    /// Any other engine or encoding failure.
    #[error("PDF conversion failed: {0}")]
    ConversionFailed(String),

    /// The render call exceeded its wall-clock budget.
    #[error("Conversion timed out after {secs}s; reduce the page range or raise the timeout")]
    Timeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A page image could not be written to the output directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ConvertError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The stable code this error is reported under.
    ///
    /// Anything without a dedicated row in the taxonomy reports as
    /// [`ErrorCode::ConversionFailed`].
    pub fn code(&self) -> ErrorCode {
        match self {
            ConvertError::InvalidFileFormat { .. } => ErrorCode::InvalidFileFormat,
            ConvertError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            ConvertError::DownloadFailed { .. } | ConvertError::DownloadTimeout { .. } => {
                ErrorCode::DownloadFailed
            }
            ConvertError::Validation { .. } => ErrorCode::ValidationError,
            ConvertError::EngineNotInstalled { .. } => ErrorCode::EngineNotInstalled,
            ConvertError::PdfCorrupted(_) => ErrorCode::PdfCorrupted,
            ConvertError::Timeout { .. } => ErrorCode::Timeout,
            ConvertError::ConversionFailed(_)
            | ConvertError::OutputWriteFailed { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::Internal(_) => ErrorCode::ConversionFailed,
        }
    }
}

impl From<EngineError> for ConvertError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotInstalled { engine, detail } => {
                ConvertError::EngineNotInstalled { engine, detail }
            }
            EngineError::Corrupted(detail) => ConvertError::PdfCorrupted(detail),
            EngineError::Failed(detail) => ConvertError::ConversionFailed(detail),
        }
    }
}

/// Caller-visible failure: mutually exclusive with a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub success: bool,
    pub message: String,
    pub error_code: ErrorCode,
}

impl From<ConvertError> for ErrorResult {
    fn from(e: ConvertError) -> Self {
        ErrorResult::from(&e)
    }
}

impl From<&ConvertError> for ErrorResult {
    fn from(e: &ConvertError) -> Self {
        ErrorResult {
            success: false,
            message: e.to_string(),
            error_code: e.code(),
        }
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code, self.message)
    }
}

impl std::error::Error for ErrorResult {}
