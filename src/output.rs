//! Result types returned by successful conversion and info calls.

use crate::config::{DeliveryMode, OutputFormat, StorageType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rendered page, encoded in the requested format.
///
/// Produced by the render stage and consumed by the storage stage.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page: usize,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Encoded image file bytes.
    pub data: Vec<u8>,
}

/// The stored or encoded form of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub page: usize,
    pub mime_type: String,
    pub size_bytes: usize,
    /// Base64 payload when kept inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
    /// Location on disk when persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Public URL of `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub message: String,
    pub pages_count: usize,
    /// Inline payloads or file paths, per `delivery_mode`, in page order.
    pub images: Vec<String>,
    /// Public URLs of the persisted pages, when files were written.
    pub file_urls: Option<Vec<String>>,
    pub format: OutputFormat,
    pub storage_type: StorageType,
    pub delivery_mode: DeliveryMode,
    /// Non-fatal problems, e.g. a failed file write under `storage_type=both`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Per-page detail; not serialised since `images` already carries the payloads.
    #[serde(skip)]
    pub artifacts: Vec<StoredArtifact>,
}

/// Document metadata, read without rasterising any page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub pages: usize,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}
