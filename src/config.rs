//! Process-wide service configuration and the shared option enums.
//!
//! [`ServiceConfig`] is read once at start-up, from the environment via
//! [`ServiceConfig::from_env`] or assembled with [`ServiceConfig::builder`],
//! and then handed to the [`crate::Converter`] behind an `Arc`. Nothing in
//! the library mutates it afterwards, so concurrent conversions can share it
//! without locking.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration shared by every conversion call.
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ServiceConfig, StorageType};
///
/// let config = ServiceConfig::builder()
///     .output_dir("/tmp/pages")
///     .output_base_url("https://cdn.example.com/pages")
///     .default_storage_type(StorageType::Both)
///     .max_thread_count(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_thread_count, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Storage strategy used when a request does not name one. Default: `file`.
    pub default_storage_type: StorageType,

    /// Directory that receives file-backed page images.
    pub output_dir: PathBuf,

    /// Public base URL under which `output_dir` is served.
    pub output_base_url: String,

    /// Upper bound on PDF size in bytes, for uploads and downloads. Default: 50 MiB.
    pub max_file_size: u64,

    /// Rendering DPI when the request leaves it unset. Default: 200.
    pub default_dpi: u32,

    /// Output format when the request leaves it unset. Default: png.
    pub default_format: OutputFormat,

    /// Worker count when the request leaves it unset. Default: 1.
    pub default_thread_count: usize,

    /// Highest worker count a request may ask for. Default: 8.
    ///
    /// Requests above the cap are rejected, not clamped.
    pub max_thread_count: usize,

    /// Wall-clock budget for one render call, in seconds. Default: 600.
    pub default_timeout_secs: u64,

    /// Timeout for fetching a PDF from a URL, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 10 000.
    ///
    /// A 600-DPI render of an A0 poster would otherwise allocate well over a
    /// gigabyte of pixels.
    pub max_rendered_pixels: u32,

    /// Directory holding the pdfium shared library and/or the poppler
    /// binaries. When unset, the system library path and `PATH` are used.
    pub engine_path: Option<PathBuf>,

    /// Permit URL sources that resolve to loopback/private/link-local
    /// addresses. Default: false.
    pub allow_private_hosts: bool,

    /// Result cache switch, carried for the HTTP layer.
    pub enable_cache: bool,

    /// Result cache TTL in seconds, carried for the HTTP layer.
    pub cache_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_storage_type: StorageType::File,
            output_dir: PathBuf::from("/tmp/pdf2image_output"),
            output_base_url: "http://localhost:8000/files".to_string(),
            max_file_size: 50 * 1024 * 1024,
            default_dpi: 200,
            default_format: OutputFormat::Png,
            default_thread_count: 1,
            max_thread_count: 8,
            default_timeout_secs: 600,
            download_timeout_secs: 60,
            max_rendered_pixels: 10_000,
            engine_path: None,
            allow_private_hosts: false,
            enable_cache: false,
            cache_ttl_secs: 3600,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder seeded with the defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults; set but malformed ones are
    /// an error rather than being silently ignored.
    pub fn from_env() -> Result<Self, ConvertError> {
        let d = Self::default();
        let config = Self {
            default_storage_type: env_or("OUTPUT_STORAGE_TYPE", d.default_storage_type)?,
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
            output_base_url: std::env::var("OUTPUT_BASE_URL").unwrap_or(d.output_base_url),
            max_file_size: env_or("MAX_FILE_SIZE", d.max_file_size)?,
            default_dpi: env_or("DEFAULT_DPI", d.default_dpi)?,
            default_format: env_or("DEFAULT_FORMAT", d.default_format)?,
            default_thread_count: d.default_thread_count,
            max_thread_count: env_or("MAX_THREAD_COUNT", d.max_thread_count)?,
            default_timeout_secs: env_or("DEFAULT_TIMEOUT", d.default_timeout_secs)?,
            download_timeout_secs: env_or("DOWNLOAD_TIMEOUT", d.download_timeout_secs)?,
            max_rendered_pixels: env_or("MAX_RENDERED_PIXELS", d.max_rendered_pixels)?,
            engine_path: std::env::var("ENGINE_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            allow_private_hosts: env_or("ALLOW_PRIVATE_HOSTS", d.allow_private_hosts)?,
            enable_cache: env_or("ENABLE_CACHE", d.enable_cache)?,
            cache_ttl_secs: env_or("CACHE_TTL", d.cache_ttl_secs)?,
        };
        ServiceConfigBuilder { config }.build()
    }

    /// Externally reachable URL of a stored file.
    pub fn file_url(&self, filename: &str) -> String {
        format!("{}/{}", self.output_base_url.trim_end_matches('/'), filename)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, ConvertError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| ConvertError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
        _ => Ok(default),
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn default_storage_type(mut self, storage: StorageType) -> Self {
        self.config.default_storage_type = storage;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.output_base_url = url.into();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn default_dpi(mut self, dpi: u32) -> Self {
        self.config.default_dpi = dpi;
        self
    }

    pub fn default_format(mut self, format: OutputFormat) -> Self {
        self.config.default_format = format;
        self
    }

    pub fn default_thread_count(mut self, n: usize) -> Self {
        self.config.default_thread_count = n;
        self
    }

    pub fn max_thread_count(mut self, n: usize) -> Self {
        self.config.max_thread_count = n;
        self
    }

    pub fn default_timeout_secs(mut self, secs: u64) -> Self {
        self.config.default_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine_path = Some(path.into());
        self
    }

    pub fn allow_private_hosts(mut self, v: bool) -> Self {
        self.config.allow_private_hosts = v;
        self
    }

    pub fn enable_cache(mut self, v: bool) -> Self {
        self.config.enable_cache = v;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.max_thread_count == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_thread_count must be ≥ 1".into(),
            ));
        }
        if c.default_thread_count == 0 || c.default_thread_count > c.max_thread_count {
            return Err(ConvertError::InvalidConfig(format!(
                "default_thread_count must be 1–{}, got {}",
                c.max_thread_count, c.default_thread_count
            )));
        }
        if !(crate::params::MIN_DPI..=crate::params::MAX_DPI).contains(&c.default_dpi) {
            return Err(ConvertError::InvalidConfig(format!(
                "default_dpi must be {}–{}, got {}",
                crate::params::MIN_DPI,
                crate::params::MAX_DPI,
                c.default_dpi
            )));
        }
        if c.default_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_file_size == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Raster format of the delivered page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    #[serde(alias = "tif")]
    Tiff,
    Ppm,
}

impl OutputFormat {
    /// File extension used for persisted pages.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Ppm => "ppm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Ppm => "image/x-portable-pixmap",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Ppm => "ppm",
        }
    }

    /// Only PNG keeps an alpha channel end to end.
    pub fn supports_transparency(&self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "ppm" => Ok(OutputFormat::Ppm),
            other => Err(ConvertError::validation(
                "format",
                format!("expected png, jpeg, tiff or ppm, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where rendered pages end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Binary-to-text encoded in the result only.
    #[serde(alias = "base64")]
    Inline,
    /// Written to the output directory.
    File,
    /// Both of the above, independently.
    Both,
}

impl StorageType {
    pub fn keeps_inline(&self) -> bool {
        matches!(self, StorageType::Inline | StorageType::Both)
    }

    pub fn keeps_file(&self) -> bool {
        matches!(self, StorageType::File | StorageType::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Inline => "inline",
            StorageType::File => "file",
            StorageType::Both => "both",
        }
    }
}

impl FromStr for StorageType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "base64" => Ok(StorageType::Inline),
            "file" => Ok(StorageType::File),
            "both" => Ok(StorageType::Both),
            other => Err(ConvertError::validation(
                "storage_type",
                format!("expected inline, file or both, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller wants back in `images`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Encoded payloads.
    #[serde(alias = "base64")]
    Inline,
    /// File paths of the persisted pages.
    Path,
}

impl DeliveryMode {
    /// The delivery mode implied by a storage type when none is given.
    pub fn default_for(storage: StorageType) -> Self {
        match storage {
            StorageType::File => DeliveryMode::Path,
            StorageType::Inline | StorageType::Both => DeliveryMode::Inline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Inline => "inline",
            DeliveryMode::Path => "path",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "base64" => Ok(DeliveryMode::Inline),
            "path" => Ok(DeliveryMode::Path),
            other => Err(ConvertError::validation(
                "delivery_mode",
                format!("expected inline or path, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
