//! Conversion parameters: raw caller input and its validated form.
//!
//! [`ConversionParams`] mirrors what an HTTP form or CLI hands us, with every
//! field optional. [`ConversionParams::normalize`] fills gaps from the
//! [`ServiceConfig`] and checks every bound, producing a fully populated
//! [`ConversionRequest`] or a `VALIDATION_ERROR` naming the offending field.
//! Normalisation runs before any source is fetched or engine invoked.

use crate::config::{DeliveryMode, OutputFormat, ServiceConfig, StorageType};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};

pub const MIN_DPI: u32 = 50;
pub const MAX_DPI: u32 = 600;
pub const MAX_TIMEOUT_SECS: u64 = 1800;
pub const MIN_TARGET_SIZE: u32 = 100;
pub const MAX_TARGET_SIZE: u32 = 4000;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Raw, possibly incomplete conversion parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionParams {
    pub dpi: Option<u32>,
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
    #[serde(alias = "fmt")]
    pub format: Option<OutputFormat>,
    pub grayscale: Option<bool>,
    pub transparent: Option<bool>,
    pub thread_count: Option<u32>,
    #[serde(alias = "use_pdftocairo")]
    pub use_alt_engine: Option<bool>,
    #[serde(alias = "timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(alias = "size")]
    pub target_size: Option<u32>,
    pub storage_type: Option<StorageType>,
    #[serde(alias = "image_mode")]
    pub delivery_mode: Option<DeliveryMode>,
    /// JPEG quality 1–100; ignored for other formats.
    pub jpeg_quality: Option<u32>,
}

/// A validated, fully defaulted conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRequest {
    pub dpi: u32,
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
    pub format: OutputFormat,
    pub grayscale: bool,
    /// Always false unless `format` is png.
    pub transparent: bool,
    pub thread_count: usize,
    pub use_alt_engine: bool,
    pub timeout_secs: u64,
    pub target_size: Option<u32>,
    pub storage_type: StorageType,
    pub delivery_mode: DeliveryMode,
    /// Set only when `format` is jpeg.
    pub jpeg_quality: Option<u8>,
}

impl ConversionParams {
    /// Validate and default these parameters against `config`.
    ///
    /// `thread_count` above `config.max_thread_count` is rejected rather
    /// than clamped.
    pub fn normalize(&self, config: &ServiceConfig) -> Result<ConversionRequest, ConvertError> {
        let dpi = self.dpi.unwrap_or(config.default_dpi);
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(ConvertError::validation(
                "dpi",
                format!("must be {MIN_DPI}–{MAX_DPI}, got {dpi}"),
            ));
        }

        if self.first_page == Some(0) {
            return Err(ConvertError::validation("first_page", "pages are numbered from 1"));
        }
        if self.last_page == Some(0) {
            return Err(ConvertError::validation("last_page", "pages are numbered from 1"));
        }
        if let (Some(first), Some(last)) = (self.first_page, self.last_page) {
            if last < first {
                return Err(ConvertError::validation(
                    "last_page",
                    format!("{last} is before first_page {first}"),
                ));
            }
        }

        let thread_count = match self.thread_count {
            None => config.default_thread_count,
            Some(0) => {
                return Err(ConvertError::validation("thread_count", "must be ≥ 1"));
            }
            Some(n) if n as usize > config.max_thread_count => {
                return Err(ConvertError::validation(
                    "thread_count",
                    format!("{n} exceeds the maximum of {}", config.max_thread_count),
                ));
            }
            Some(n) => n as usize,
        };

        let timeout_secs = self.timeout_secs.unwrap_or(config.default_timeout_secs);
        if timeout_secs == 0 || timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConvertError::validation(
                "timeout",
                format!("must be 1–{MAX_TIMEOUT_SECS} seconds, got {timeout_secs}"),
            ));
        }

        if let Some(size) = self.target_size {
            if !(MIN_TARGET_SIZE..=MAX_TARGET_SIZE).contains(&size) {
                return Err(ConvertError::validation(
                    "size",
                    format!("must be {MIN_TARGET_SIZE}–{MAX_TARGET_SIZE} px, got {size}"),
                ));
            }
        }

        let format = self.format.unwrap_or(config.default_format);

        // Format-specific options are only checked for the format they belong to.
        let jpeg_quality = match format {
            OutputFormat::Jpeg => {
                let q = self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY as u32);
                if !(1..=100).contains(&q) {
                    return Err(ConvertError::validation(
                        "jpeg_quality",
                        format!("must be 1–100, got {q}"),
                    ));
                }
                Some(q as u8)
            }
            _ => None,
        };

        let storage_type = self.storage_type.unwrap_or(config.default_storage_type);
        let delivery_mode = self
            .delivery_mode
            .unwrap_or_else(|| DeliveryMode::default_for(storage_type));
        match delivery_mode {
            DeliveryMode::Path if !storage_type.keeps_file() => {
                return Err(ConvertError::validation(
                    "delivery_mode",
                    format!("'path' needs storage_type file or both, got {storage_type}"),
                ));
            }
            DeliveryMode::Inline if !storage_type.keeps_inline() => {
                return Err(ConvertError::validation(
                    "delivery_mode",
                    format!("'inline' needs storage_type inline or both, got {storage_type}"),
                ));
            }
            _ => {}
        }

        Ok(ConversionRequest {
            dpi,
            first_page: self.first_page,
            last_page: self.last_page,
            format,
            grayscale: self.grayscale.unwrap_or(false),
            transparent: self.transparent.unwrap_or(false) && format.supports_transparency(),
            thread_count,
            use_alt_engine: self.use_alt_engine.unwrap_or(false),
            timeout_secs,
            target_size: self.target_size,
            storage_type,
            delivery_mode,
            jpeg_quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn config() -> ServiceConfig {
        ServiceConfig::builder().max_thread_count(8).build().unwrap()
    }

    fn field_of(err: ConvertError) -> &'static str {
        match err {
            ConvertError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_params_take_config_defaults() {
        let req = ConversionParams::default().normalize(&config()).unwrap();
        assert_eq!(req.dpi, 200);
        assert_eq!(req.format, OutputFormat::Png);
        assert_eq!(req.thread_count, 1);
        assert_eq!(req.timeout_secs, 600);
        assert_eq!(req.storage_type, StorageType::File);
        assert_eq!(req.delivery_mode, DeliveryMode::Path);
        assert_eq!(req.first_page, None);
        assert_eq!(req.jpeg_quality, None);
    }

    #[test]
    fn thread_count_above_cap_is_rejected() {
        let params = ConversionParams {
            thread_count: Some(16),
            ..Default::default()
        };
        let err = params.normalize(&config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(field_of(err), "thread_count");
    }

    #[test]
    fn thread_count_at_cap_is_accepted() {
        let params = ConversionParams {
            thread_count: Some(8),
            ..Default::default()
        };
        assert_eq!(params.normalize(&config()).unwrap().thread_count, 8);
    }

    #[test]
    fn reversed_page_range_is_rejected() {
        let params = ConversionParams {
            first_page: Some(5),
            last_page: Some(2),
            ..Default::default()
        };
        assert_eq!(field_of(params.normalize(&config()).unwrap_err()), "last_page");
    }

    #[test]
    fn open_ended_ranges_pass_through() {
        let params = ConversionParams {
            last_page: Some(3),
            ..Default::default()
        };
        let req = params.normalize(&config()).unwrap();
        assert_eq!((req.first_page, req.last_page), (None, Some(3)));
    }

    #[test]
    fn page_zero_is_rejected() {
        let params = ConversionParams {
            first_page: Some(0),
            ..Default::default()
        };
        assert_eq!(field_of(params.normalize(&config()).unwrap_err()), "first_page");
    }

    #[test]
    fn dpi_bounds() {
        for (dpi, ok) in [(49, false), (50, true), (600, true), (601, false)] {
            let params = ConversionParams {
                dpi: Some(dpi),
                ..Default::default()
            };
            assert_eq!(params.normalize(&config()).is_ok(), ok, "dpi={dpi}");
        }
    }

    #[test]
    fn jpeg_quality_ignored_for_png_but_checked_for_jpeg() {
        let png = ConversionParams {
            format: Some(OutputFormat::Png),
            jpeg_quality: Some(500),
            ..Default::default()
        };
        assert_eq!(png.normalize(&config()).unwrap().jpeg_quality, None);

        let jpeg = ConversionParams {
            format: Some(OutputFormat::Jpeg),
            jpeg_quality: Some(500),
            ..Default::default()
        };
        assert_eq!(field_of(jpeg.normalize(&config()).unwrap_err()), "jpeg_quality");

        let jpeg_default = ConversionParams {
            format: Some(OutputFormat::Jpeg),
            ..Default::default()
        };
        assert_eq!(
            jpeg_default.normalize(&config()).unwrap().jpeg_quality,
            Some(DEFAULT_JPEG_QUALITY)
        );
    }

    #[test]
    fn transparency_only_survives_for_png() {
        let jpeg = ConversionParams {
            format: Some(OutputFormat::Jpeg),
            transparent: Some(true),
            ..Default::default()
        };
        assert!(!jpeg.normalize(&config()).unwrap().transparent);

        let png = ConversionParams {
            format: Some(OutputFormat::Png),
            transparent: Some(true),
            ..Default::default()
        };
        assert!(png.normalize(&config()).unwrap().transparent);
    }

    #[test]
    fn inconsistent_delivery_is_rejected() {
        let path_inline = ConversionParams {
            storage_type: Some(StorageType::Inline),
            delivery_mode: Some(DeliveryMode::Path),
            ..Default::default()
        };
        assert_eq!(field_of(path_inline.normalize(&config()).unwrap_err()), "delivery_mode");

        let inline_file = ConversionParams {
            storage_type: Some(StorageType::File),
            delivery_mode: Some(DeliveryMode::Inline),
            ..Default::default()
        };
        assert_eq!(field_of(inline_file.normalize(&config()).unwrap_err()), "delivery_mode");

        for delivery in [DeliveryMode::Inline, DeliveryMode::Path] {
            let both = ConversionParams {
                storage_type: Some(StorageType::Both),
                delivery_mode: Some(delivery),
                ..Default::default()
            };
            assert!(both.normalize(&config()).is_ok());
        }
    }

    #[test]
    fn timeout_and_size_bounds() {
        let zero = ConversionParams {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(field_of(zero.normalize(&config()).unwrap_err()), "timeout");

        let one = ConversionParams {
            timeout_secs: Some(1),
            ..Default::default()
        };
        assert_eq!(one.normalize(&config()).unwrap().timeout_secs, 1);

        let tiny = ConversionParams {
            target_size: Some(20),
            ..Default::default()
        };
        assert_eq!(field_of(tiny.normalize(&config()).unwrap_err()), "size");
    }

    #[test]
    fn deserialises_legacy_field_names() {
        let params: ConversionParams = serde_json::from_str(
            r#"{"fmt":"jpeg","use_pdftocairo":true,"storage_type":"base64","image_mode":"base64","size":800}"#,
        )
        .unwrap();
        let req = params.normalize(&config()).unwrap();
        assert_eq!(req.format, OutputFormat::Jpeg);
        assert!(req.use_alt_engine);
        assert_eq!(req.storage_type, StorageType::Inline);
        assert_eq!(req.delivery_mode, DeliveryMode::Inline);
        assert_eq!(req.target_size, Some(800));
    }
}
