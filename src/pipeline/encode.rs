//! Image encoding: `DynamicImage` → file bytes in the requested format,
//! and file bytes → base64 for inline delivery.
//!
//! Each format has its own constraints on pixel layout: JPEG and PPM carry
//! no alpha, and the TIFF encoder does not take grey-plus-alpha. Pixels are
//! converted to the closest layout the encoder accepts before writing.

use crate::config::OutputFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page into `format`.
///
/// `jpeg_quality` is honoured only for JPEG.
pub fn encode_page(
    img: &DynamicImage,
    format: OutputFormat,
    jpeg_quality: Option<u8>,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let opaque = if is_grey(img) {
                DynamicImage::ImageLuma8(img.to_luma8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            let quality = jpeg_quality.unwrap_or(crate::params::DEFAULT_JPEG_QUALITY);
            opaque.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
        OutputFormat::Tiff => {
            let layout = match img {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                    img.clone()
                }
                _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()),
            };
            layout.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff)?;
        }
        OutputFormat::Ppm => {
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Pnm)?;
        }
    }
    debug!("Encoded {}x{} page → {} bytes {}", img.width(), img.height(), buf.len(), format);
    Ok(buf)
}

fn is_grey(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    )
}

/// Binary-to-text encoding for inline delivery.
pub fn to_inline(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Inverse of [`to_inline`].
pub fn from_inline(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}
