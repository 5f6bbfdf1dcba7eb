//! Metadata extraction without rasterisation.

use crate::engine::RasterEngine;
use crate::error::ConvertError;
use crate::output::DocumentInfo;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use std::sync::Arc;
use std::time::Duration;

/// Read page count and document-info fields through `engine`.
pub async fn extract_info(
    engine: Arc<dyn RasterEngine>,
    pdf: Arc<[u8]>,
    timeout_secs: u64,
) -> Result<DocumentInfo, ConvertError> {
    let task = tokio::task::spawn_blocking(move || engine.extract_info(&pdf));
    let mut info = tokio::time::timeout(Duration::from_secs(timeout_secs), task)
        .await
        .map_err(|_| ConvertError::Timeout { secs: timeout_secs })?
        .map_err(|e| ConvertError::Internal(format!("Metadata task panicked: {e}")))??;

    info.creation_date = info.creation_date.map(|d| normalize_pdf_date(&d));
    info.modification_date = info.modification_date.map(|d| normalize_pdf_date(&d));
    Ok(info)
}

/// Convert a PDF date string (`D:YYYYMMDDHHmmSS+HH'mm'`) to ISO-8601.
///
/// Trailing fields are optional in the PDF format. Strings that are not PDF
/// dates, or that do not parse, are returned unchanged.
pub fn normalize_pdf_date(raw: &str) -> String {
    parse_pdf_date(raw).unwrap_or_else(|| raw.to_string())
}

fn parse_pdf_date(raw: &str) -> Option<String> {
    let s = raw.trim().strip_prefix("D:")?;
    let digits_len = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len < 4 {
        return None;
    }
    let (digits, zone) = s.split_at(digits_len);
    let field = |from: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(from..from + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let date = NaiveDate::from_ymd_opt(
        digits.get(0..4)?.parse().ok()?,
        field(4, 2, 1)?,
        field(6, 2, 1)?,
    )?;
    let naive = date.and_hms_opt(field(8, 2, 0)?, field(10, 2, 0)?, field(12, 2, 0)?)?;

    let zone = zone.trim_end_matches('\'');
    let offset_secs = match zone.chars().next() {
        None => return Some(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Some('Z') => 0,
        Some(sign @ ('+' | '-')) => {
            let rest: Vec<&str> = zone[1..].split('\'').filter(|p| !p.is_empty()).collect();
            let hours: i32 = rest.first()?.parse().ok()?;
            let minutes: i32 = rest.get(1).map_or(Some(0), |m| m.parse().ok())?;
            if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
                return None;
            }
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' {
                -secs
            } else {
                secs
            }
        }
        Some(_) => return None,
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    let dt = offset.from_local_datetime(&naive).single()?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_date_with_offset() {
        assert_eq!(
            normalize_pdf_date("D:20240101100000+08'00'"),
            "2024-01-01T10:00:00+08:00"
        );
    }

    #[test]
    fn negative_offset_and_utc() {
        assert_eq!(
            normalize_pdf_date("D:20231231235959-05'30"),
            "2023-12-31T23:59:59-05:30"
        );
        assert_eq!(normalize_pdf_date("D:20240102153000Z"), "2024-01-02T15:30:00+00:00");
    }

    #[test]
    fn partial_date_without_zone() {
        assert_eq!(normalize_pdf_date("D:2024"), "2024-01-01T00:00:00");
        assert_eq!(normalize_pdf_date("D:202403151230"), "2024-03-15T12:30:00");
    }

    #[test]
    fn out_of_range_offset_keeps_raw_string() {
        for raw in [
            "D:20200101000000+9999999'00'",
            "D:20200101000000+24'00'",
            "D:20200101000000-05'60'",
            "D:20200101000000+05'99999999999'",
        ] {
            assert_eq!(normalize_pdf_date(raw), raw);
        }
    }

    struct StaticInfo;

    impl RasterEngine for StaticInfo {
        fn name(&self) -> &'static str {
            "static"
        }

        fn page_count(&self, _pdf: &[u8]) -> Result<usize, crate::error::EngineError> {
            Ok(2)
        }

        fn rasterize(
            &self,
            _pdf: &[u8],
            _job: &crate::engine::RasterJob,
        ) -> Result<Vec<image::DynamicImage>, crate::error::EngineError> {
            panic!("info must not rasterise");
        }

        fn extract_info(&self, _pdf: &[u8]) -> Result<DocumentInfo, crate::error::EngineError> {
            Ok(DocumentInfo {
                pages: 2,
                creation_date: Some("D:20240101100000+08'00'".into()),
                modification_date: Some("yesterday".into()),
                ..Default::default()
            })
        }
    }

    #[test]
    fn extract_info_normalises_dates() {
        let info = tokio_test::block_on(extract_info(
            Arc::new(StaticInfo),
            Arc::from(&b"%PDF-1.4"[..]),
            5,
        ))
        .unwrap();
        assert_eq!(info.pages, 2);
        assert_eq!(info.creation_date.as_deref(), Some("2024-01-01T10:00:00+08:00"));
        assert_eq!(info.modification_date.as_deref(), Some("yesterday"));
    }

    #[test]
    fn non_pdf_dates_pass_through() {
        assert_eq!(normalize_pdf_date("2024-01-01T10:00:00+08"), "2024-01-01T10:00:00+08");
        assert_eq!(normalize_pdf_date("D:garbage"), "D:garbage");
        assert_eq!(normalize_pdf_date("D:20241399"), "D:20241399");
    }
}
