//! End-to-end tests against the real engines.
//!
//! These need libpdfium (and, for the poppler tests, `pdftocairo`) on the
//! machine, so they are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 LD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! Point `ENGINE_PATH` at a directory holding libpdfium if it is not on the
//! system library path.

mod common;

use common::{decoded_width, minimal_pdf};
use edgequake_pdf2img::pipeline::encode::from_inline;
use edgequake_pdf2img::{
    ConversionParams, Converter, ErrorCode, OutputFormat, ServiceConfig, StorageType,
};
use std::path::Path;

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn real_converter(output_dir: &Path) -> Converter {
    let mut builder = ServiceConfig::builder().output_dir(output_dir);
    if let Ok(path) = std::env::var("ENGINE_PATH") {
        builder = builder.engine_path(path);
    }
    Converter::new(builder.build().expect("valid config"))
}

fn inline(dpi: u32) -> ConversionParams {
    ConversionParams {
        dpi: Some(dpi),
        storage_type: Some(StorageType::Inline),
        ..Default::default()
    }
}

fn dimensions(b64: &str) -> (u32, u32) {
    let img = image::load_from_memory(&from_inline(b64).unwrap()).unwrap();
    (img.width(), img.height())
}

// ── pdfium ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdfium_renders_every_page_at_dpi() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    // MediaBox is 200 x 100 pt.
    let result = conv
        .convert_upload(minimal_pdf(3), Some("fixture.pdf"), &inline(144))
        .await
        .expect("pdfium conversion should succeed");

    assert_eq!(result.pages_count, 3);
    for b64 in &result.images {
        assert_eq!(dimensions(b64), (400, 200));
    }
    println!("pdfium: {} pages OK", result.pages_count);
}

#[tokio::test]
async fn test_pdfium_target_size_and_threads() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    let params = ConversionParams {
        target_size: Some(100),
        thread_count: Some(3),
        format: Some(OutputFormat::Jpeg),
        ..inline(300)
    };
    let result = conv
        .convert_upload(minimal_pdf(5), None, &params)
        .await
        .expect("conversion should succeed");

    assert_eq!(result.pages_count, 5);
    let pages: Vec<usize> = result.artifacts.iter().map(|a| a.page).collect();
    assert_eq!(pages, vec![1, 2, 3, 4, 5]);
    for b64 in &result.images {
        assert_eq!(dimensions(b64), (100, 50));
    }
}

#[tokio::test]
async fn test_pdfium_file_storage() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    let params = ConversionParams {
        dpi: Some(72),
        storage_type: Some(StorageType::File),
        ..Default::default()
    };
    let result = conv
        .convert_upload(minimal_pdf(2), Some("fixture.pdf"), &params)
        .await
        .expect("conversion should succeed");

    for path in &result.images {
        assert_eq!(decoded_width(&std::fs::read(path).unwrap()), 200);
    }
    assert_eq!(result.file_urls.map(|u| u.len()), Some(2));
}

#[tokio::test]
async fn test_pdfium_info() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    let info = conv
        .info_upload(minimal_pdf(4), None)
        .await
        .expect("info should succeed");

    assert_eq!(info.pages, 4);
    assert_eq!(info.title.as_deref(), Some("Fixture"));
    assert_eq!(info.author.as_deref(), Some("Tests"));
    assert_eq!(info.creation_date.as_deref(), Some("2024-01-01T10:00:00+08:00"));
    println!("Metadata: {info:?}");
}

#[tokio::test]
async fn test_pdfium_rejects_broken_document() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    let err = conv
        .convert_upload(b"%PDF-1.4\nthis is not a real document".to_vec(), None, &inline(72))
        .await
        .unwrap_err();
    assert_eq!(err.error_code, ErrorCode::PdfCorrupted);
}

// ── poppler ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poppler_alt_engine() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let conv = real_converter(dir.path());

    let params = ConversionParams {
        use_alt_engine: Some(true),
        thread_count: Some(2),
        ..inline(144)
    };
    match conv.convert_upload(minimal_pdf(3), None, &params).await {
        Ok(result) => {
            assert_eq!(result.pages_count, 3);
            for b64 in &result.images {
                assert_eq!(dimensions(b64), (400, 200));
            }
        }
        Err(err) if err.error_code == ErrorCode::EngineNotInstalled => {
            println!("SKIP: pdftocairo not installed: {}", err.message);
        }
        Err(err) => panic!("poppler conversion failed: {err}"),
    }
}
