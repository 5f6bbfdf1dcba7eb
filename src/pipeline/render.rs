//! Rasterisation: drive a [`RasterEngine`] over the requested page range.
//!
//! ## Fan-out
//!
//! The range is split into `thread_count` contiguous chunks. Each chunk is
//! an independent `spawn_blocking` task that owns its slice of the work:
//! it asks the engine for its pages and encodes them into the output
//! format. Tasks share only the read-only PDF bytes. Results are joined in
//! chunk order and sorted by page number, so the merged sequence is always
//! in numeric page order whichever chunk finishes first.
//!
//! ## Timeout
//!
//! One wall-clock budget covers the whole call, page counting included. On
//! expiry the join is abandoned and the call fails with `Timeout`; blocking
//! tasks still running finish in the background and their output is
//! dropped.

use crate::config::OutputFormat;
use crate::engine::{RasterEngine, RasterJob};
use crate::error::ConvertError;
use crate::output::PageImage;
use crate::params::ConversionRequest;
use crate::pipeline::encode;
use futures::future::try_join_all;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Rasterise the pages selected by `request`, bounded by its timeout.
pub async fn render_pages(
    engine: Arc<dyn RasterEngine>,
    pdf: Arc<[u8]>,
    request: &ConversionRequest,
    max_pixels: u32,
) -> Result<Vec<PageImage>, ConvertError> {
    let secs = request.timeout_secs;
    tokio::time::timeout(
        Duration::from_secs(secs),
        render_unbounded(engine, pdf, request, max_pixels),
    )
    .await
    .map_err(|_| ConvertError::Timeout { secs })?
}

async fn render_unbounded(
    engine: Arc<dyn RasterEngine>,
    pdf: Arc<[u8]>,
    request: &ConversionRequest,
    max_pixels: u32,
) -> Result<Vec<PageImage>, ConvertError> {
    let total_pages = {
        let engine = Arc::clone(&engine);
        let pdf = Arc::clone(&pdf);
        tokio::task::spawn_blocking(move || engine.page_count(&pdf))
            .await
            .map_err(|e| ConvertError::Internal(format!("Page count task panicked: {e}")))??
    };
    info!("PDF has {} pages ({})", total_pages, engine.name());

    let range = resolve_range(request.first_page, request.last_page, total_pages)?;
    let chunks = partition(range, request.thread_count);
    debug!("Rendering {} chunk(s): {:?}", chunks.len(), chunks);

    let tasks = chunks.into_iter().map(|chunk| {
        let engine = Arc::clone(&engine);
        let pdf = Arc::clone(&pdf);
        let job = RasterJob {
            first_page: *chunk.start(),
            last_page: *chunk.end(),
            dpi: request.dpi,
            grayscale: request.grayscale,
            transparent: request.transparent,
            target_size: request.target_size,
            max_pixels,
        };
        let format = request.format;
        let quality = request.jpeg_quality;
        async move {
            tokio::task::spawn_blocking(move || render_chunk(engine.as_ref(), &pdf, &job, format, quality))
                .await
                .map_err(|e| ConvertError::Internal(format!("Render task panicked: {e}")))?
        }
    });

    let mut pages: Vec<PageImage> = try_join_all(tasks).await?.into_iter().flatten().collect();
    pages.sort_by_key(|p| p.page);
    Ok(pages)
}

/// Blocking body of one worker: rasterise and encode one contiguous chunk.
fn render_chunk(
    engine: &dyn RasterEngine,
    pdf: &[u8],
    job: &RasterJob,
    format: OutputFormat,
    jpeg_quality: Option<u8>,
) -> Result<Vec<PageImage>, ConvertError> {
    let images = engine.rasterize(pdf, job)?;
    if images.len() != job.page_count() {
        return Err(ConvertError::ConversionFailed(format!(
            "{} returned {} images for pages {}–{}",
            engine.name(),
            images.len(),
            job.first_page,
            job.last_page
        )));
    }

    images
        .into_iter()
        .zip(job.first_page..=job.last_page)
        .map(|(image, page)| -> Result<PageImage, ConvertError> {
            let data = encode::encode_page(&image, format, jpeg_quality).map_err(|e| {
                ConvertError::ConversionFailed(format!("page {page}: image encoding failed: {e}"))
            })?;
            Ok(PageImage {
                page,
                format,
                width: image.width(),
                height: image.height(),
                data,
            })
        })
        .collect()
}

/// Resolve an optional 1-indexed range against the document's page count.
///
/// An open side defaults to the document edge; a `last` past the end is
/// clamped, a `first` past the end is an error.
pub fn resolve_range(
    first: Option<u32>,
    last: Option<u32>,
    total_pages: usize,
) -> Result<RangeInclusive<usize>, ConvertError> {
    if total_pages == 0 {
        return Err(ConvertError::PdfCorrupted("document has no pages".into()));
    }
    let first = first.map_or(1, |p| p as usize);
    let last = last.map_or(total_pages, |p| (p as usize).min(total_pages));
    if first > total_pages {
        return Err(ConvertError::validation(
            "first_page",
            format!("{first} is past the end of a {total_pages}-page document"),
        ));
    }
    if last < first {
        return Err(ConvertError::validation(
            "last_page",
            format!("{last} is before first_page {first}"),
        ));
    }
    Ok(first..=last)
}

/// Split `range` into at most `parts` contiguous, non-empty chunks whose
/// sizes differ by at most one.
pub fn partition(range: RangeInclusive<usize>, parts: usize) -> Vec<RangeInclusive<usize>> {
    let (start, end) = (*range.start(), *range.end());
    if end < start {
        return Vec::new();
    }
    let len = end - start + 1;
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let extra = len % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut next = start;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(next..=next + size - 1);
        next += size;
    }
    chunks
}
