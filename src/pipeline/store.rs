//! Storage: turn encoded pages into inline payloads, files on disk, or both.
//!
//! Files are named `{doc_id}_page_{n}_{YYYYmmdd_HHMMSS}_{random}.{ext}` and
//! opened with create-new semantics, so a name collision between concurrent
//! requests picks a fresh suffix instead of overwriting.

use crate::config::{DeliveryMode, ServiceConfig, StorageType};
use crate::error::ConvertError;
use crate::output::{PageImage, StoredArtifact};
use crate::params::ConversionRequest;
use crate::pipeline::encode;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Attempts per page before a persistent name collision is reported.
const NAME_ATTEMPTS: usize = 3;
const SUFFIX_LEN: usize = 12;

/// Output of the storage stage.
#[derive(Debug, Default)]
pub struct StoredPages {
    /// One artifact per page, in page order.
    pub artifacts: Vec<StoredArtifact>,
    pub warnings: Vec<String>,
    /// Whether page files were written.
    pub files_written: bool,
}

impl StoredPages {
    /// The strings delivered in `images`: base64 payloads or file paths.
    pub fn delivered(&self, mode: DeliveryMode) -> Vec<String> {
        self.artifacts
            .iter()
            .filter_map(|a| match mode {
                DeliveryMode::Inline => a.inline.clone(),
                DeliveryMode::Path => a.path.as_ref().map(|p| p.display().to_string()),
            })
            .collect()
    }

    /// Public URLs of written files, or `None` when nothing was written.
    pub fn file_urls(&self) -> Option<Vec<String>> {
        self.files_written
            .then(|| self.artifacts.iter().filter_map(|a| a.url.clone()).collect())
    }
}

/// Store `pages` according to the request's storage type.
///
/// With `storage_type = both` a failed file write is downgraded to a warning
/// as long as the inline payloads can still be delivered. Files written
/// before the failure are left in place.
pub async fn store_pages(
    pages: &[PageImage],
    request: &ConversionRequest,
    doc_id: &str,
    config: &ServiceConfig,
) -> Result<StoredPages, ConvertError> {
    let mut stored = StoredPages {
        artifacts: pages.iter().map(base_artifact).collect(),
        ..Default::default()
    };

    if request.storage_type.keeps_inline() {
        for (artifact, page) in stored.artifacts.iter_mut().zip(pages) {
            artifact.inline = Some(encode::to_inline(&page.data));
        }
    }

    if !request.storage_type.keeps_file() {
        return Ok(stored);
    }

    match write_files(pages, doc_id, &config.output_dir).await {
        Ok(paths) => {
            for (artifact, path) in stored.artifacts.iter_mut().zip(paths) {
                artifact.url = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| config.file_url(name));
                artifact.path = Some(path);
            }
            stored.files_written = true;
            info!("Stored {} page file(s) in {}", pages.len(), config.output_dir.display());
        }
        Err(e) if request.storage_type == StorageType::Both => {
            if request.delivery_mode == DeliveryMode::Path {
                return Err(ConvertError::ConversionFailed(format!(
                    "file storage failed and path delivery was requested: {e}"
                )));
            }
            warn!("File storage failed, returning inline images only: {}", e);
            stored.warnings.push(format!("file storage failed: {e}"));
        }
        Err(e) => return Err(e),
    }

    Ok(stored)
}

fn base_artifact(page: &PageImage) -> StoredArtifact {
    StoredArtifact {
        page: page.page,
        mime_type: page.format.mime_type().to_string(),
        size_bytes: page.data.len(),
        inline: None,
        path: None,
        url: None,
    }
}

async fn write_files(
    pages: &[PageImage],
    doc_id: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>, ConvertError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut paths = Vec::with_capacity(pages.len());
    for page in pages {
        paths.push(write_page(page, doc_id, dir).await?);
    }
    Ok(paths)
}

async fn write_page(page: &PageImage, doc_id: &str, dir: &Path) -> Result<PathBuf, ConvertError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let path = dir.join(file_name(doc_id, page));
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < NAME_ATTEMPTS => {
                debug!("{} exists, retrying with a new suffix", path.display());
                continue;
            }
            Err(source) => return Err(ConvertError::OutputWriteFailed { path, source }),
        };

        let written = match file.write_all(&page.data).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        return match written {
            Ok(()) => {
                debug!("Wrote page {} → {}", page.page, path.display());
                Ok(path)
            }
            Err(source) => Err(ConvertError::OutputWriteFailed { path, source }),
        };
    }
}

/// `{doc_id}_page_{n}_{timestamp}_{random}.{ext}`
fn file_name(doc_id: &str, page: &PageImage) -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let simple = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &simple[..SUFFIX_LEN];
    format!(
        "{doc_id}_page_{}_{stamp}_{suffix}.{}",
        page.page,
        page.format.extension()
    )
}
