//! poppler-utils engine: `pdftocairo` for pages, `pdfinfo` for metadata.
//!
//! The PDF bytes are written to a temporary directory that also receives
//! the rendered PNGs; everything is removed when the `TempDir` drops.

use super::{RasterEngine, RasterJob};
use crate::error::EngineError;
use crate::output::DocumentInfo;
use image::DynamicImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use tracing::debug;

/// poppler exit status for "error opening a PDF file".
const EXIT_OPEN_FAILED: i32 = 1;

/// Rasterises by shelling out to poppler's `pdftocairo`.
#[derive(Debug, Clone, Default)]
pub struct PopplerEngine {
    bin_dir: Option<PathBuf>,
}

impl PopplerEngine {
    /// Look for the poppler binaries in `bin_dir` when given, else on `PATH`.
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    fn tool(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn run(&self, tool: &str, args: &[OsString]) -> Result<Output, EngineError> {
        let output = Command::new(self.tool(tool))
            .args(args)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::NotInstalled {
                        engine: self.name().to_string(),
                        detail: format!("{tool} not found: {e}"),
                    }
                } else {
                    EngineError::Failed(format!("{tool} could not be started: {e}"))
                }
            })?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(EXIT_OPEN_FAILED) => Err(EngineError::Corrupted(stderr)),
            code => Err(EngineError::Failed(format!(
                "{tool} exited with {code:?}: {stderr}"
            ))),
        }
    }

    fn pdfinfo(&self, pdf: &[u8]) -> Result<DocumentInfo, EngineError> {
        let dir = scratch_dir()?;
        let input = write_input(&dir, pdf)?;
        let output = self.run("pdfinfo", &["-isodates".into(), input.into_os_string()])?;
        parse_pdfinfo(&String::from_utf8_lossy(&output.stdout))
    }
}

fn scratch_dir() -> Result<TempDir, EngineError> {
    TempDir::new().map_err(|e| EngineError::Failed(format!("tempdir: {e}")))
}

fn write_input(dir: &TempDir, pdf: &[u8]) -> Result<PathBuf, EngineError> {
    let path = dir.path().join("input.pdf");
    std::fs::write(&path, pdf).map_err(|e| EngineError::Failed(format!("temp write: {e}")))?;
    Ok(path)
}

/// Parse `pdfinfo` key/value output.
fn parse_pdfinfo(text: &str) -> Result<DocumentInfo, EngineError> {
    let mut info = DocumentInfo::default();
    let mut pages = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let field = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        match key.trim() {
            "Pages" => pages = value.parse::<usize>().ok(),
            "Title" => info.title = field,
            "Subject" => info.subject = field,
            "Author" => info.author = field,
            "Creator" => info.creator = field,
            "Producer" => info.producer = field,
            "CreationDate" => info.creation_date = field,
            "ModDate" => info.modification_date = field,
            _ => {}
        }
    }

    info.pages = pages.ok_or_else(|| EngineError::Corrupted("pdfinfo reported no page count".into()))?;
    Ok(info)
}

/// Page number encoded in a `pdftocairo` output name such as `page-007.png`.
fn output_page_number(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let (_, digits) = stem.rsplit_once('-')?;
    digits.parse().ok()
}

impl RasterEngine for PopplerEngine {
    fn name(&self) -> &'static str {
        "pdftocairo"
    }

    fn page_count(&self, pdf: &[u8]) -> Result<usize, EngineError> {
        Ok(self.pdfinfo(pdf)?.pages)
    }

    fn rasterize(&self, pdf: &[u8], job: &RasterJob) -> Result<Vec<DynamicImage>, EngineError> {
        let dir = scratch_dir()?;
        let input = write_input(&dir, pdf)?;
        let prefix = dir.path().join("page");

        let mut args: Vec<OsString> = vec![
            "-png".into(),
            "-r".into(),
            job.dpi.to_string().into(),
            "-f".into(),
            job.first_page.to_string().into(),
            "-l".into(),
            job.last_page.to_string().into(),
        ];
        if job.grayscale {
            args.push("-gray".into());
        }
        if job.transparent {
            args.push("-transp".into());
        }
        if let Some(size) = job.target_size {
            args.push("-scale-to".into());
            args.push(size.to_string().into());
        }
        args.push(input.into_os_string());
        args.push(prefix.into_os_string());

        self.run("pdftocairo", &args)?;

        let mut rendered: Vec<(usize, PathBuf)> = std::fs::read_dir(dir.path())
            .map_err(|e| EngineError::Failed(format!("read output dir: {e}")))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .filter_map(|p| output_page_number(&p).map(|n| (n, p)))
            .collect();
        rendered.sort_by_key(|(n, _)| *n);

        let mut images = Vec::with_capacity(rendered.len());
        for (page_num, path) in rendered {
            let mut image = image::open(&path)
                .map_err(|e| EngineError::Failed(format!("page {page_num}: {e}")))?;
            if image.width().max(image.height()) > job.max_pixels {
                image = image.resize(
                    job.max_pixels,
                    job.max_pixels,
                    image::imageops::FilterType::Triangle,
                );
            }
            debug!(
                "pdftocairo rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }

    fn extract_info(&self, pdf: &[u8]) -> Result<DocumentInfo, EngineError> {
        self.pdfinfo(pdf)
    }
}
