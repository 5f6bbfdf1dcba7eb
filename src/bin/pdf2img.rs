//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate: maps flags onto `ConversionParams`,
//! runs one conversion or info call and prints the JSON result on stdout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2img::{
    ConversionParams, Converter, DeliveryMode, ErrorResult, OutputFormat, ServiceConfig,
    StorageType,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as base64 PNG, printed as JSON
  pdf2img convert document.pdf --storage inline

  # Pages 2-5 as JPEG files under ./out, four workers
  pdf2img --output-dir ./out convert report.pdf -f 2 -l 5 --format jpeg --threads 4

  # Remote document through poppler
  pdf2img convert https://example.com/paper.pdf --alt-engine

  # Metadata only
  pdf2img info document.pdf

ENVIRONMENT VARIABLES:
  OUTPUT_STORAGE_TYPE   Default storage: inline, file, both (default: file)
  OUTPUT_DIR            Directory for stored pages (default: /tmp/pdf2image_output)
  OUTPUT_BASE_URL       Public URL prefix for stored pages
  MAX_FILE_SIZE         Upload/download cap in bytes (default: 52428800)
  DEFAULT_DPI           Default resolution (default: 200)
  DEFAULT_FORMAT        Default format: png, jpeg, tiff, ppm (default: png)
  MAX_THREAD_COUNT      Upper bound for --threads (default: 8)
  DEFAULT_TIMEOUT       Default conversion timeout in seconds (default: 600)
  DOWNLOAD_TIMEOUT      URL fetch timeout in seconds (default: 60)
  ENGINE_PATH           Directory holding libpdfium and/or the poppler binaries
  MAX_RENDERED_PIXELS   Cap on the longest rendered edge (default: 10000)
  ALLOW_PRIVATE_HOSTS   Allow URL sources on private networks (default: false)
  RUST_LOG              Log filter, overrides -v
"#;

/// Rasterise PDF files and URLs into per-page images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Rasterise PDF files and URLs into per-page images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Override OUTPUT_DIR.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override OUTPUT_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Pretty-print the JSON result.
    #[arg(long, global = true)]
    pretty: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert pages to images and print a ConversionResult.
    Convert(ConvertArgs),
    /// Print page count and document metadata.
    Info {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Rendering DPI (50–600).
    #[arg(long)]
    dpi: Option<u32>,

    /// First page to convert (1-based).
    #[arg(short = 'f', long)]
    first_page: Option<u32>,

    /// Last page to convert (inclusive).
    #[arg(short = 'l', long)]
    last_page: Option<u32>,

    /// Output format: png, jpeg, tiff, ppm.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Render in grayscale.
    #[arg(long)]
    grayscale: bool,

    /// Transparent page background (png only).
    #[arg(long)]
    transparent: bool,

    /// Parallel render workers.
    #[arg(short = 't', long)]
    threads: Option<u32>,

    /// Render with poppler's pdftocairo instead of pdfium.
    #[arg(long)]
    alt_engine: bool,

    /// Wall-clock limit for the render in seconds (1–1800).
    #[arg(long)]
    timeout: Option<u64>,

    /// Scale the longest edge to this many pixels (100–4000).
    #[arg(long)]
    size: Option<u32>,

    /// Storage: inline, file, both.
    #[arg(long)]
    storage: Option<StorageType>,

    /// Delivery: inline (base64 in `images`) or path.
    #[arg(long)]
    delivery: Option<DeliveryMode>,

    /// JPEG quality (1–100).
    #[arg(long)]
    jpeg_quality: Option<u32>,
}

impl ConvertArgs {
    fn params(&self) -> ConversionParams {
        ConversionParams {
            dpi: self.dpi,
            first_page: self.first_page,
            last_page: self.last_page,
            format: self.format,
            grayscale: Some(self.grayscale),
            transparent: Some(self.transparent),
            thread_count: self.threads,
            use_alt_engine: Some(self.alt_engine),
            timeout_secs: self.timeout,
            target_size: self.size,
            storage_type: self.storage,
            delivery_mode: self.delivery,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Where the PDF comes from.
enum Source {
    Url(String),
    File { bytes: Vec<u8>, name: Option<String> },
}

impl Source {
    fn resolve(input: &str) -> Result<Self> {
        if input.starts_with("http://") || input.starts_with("https://") {
            return Ok(Source::Url(input.to_string()));
        }
        let path = Path::new(input);
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {input}"))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(Source::File { bytes, name })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout carries the JSON result, so logs go to stderr.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Configuration ────────────────────────────────────────────────────
    let mut config = ServiceConfig::from_env().context("Invalid environment configuration")?;
    if let Some(dir) = cli.output_dir.clone() {
        config.output_dir = dir;
    }
    if let Some(url) = cli.base_url.clone() {
        config.output_base_url = url;
    }
    let converter = Converter::new(config);

    let ok = match &cli.command {
        Command::Convert(args) => {
            let params = args.params();
            let result = match Source::resolve(&args.input)? {
                Source::Url(url) => converter.convert_url(&url, &params).await,
                Source::File { bytes, name } => {
                    converter.convert_upload(bytes, name.as_deref(), &params).await
                }
            };
            emit(result, cli.pretty)?
        }
        Command::Info { input } => {
            let result = match Source::resolve(input)? {
                Source::Url(url) => converter.info_url(&url).await,
                Source::File { bytes, name } => converter.info_upload(bytes, name.as_deref()).await,
            };
            emit(result, cli.pretty)?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the result or the error as JSON; returns whether the call succeeded.
fn emit<T: Serialize>(result: Result<T, ErrorResult>, pretty: bool) -> Result<bool> {
    let (json, ok) = match &result {
        Ok(value) => (to_json(value, pretty)?, true),
        Err(err) => (to_json(err, pretty)?, false),
    };
    println!("{json}");
    Ok(ok)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialise result")
}
