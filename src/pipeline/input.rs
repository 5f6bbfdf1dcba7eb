//! Source acquisition: turn an upload or a URL into a validated
//! [`SourceDocument`].
//!
//! Both paths enforce the configured size cap and the `%PDF-` signature, so
//! an engine is never asked to open something that is obviously not a PDF.
//!
//! URL fetches are guarded before any bytes move: the scheme must be
//! http/https and every address the host resolves to must sit outside
//! loopback, private, link-local and other internal ranges. The resolved
//! address is pinned for the request so a second DNS answer cannot swap in
//! an internal target. Redirects are followed by hand, at most five, and
//! every hop goes through the same checks as the first request. The body is streamed and the download is abandoned
//! as soon as it crosses the cap.

use crate::config::ServiceConfig;
use crate::error::ConvertError;
use futures::StreamExt;
use reqwest::{redirect, Url};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";
const MAX_REDIRECTS: usize = 5;
const MAX_DOC_ID_LEN: usize = 64;
const DEFAULT_DOC_ID: &str = "document";

/// Where a source document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Upload,
    Url(String),
}

/// Validated PDF bytes ready for rendering.
///
/// The bytes sit behind an `Arc` so parallel render workers can share them
/// without copying.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    data: Arc<[u8]>,
    origin: SourceOrigin,
    doc_id: String,
}

impl SourceDocument {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Filesystem-safe identifier used as the output filename prefix.
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

/// Accept an uploaded buffer.
///
/// `filename` is only used to derive the document id.
pub fn from_upload(
    bytes: Vec<u8>,
    filename: Option<&str>,
    config: &ServiceConfig,
) -> Result<SourceDocument, ConvertError> {
    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(ConvertError::FileTooLarge {
            size,
            limit: config.max_file_size,
        });
    }
    check_signature(&bytes)?;

    debug!("Accepted upload: {} bytes", size);
    Ok(SourceDocument {
        data: bytes.into(),
        origin: SourceOrigin::Upload,
        doc_id: doc_id_from_name(filename),
    })
}

/// Download a PDF from `url` with the safety checks described above.
pub async fn from_url(url: &str, config: &ServiceConfig) -> Result<SourceDocument, ConvertError> {
    let parsed = Url::parse(url)
        .map_err(|e| ConvertError::validation("url", format!("{url:?} is not a valid URL: {e}")))?;
    let secs = config.download_timeout_secs;

    info!("Downloading PDF from: {}", url);
    let mut current = parsed.clone();
    let mut hops = 0;
    let response = loop {
        let client = vetted_client(url, &current, config).await?;
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| transfer_failed(url, secs, e))?;
        if !response.status().is_redirection() {
            break response;
        }
        if hops == MAX_REDIRECTS {
            return Err(ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: format!("more than {MAX_REDIRECTS} redirects"),
            });
        }
        hops += 1;
        let next = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| current.join(location).ok())
            .ok_or_else(|| ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {} without a usable Location header", response.status()),
            })?;
        debug!("Redirect {}/{}: {} -> {}", hops, MAX_REDIRECTS, current, next);
        current = next;
    };

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let limit = config.max_file_size;
    if let Some(declared) = response.content_length() {
        if declared > limit {
            return Err(ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: format!("declared size {declared} bytes exceeds the {limit} byte limit"),
            });
        }
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut body: Vec<u8> = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transfer_failed(url, secs, e))?;
        if body.len() as u64 + chunk.len() as u64 > limit {
            warn!("Aborting download of {}: body exceeds {} bytes", url, limit);
            return Err(ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: format!("body exceeds the {limit} byte limit"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    if !content_type.contains("application/pdf") {
        debug!(
            "Content-Type {:?} for {} is not application/pdf; sniffing bytes",
            content_type, url
        );
    }
    check_signature(&body).map_err(|_| ConvertError::InvalidFileFormat {
        reason: format!("'{url}' did not return a PDF (Content-Type {content_type:?})"),
    })?;

    info!("Downloaded {} bytes from {}", body.len(), url);
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(SourceDocument {
        data: body.into(),
        origin: SourceOrigin::Url(url.to_string()),
        doc_id: doc_id_from_name(name.as_deref()),
    })
}

/// Check one hop's target and build a client pinned to its vetted addresses.
///
/// Redirects are never followed by the client itself; the caller runs every
/// `Location` back through here.
async fn vetted_client(
    url: &str,
    target: &Url,
    config: &ServiceConfig,
) -> Result<reqwest::Client, ConvertError> {
    let (host, addrs) = vet_target(url, target, config).await?;
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .user_agent(concat!("edgequake-pdf2img/", env!("CARGO_PKG_VERSION")))
        .redirect(redirect::Policy::none());
    if host.parse::<IpAddr>().is_err() && !host.starts_with('[') {
        builder = builder.resolve_to_addrs(&host, &addrs);
    }
    builder.build().map_err(|e| download_failed(url, e))
}

/// Scheme and address checks for a single request target.
async fn vet_target(
    url: &str,
    target: &Url,
    config: &ServiceConfig,
) -> Result<(String, Vec<SocketAddr>), ConvertError> {
    if !matches!(target.scheme(), "http" | "https") {
        return Err(ConvertError::validation(
            "url",
            format!("scheme '{}' is not allowed; use http or https", target.scheme()),
        ));
    }
    let host = target
        .host_str()
        .ok_or_else(|| ConvertError::validation("url", "URL has no host"))?
        .to_string();
    let port = target.port_or_known_default().unwrap_or(80);

    let addrs = resolve_host(url, &host, port).await?;
    if !config.allow_private_hosts {
        if let Some(bad) = addrs.iter().find(|a| is_disallowed(a.ip())) {
            return Err(ConvertError::validation(
                "url",
                format!("host '{host}' resolves to disallowed address {}", bad.ip()),
            ));
        }
    }
    Ok((host, addrs))
}

async fn resolve_host(url: &str, host: &str, port: u16) -> Result<Vec<SocketAddr>, ConvertError> {
    let bare = host.trim_matches(|c| c == '[' || c == ']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("DNS lookup for '{host}' failed: {e}"),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("'{host}' resolved to no addresses"),
        });
    }
    Ok(addrs)
}

fn transfer_failed(url: &str, secs: u64, e: reqwest::Error) -> ConvertError {
    if e.is_timeout() {
        ConvertError::DownloadTimeout {
            url: url.to_string(),
            secs,
        }
    } else {
        download_failed(url, e)
    }
}

fn download_failed(url: &str, e: reqwest::Error) -> ConvertError {
    ConvertError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// Reject payloads that do not start with the PDF header.
pub fn check_signature(bytes: &[u8]) -> Result<(), ConvertError> {
    if bytes.is_empty() {
        return Err(ConvertError::InvalidFileFormat {
            reason: "file is empty".into(),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let head = &bytes[..bytes.len().min(8)];
        return Err(ConvertError::InvalidFileFormat {
            reason: format!("missing %PDF- header (first bytes: {head:?})"),
        });
    }
    Ok(())
}

/// Whether `ip` belongs to a range a URL source must never reach.
pub fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
                || o[0] == 0
                || (o[0] == 100 && (o[1] & 0xC0) == 64) // 100.64.0.0/10
                || (o[0] == 198 && (o[1] & 0xFE) == 18) // 198.18.0.0/15
                || o[0] >= 240
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_disallowed(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (first & 0xFE00) == 0xFC00 // fc00::/7
                || (first & 0xFFC0) == 0xFE80 // fe80::/10
                || (first == 0x2001 && v6.segments()[1] == 0x0DB8) // 2001:db8::/32
        }
    }
}

/// Derive a filesystem-safe document id from a file or URL name.
fn doc_id_from_name(name: Option<&str>) -> String {
    let stem = name
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
        .map(|n| match n.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => n,
        })
        .unwrap_or("");

    let id: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_DOC_ID_LEN)
        .collect();

    if id.is_empty() {
        DEFAULT_DOC_ID.to_string()
    } else {
        id
    }
}
