//! Input loading: turn a user-supplied path or URL into PDF bytes.
//!
//! The pipeline itself works on bytes; this module is the convenience layer
//! used by the CLI and [`crate::PdfExtractor::extract_input`]. The `%PDF`
//! magic is checked up front so a stray HTML error page or image fails with
//! a clear message instead of a pdfium parse error.

use crate::error::ExtractError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes plus a display name for logs and reports.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// File name (local) or last URL segment (remote).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL, validating the PDF magic bytes.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, ExtractError> {
    let loaded = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_magic(&loaded)?;
    Ok(loaded)
}

async fn read_local(path_str: &str) -> Result<LoadedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractError::FileNotFound { path });
        }
        Err(e) => return Err(ExtractError::io(format!("reading {}", path.display()), e)),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    Ok(LoadedInput { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedInput, ExtractError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(LoadedInput {
        name: file_name_from_url(url),
        bytes: bytes.to_vec(),
    })
}

fn check_magic(input: &LoadedInput) -> Result<(), ExtractError> {
    if input.bytes.len() >= 4 && &input.bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&input.bytes[..4]);
        return Err(ExtractError::NotAPdf {
            source_name: input.name.clone(),
            magic,
        });
    }
    Ok(())
}

/// Extract a reasonable file name from the URL path.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
