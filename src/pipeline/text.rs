//! Stage A: read the embedded text layer.
//!
//! This is the cheapest and most faithful tier: if *any* processed page
//! carries selectable text the cascade stops here, even for documents that
//! are partly scanned.
//!
//! pdfium is used in its default, tolerant mode. It rebuilds broken xref
//! tables and trailers instead of refusing the file, so mildly corrupt PDFs
//! still yield their readable pages. pdfium keeps thread-local state and is
//! not async-safe, hence `spawn_blocking`.

use crate::error::ExtractError;
use crate::output::PageOutput;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the text layer holds for the leading pages of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayerOutput {
    /// True page count of the whole document.
    pub total_pages: usize,
    /// Trimmed text of pages `1..=min(total_pages, limit)`, in page order.
    /// Pages without text may be omitted.
    pub pages: Vec<PageOutput>,
}

/// Port for Stage A: parse a PDF and pull its selectable text.
#[async_trait]
pub trait TextLayer: Send + Sync {
    /// Count the pages of `pdf` and read the text of at most `limit` leading pages.
    async fn read_text(&self, pdf: &[u8], limit: usize) -> Result<TextLayerOutput, ExtractError>;
}

/// [`TextLayer`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextLayer {
    /// File or directory of the pdfium shared library; system search if None.
    lib_path: Option<PathBuf>,
}

impl PdfiumTextLayer {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl TextLayer for PdfiumTextLayer {
    async fn read_text(&self, pdf: &[u8], limit: usize) -> Result<TextLayerOutput, ExtractError> {
        let bytes = pdf.to_vec();
        let lib_path = self.lib_path.clone();

        tokio::task::spawn_blocking(move || read_text_blocking(lib_path.as_deref(), &bytes, limit))
            .await
            .map_err(|e| ExtractError::Internal(format!("Text extraction task panicked: {}", e)))?
    }
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let bindings = match lib_path {
        Some(path) if path.is_file() => Pdfium::bind_to_library(path),
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn read_text_blocking(
    lib_path: Option<&Path>,
    bytes: &[u8],
    limit: usize,
) -> Result<TextLayerOutput, ExtractError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ExtractError::PasswordRequired
        } else {
            ExtractError::CorruptPdf { detail: err_str }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let pages_to_read = total_pages.min(limit);
    info!("PDF loaded: {} pages, reading {}", total_pages, pages_to_read);

    let mut out = Vec::with_capacity(pages_to_read);
    for idx in 0..pages_to_read {
        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("Page {}: could not be loaded: {:?}", idx + 1, e);
                continue;
            }
        };
        let text = match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!("Page {}: no readable text layer: {:?}", idx + 1, e);
                continue;
            }
        };
        let trimmed = text.trim();
        debug!("Page {}: {} chars of selectable text", idx + 1, trimmed.len());
        if !trimmed.is_empty() {
            out.push(PageOutput::new(idx + 1, trimmed));
        }
    }

    Ok(TextLayerOutput {
        total_pages,
        pages: out,
    })
}
