//! Result types produced by the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which cascade tier produced the returned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Selectable text embedded in the PDF.
    Text,
    /// Tesseract OCR over rasterised pages.
    Ocr,
    /// Free-text answers of an image-understanding model.
    Vision,
}

impl ExtractionMethod {
    /// Stable machine name: `"text"`, `"ocr"` or `"vision"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Text => "text",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Vision => "vision",
        }
    }

    /// Human-facing label for reports and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::Text => "selectable text",
            ExtractionMethod::Ocr => "OCR",
            ExtractionMethod::Vision => "vision-model analysis",
        }
    }

    /// Tag appended to page headers, e.g. `--- Page 3 (OCR) ---`.
    pub(crate) fn header_tag(&self) -> Option<&'static str> {
        match self {
            ExtractionMethod::Text => None,
            ExtractionMethod::Ocr => Some("OCR"),
            ExtractionMethod::Vision => Some("Vision"),
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single value returned by a successful `extract()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Page-headed text from exactly one tier.
    pub text: String,
    /// True page count of the document, regardless of `pages_read`.
    pub total_pages: usize,
    /// Number of leading pages the pipeline was allowed to process.
    pub pages_read: usize,
    /// Tier that produced `text`.
    pub method: ExtractionMethod,
}

/// Text for one page, produced and consumed inside a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutput {
    /// 1-indexed page number.
    pub index: usize,
    pub text: String,
}

impl PageOutput {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// A rasterised page kept in memory for OCR and the vision fallback.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 1-indexed page number, taken from the rasteriser's file suffix.
    pub index: usize,
    /// Encoded PNG as written by the rasteriser.
    pub image_bytes: Vec<u8>,
}

impl fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPage")
            .field("index", &self.index)
            .field("image_bytes", &format_args!("<{} bytes>", self.image_bytes.len()))
            .finish()
    }
}

/// Join pages in index order, each under a `--- Page N ---` header.
///
/// Pages whose trimmed text is empty are skipped entirely. The result is
/// trimmed, so an all-empty input yields `""`.
pub fn assemble_pages(pages: &[PageOutput], method: ExtractionMethod) -> String {
    let mut sorted: Vec<&PageOutput> = pages.iter().collect();
    sorted.sort_by_key(|p| p.index);

    let parts: Vec<String> = sorted
        .into_iter()
        .filter_map(|p| {
            let body = p.text.trim();
            if body.is_empty() {
                return None;
            }
            let header = match method.header_tag() {
                Some(tag) => format!("--- Page {} ({}) ---", p.index, tag),
                None => format!("--- Page {} ---", p.index),
            };
            Some(format!("{header}\n{body}"))
        })
        .collect();

    parts.join("\n\n").trim().to_string()
}
