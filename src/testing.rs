//! Testing utilities including mock implementations of every port.
//!
//! These let callers exercise the extraction cascade and the chat layer
//! without pdfium, poppler, tesseract or network access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::agent::{ChatMessage, LlmPort};
use crate::error::{AgentError, ExtractError, OcrError};
use crate::output::{PageOutput, RenderedPage};
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::PageRenderer;
use crate::pipeline::text::{TextLayer, TextLayerOutput};
use crate::pipeline::vision::VisionModel;

/// A PNG whose width encodes the page number.
///
/// Width survives the grayscale conversion done before OCR, which is how
/// [`MockOcr`] knows which page it is looking at.
pub fn page_png(index: usize) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(index.max(1) as u32, 1));
    let mut buf = Vec::new();
    // Encoding a tiny in-memory PNG cannot fail.
    let _ = img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png);
    buf
}

/// Inverse of [`page_png`]; 0 for undecodable input.
pub fn page_of_png(png: &[u8]) -> usize {
    image::load_from_memory(png)
        .map(|img| img.width() as usize)
        .unwrap_or(0)
}

fn record<T>(calls: &RwLock<Vec<T>>, call: T) {
    if let Ok(mut calls) = calls.write() {
        calls.push(call);
    }
}

fn snapshot<T: Clone>(calls: &RwLock<Vec<T>>) -> Vec<T> {
    calls.read().map(|c| c.clone()).unwrap_or_default()
}

// ── Text layer ───────────────────────────────────────────────────────────

/// Mock text layer with a fixed page count and per-page text.
#[derive(Default)]
pub struct MockTextLayer {
    total_pages: usize,
    texts: HashMap<usize, String>,
    failure: Option<String>,
    /// `limit` of every call
    calls: RwLock<Vec<usize>>,
}

impl MockTextLayer {
    /// A document of `total_pages` pages with no text layer.
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            ..Default::default()
        }
    }

    pub fn with_page_text(mut self, index: usize, text: impl Into<String>) -> Self {
        self.texts.insert(index, text.into());
        self
    }

    /// Fail every call with [`ExtractError::CorruptPdf`].
    pub fn corrupt(mut self, detail: impl Into<String>) -> Self {
        self.failure = Some(detail.into());
        self
    }

    pub fn calls(&self) -> Vec<usize> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl TextLayer for MockTextLayer {
    async fn read_text(&self, _pdf: &[u8], limit: usize) -> Result<TextLayerOutput, ExtractError> {
        record(&self.calls, limit);
        if let Some(ref detail) = self.failure {
            return Err(ExtractError::CorruptPdf {
                detail: detail.clone(),
            });
        }

        let pages = (1..=self.total_pages.min(limit))
            .filter_map(|i| self.texts.get(&i).map(|t| PageOutput::new(i, t.trim())))
            .filter(|p| !p.text.is_empty())
            .collect();
        Ok(TextLayerOutput {
            total_pages: self.total_pages,
            pages,
        })
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────

/// Record of a call made to the mock renderer.
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub pdf_path: PathBuf,
    /// Whether the PDF had been written to disk when the renderer ran.
    pub pdf_existed: bool,
    pub last_page: usize,
    pub out_dir: PathBuf,
}

/// Mock renderer producing one [`page_png`] per requested page.
#[derive(Default)]
pub struct MockRenderer {
    fail_with: Option<String>,
    produce_nothing: bool,
    calls: RwLock<Vec<RenderCall>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with [`ExtractError::RenderFailed`] carrying `stderr`.
    pub fn failing(mut self, stderr: impl Into<String>) -> Self {
        self.fail_with = Some(stderr.into());
        self
    }

    /// Succeed without producing any page.
    pub fn empty(mut self) -> Self {
        self.produce_nothing = true;
        self
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn render(
        &self,
        pdf_path: &Path,
        last_page: usize,
        out_dir: &Path,
    ) -> Result<Vec<RenderedPage>, ExtractError> {
        record(
            &self.calls,
            RenderCall {
                pdf_path: pdf_path.to_path_buf(),
                pdf_existed: pdf_path.exists(),
                last_page,
                out_dir: out_dir.to_path_buf(),
            },
        );
        if let Some(ref stderr) = self.fail_with {
            return Err(ExtractError::RenderFailed {
                command: format!("mock-render -f 1 -l {last_page}"),
                status: "exit status: 1".into(),
                stderr: stderr.clone(),
                stdout: String::new(),
            });
        }
        if self.produce_nothing {
            return Ok(Vec::new());
        }
        Ok((1..=last_page)
            .map(|index| RenderedPage {
                index,
                image_bytes: page_png(index),
            })
            .collect())
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Record of a call made to the mock OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrCall {
    pub page: usize,
    pub language: String,
}

/// Mock OCR engine returning configured text per page.
#[derive(Default)]
pub struct MockOcr {
    texts: HashMap<usize, String>,
    failing_languages: Vec<String>,
    calls: RwLock<Vec<OcrCall>>,
}

impl MockOcr {
    /// An engine that recognises nothing on any page.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_text(mut self, index: usize, text: impl Into<String>) -> Self {
        self.texts.insert(index, text.into());
        self
    }

    /// Fail every call made with `language` (e.g. a missing language pack).
    pub fn failing_language(mut self, language: impl Into<String>) -> Self {
        self.failing_languages.push(language.into());
        self
    }

    pub fn calls(&self) -> Vec<OcrCall> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn recognize(
        &self,
        image_png: &[u8],
        language: &str,
        _psm: u8,
    ) -> Result<String, OcrError> {
        let page = page_of_png(image_png);
        record(
            &self.calls,
            OcrCall {
                page,
                language: language.to_string(),
            },
        );
        if self.failing_languages.iter().any(|l| l == language) {
            return Err(OcrError::Exit {
                status: "exit status: 1".into(),
                stderr: format!("Failed loading language '{language}'"),
            });
        }
        Ok(self.texts.get(&page).cloned().unwrap_or_default())
    }
}

// ── Vision ───────────────────────────────────────────────────────────────

/// Mock vision model; answers `"page N described"` unless told otherwise.
#[derive(Default)]
pub struct MockVision {
    texts: HashMap<usize, String>,
    fail_on: Option<usize>,
    /// `(page index, image bytes)` of every call
    calls: RwLock<Vec<(usize, Vec<u8>)>>,
}

impl MockVision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_text(mut self, index: usize, text: impl Into<String>) -> Self {
        self.texts.insert(index, text.into());
        self
    }

    /// Fail with [`ExtractError::VisionCallFailed`] on page `index`.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }

    pub fn pages_seen(&self) -> Vec<usize> {
        snapshot(&self.calls).into_iter().map(|(i, _)| i).collect()
    }

    pub fn images_seen(&self) -> Vec<Vec<u8>> {
        snapshot(&self.calls).into_iter().map(|(_, b)| b).collect()
    }
}

#[async_trait]
impl VisionModel for MockVision {
    async fn describe(&self, page: &RenderedPage, _instruction: &str) -> Result<String, ExtractError> {
        record(&self.calls, (page.index, page.image_bytes.clone()));
        if self.fail_on == Some(page.index) {
            return Err(ExtractError::VisionCallFailed {
                page: page.index,
                message: "mock failure".into(),
            });
        }
        Ok(self
            .texts
            .get(&page.index)
            .cloned()
            .unwrap_or_else(|| format!("page {} described", page.index)))
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────

/// Mock chat model with a fixed reply.
#[derive(Default)]
pub struct MockLlm {
    reply: String,
    failure: Option<String>,
    calls: RwLock<Vec<(String, Vec<ChatMessage>)>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    /// Fail every call with [`AgentError::LlmApiError`].
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// `(model, messages)` of every call.
    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl LlmPort for MockLlm {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AgentError> {
        record(&self.calls, (model.to_string(), messages.to_vec()));
        match self.failure {
            Some(ref message) => Err(AgentError::LlmApiError {
                message: message.clone(),
            }),
            None => Ok(self.reply.clone()),
        }
    }
}
