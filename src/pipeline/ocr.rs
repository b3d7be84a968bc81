//! OCR over rasterised pages, with a single language-fallback retry.
//!
//! The combined language model (`por+eng` by default) covers mixed-language
//! documents best, but the pack may be missing on a given host. A failure
//! of that call is retried once with the single fallback language; if the
//! retry fails too, the page contributes nothing and the stage carries on.
//! No other retry exists anywhere in the cascade.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, OcrError};
use crate::output::{ExtractionMethod, PageOutput, RenderedPage};
use crate::pipeline::encode::to_grayscale_png;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Port for the recognition step of Stage B.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise the text of one grayscale PNG.
    ///
    /// `language` is a tesseract language spec (`"eng"`, `"por+eng"`);
    /// `psm` the page-segmentation mode.
    async fn recognize(&self, image_png: &[u8], language: &str, psm: u8)
        -> Result<String, OcrError>;
}

/// [`OcrEngine`] that pipes the image through `tesseract stdin stdout`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(
        &self,
        image_png: &[u8],
        language: &str,
        psm: u8,
    ) -> Result<String, OcrError> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", language, "--psm"])
            .arg(psm.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(OcrError::Spawn)?;

        // Feed stdin concurrently so a chatty engine cannot fill its stdout
        // pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("stdin was not captured".into()))?;
        let image = image_png.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&image).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await.map_err(OcrError::Spawn)?;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if output.status.success() => return Err(OcrError::Spawn(e)),
            Ok(Err(_)) => {}
            Err(e) => return Err(OcrError::Engine(format!("stdin writer panicked: {e}"))),
        }

        if !output.status.success() {
            return Err(OcrError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Recognise one page with the combined language, retrying once with the
/// fallback language on any failure.
pub async fn recognize_with_fallback(
    engine: &dyn OcrEngine,
    image_png: &[u8],
    config: &ExtractionConfig,
    page_num: usize,
) -> Result<String, OcrError> {
    match engine
        .recognize(image_png, &config.ocr_language, config.ocr_psm)
        .await
    {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(
                "Page {}: OCR with '{}' failed ({}); retrying with '{}'",
                page_num, config.ocr_language, e, config.ocr_fallback_language
            );
            engine
                .recognize(image_png, &config.ocr_fallback_language, config.ocr_psm)
                .await
        }
    }
}

/// Run OCR over every rendered page, in page order.
///
/// Returns one [`PageOutput`] per page, with empty text for pages that
/// yielded nothing or whose OCR failed twice. An image that cannot be
/// decoded at all is fatal.
pub async fn ocr_pages(
    engine: &dyn OcrEngine,
    pages: &[RenderedPage],
    config: &ExtractionConfig,
) -> Result<Vec<PageOutput>, ExtractError> {
    let mut out = Vec::with_capacity(pages.len());

    for page in pages {
        let gray = to_grayscale_png(&page.image_bytes).map_err(|e| ExtractError::ImageDecode {
            page: page.index,
            detail: e.to_string(),
        })?;

        let text = match recognize_with_fallback(engine, &gray, config, page.index).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Page {}: OCR failed with fallback language too: {}", page.index, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(ExtractionMethod::Ocr, page.index, &e.to_string());
                }
                String::new()
            }
        };

        debug!("Page {}: {} chars of OCR text", page.index, text.chars().count());
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(ExtractionMethod::Ocr, page.index, text.chars().count());
        }
        out.push(PageOutput::new(page.index, text));
    }

    Ok(out)
}
