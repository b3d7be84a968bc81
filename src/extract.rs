//! The extraction cascade: text layer → OCR → vision model.
//!
//! ```text
//! TEXT_OK ──▶ return (method = text)
//!    │ no selectable text on the pages read
//!    ▼
//! OCR_OK ──▶ return (method = ocr)
//!    │ OCR output below the confidence threshold
//!    ▼
//! VISION_OK ──▶ return (method = vision)
//!    │ any hard failure along the way
//!    ▼
//! FAILED ──▶ Err(ExtractError)
//! ```
//!
//! Stages run strictly in that order and none is re-entered. Escalation is
//! judged on output quality (empty text, too little OCR text), never on
//! errors: a render failure, a missing vision model or a failed vision call
//! propagates to the caller as-is.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{assemble_pages, ExtractionMethod, ExtractionResult, RenderedPage};
use crate::pipeline::input::load_input;
use crate::pipeline::ocr::{self, OcrEngine, TesseractCli};
use crate::pipeline::render::{PageRenderer, PdftoppmRenderer};
use crate::pipeline::text::{PdfiumTextLayer, TextLayer};
use crate::pipeline::vision::{self, resolve_vision_provider, LlmVisionModel, VisionModel};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Runs the extraction cascade over PDF bytes.
///
/// Cheap to clone; every clone shares the same ports. Calls are independent
/// and may run concurrently: each one owns its scratch directory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfread::{ExtractionConfig, PdfExtractor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = PdfExtractor::new(ExtractionConfig::from_env());
/// let bytes = std::fs::read("scan.pdf")?;
/// let result = extractor.extract(&bytes, Some(15)).await?;
/// println!("{} pages, read via {}", result.total_pages, result.method.label());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PdfExtractor {
    config: ExtractionConfig,
    text_layer: Arc<dyn TextLayer>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrEngine>,
    /// `Err` holds the hint reported if the vision tier is ever needed.
    vision: Result<Arc<dyn VisionModel>, String>,
}

impl PdfExtractor {
    /// Build an extractor with the default ports: pdfium, pdftoppm,
    /// tesseract and the configured vision provider.
    ///
    /// The vision provider is resolved here, once. A missing provider is
    /// not an error yet: most documents never reach the vision tier.
    pub fn new(config: ExtractionConfig) -> Self {
        let text_layer = Arc::new(PdfiumTextLayer::new(config.pdfium_lib_path.clone()));
        let renderer = Arc::new(PdftoppmRenderer::new(config.pdftoppm_path.clone(), config.dpi));
        let ocr = Arc::new(TesseractCli::new(config.tesseract_path.clone()));
        let vision = resolve_vision_provider(&config)
            .map(|provider| Arc::new(LlmVisionModel::new(provider, &config)) as Arc<dyn VisionModel>);
        if let Err(ref hint) = vision {
            debug!("Vision tier unavailable: {}", hint);
        }

        Self {
            config,
            text_layer,
            renderer,
            ocr,
            vision,
        }
    }

    /// [`new`](Self::new) with [`ExtractionConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(ExtractionConfig::from_env())
    }

    /// Build an extractor from explicit ports.
    pub fn with_ports(
        config: ExtractionConfig,
        text_layer: Arc<dyn TextLayer>,
        renderer: Arc<dyn PageRenderer>,
        ocr: Arc<dyn OcrEngine>,
        vision: Option<Arc<dyn VisionModel>>,
    ) -> Self {
        Self {
            config,
            text_layer,
            renderer,
            ocr,
            vision: vision.ok_or_else(|| "No vision model was supplied.".to_string()),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Whether the vision tier could run if OCR turns out insufficient.
    pub fn has_vision(&self) -> bool {
        self.vision.is_ok()
    }

    /// Extract text from PDF bytes.
    ///
    /// `max_pages` limits how many leading pages are processed (default
    /// `config.default_max_pages`, capped at `config.max_pages_cap`).
    /// `total_pages` in the result is always the full document length.
    ///
    /// # Errors
    /// Any hard failure of the stage that was running: unreadable PDF,
    /// rasteriser failure, missing or failing vision model.
    pub async fn extract(
        &self,
        pdf: &[u8],
        max_pages: Option<usize>,
    ) -> Result<ExtractionResult, ExtractError> {
        let start = Instant::now();
        let limit = self.config.pages_to_read(usize::MAX, max_pages);

        // ── Stage A: text layer ──────────────────────────────────────────
        let layer = self.text_layer.read_text(pdf, limit).await?;
        let total_pages = layer.total_pages;
        if total_pages == 0 {
            return Err(ExtractError::EmptyDocument);
        }
        let pages_to_read = total_pages.min(limit);

        // The page count is only known once pdfium has opened the file, so
        // Stage A reports all of its events after the fact.
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(ExtractionMethod::Text, pages_to_read);
            for index in 1..=pages_to_read {
                let chars = layer
                    .pages
                    .iter()
                    .find(|p| p.index == index)
                    .map_or(0, |p| p.text.chars().count());
                cb.on_page_complete(ExtractionMethod::Text, index, chars);
            }
        }

        let text = assemble_pages(&layer.pages, ExtractionMethod::Text);
        if !text.is_empty() {
            return Ok(self.finish(text, total_pages, pages_to_read, ExtractionMethod::Text, start));
        }

        self.escalate(
            ExtractionMethod::Text,
            ExtractionMethod::Ocr,
            &format!("no selectable text on the first {pages_to_read} pages"),
        );

        // ── Stage B: raster + OCR ────────────────────────────────────────
        let (ocr_text, rendered) = self.run_ocr(pdf, pages_to_read).await?;
        let ocr_chars = ocr_text.chars().count();
        if ocr_chars >= self.config.ocr_min_chars {
            return Ok(self.finish(ocr_text, total_pages, pages_to_read, ExtractionMethod::Ocr, start));
        }

        self.escalate(
            ExtractionMethod::Ocr,
            ExtractionMethod::Vision,
            &format!(
                "OCR produced {ocr_chars} chars, below the {}-char threshold",
                self.config.ocr_min_chars
            ),
        );

        // ── Stage C: vision model ────────────────────────────────────────
        let vision_text = self.run_vision(&rendered).await?;
        if vision_text.is_empty() {
            return Err(ExtractError::NothingExtracted {
                pages: pages_to_read,
            });
        }
        Ok(self.finish(vision_text, total_pages, pages_to_read, ExtractionMethod::Vision, start))
    }

    /// Load a local path or URL, then [`extract`](Self::extract) it.
    pub async fn extract_input(
        &self,
        input: &str,
        max_pages: Option<usize>,
    ) -> Result<ExtractionResult, ExtractError> {
        let loaded = load_input(input, 120).await?;
        info!("Extracting '{}' ({} bytes)", loaded.name, loaded.bytes.len());
        self.extract(&loaded.bytes, max_pages).await
    }

    /// Synchronous wrapper around [`extract`](Self::extract).
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn extract_sync(
        &self,
        pdf: &[u8],
        max_pages: Option<usize>,
    ) -> Result<ExtractionResult, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract(pdf, max_pages))
    }

    /// Rasterise and OCR the leading pages.
    ///
    /// Returns the assembled OCR text plus every rendered page, including
    /// those whose OCR came back empty. The scratch directory is removed
    /// before returning, on success and on error alike.
    async fn run_ocr(
        &self,
        pdf: &[u8],
        pages_to_read: usize,
    ) -> Result<(String, Vec<RenderedPage>), ExtractError> {
        let scratch = self.scratch_dir()?;
        let pdf_path = scratch.path().join("input.pdf");
        tokio::fs::write(&pdf_path, pdf)
            .await
            .map_err(|e| ExtractError::io("writing scratch PDF", e))?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(ExtractionMethod::Ocr, pages_to_read);
        }

        let render_start = Instant::now();
        let rendered = self
            .renderer
            .render(&pdf_path, pages_to_read, scratch.path())
            .await?;
        if rendered.is_empty() {
            return Err(ExtractError::RenderProducedNoImages {
                dir: scratch.path().to_path_buf(),
                listing: list_dir(scratch.path()),
            });
        }
        info!(
            "Rendered {} pages in {}ms",
            rendered.len(),
            render_start.elapsed().as_millis()
        );

        let pages = ocr::ocr_pages(&*self.ocr, &rendered, &self.config).await?;
        drop(scratch);

        let text = assemble_pages(&pages, ExtractionMethod::Ocr);
        Ok((text, rendered))
    }

    async fn run_vision(&self, rendered: &[RenderedPage]) -> Result<String, ExtractError> {
        let model = match self.vision {
            Ok(ref model) => model,
            Err(ref hint) => {
                return Err(ExtractError::VisionNotConfigured { hint: hint.clone() });
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(ExtractionMethod::Vision, rendered.len());
        }
        let pages = vision::describe_pages(&**model, rendered, &self.config).await?;
        Ok(assemble_pages(&pages, ExtractionMethod::Vision))
    }

    fn scratch_dir(&self) -> Result<TempDir, ExtractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdfread-");
        let dir = match self.config.scratch_dir {
            Some(ref parent) => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ExtractError::io(format!("creating {}", parent.display()), e))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        dir.map_err(|e| ExtractError::io("creating scratch directory", e))
    }

    fn escalate(&self, from: ExtractionMethod, to: ExtractionMethod, reason: &str) {
        info!("Escalating {} → {}: {}", from, to, reason);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_escalation(from, to, reason);
        }
    }

    fn finish(
        &self,
        text: String,
        total_pages: usize,
        pages_read: usize,
        method: ExtractionMethod,
        start: Instant,
    ) -> ExtractionResult {
        let chars = text.chars().count();
        info!(
            "Extraction complete via {}: {} chars from {}/{} pages in {}ms",
            method,
            chars,
            pages_read,
            total_pages,
            start.elapsed().as_millis()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_complete(method, chars);
        }
        ExtractionResult {
            text,
            total_pages,
            pages_read,
            method,
        }
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            warn!("Could not list {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    names.sort();
    names
}
