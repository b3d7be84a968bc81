//! # edgequake-pdfread
//!
//! Get readable text out of any PDF, whether it was born digital, scanned
//! on a copier, or is mostly a flowchart.
//!
//! ## Why this crate?
//!
//! No single technique reads every PDF. The embedded text layer is exact and
//! free but absent from scans; OCR reads scans but fails on diagrams; a
//! vision model reads anything but costs money and time. This crate tries
//! them in order of cost and stops at the first one that produces usable
//! text, reporting which one it used.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ A. Text    pdfium text layer of the first N pages
//!  │             any text? ──▶ done (method = text)
//!  ├─ B. OCR     pdftoppm → grayscale → tesseract (por+eng, then eng)
//!  │             ≥ 100 chars? ──▶ done (method = ocr)
//!  └─ C. Vision  every rendered page → image-understanding model
//!                ──▶ done (method = vision), or a descriptive error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfread::{ExtractionConfig, PdfExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision tier enabled by PDFREAD_VISION_PROVIDER or ANTHROPIC_API_KEY
//!     let extractor = PdfExtractor::new(ExtractionConfig::from_env());
//!     let result = extractor.extract_input("scan.pdf", None).await?;
//!     println!("{}", result.text);
//!     eprintln!(
//!         "{} pages in file · {} read · {}",
//!         result.total_pages,
//!         result.pages_read,
//!         result.method.label()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Stage | Located via |
//! |------|-------|-------------|
//! | pdfium | A | `PDFIUM_LIB_PATH` or the system library path |
//! | `pdftoppm` (poppler) | B | `PDFTOPPM_PATH`, `POPPLER_PATH` or `PATH` |
//! | `tesseract` + `por`/`eng` data | B | `TESSERACT_CMD` or `PATH` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfread` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfread = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod agent;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod prompts;
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use agent::{AgentResponse, ChatAgent, ChatMessage, EdgequakeChat, ExplainPdf, LlmPort, Role};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{AgentError, ExtractError, OcrError};
pub use extract::PdfExtractor;
pub use output::{ExtractionMethod, ExtractionResult};
pub use pipeline::input::load_input;
pub use policy::PolicyService;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
