//! Progress-callback trait for stage and page events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow
//! the cascade as it runs: which stage started, each page it finished,
//! OCR pages that failed even after the language fallback, and every
//! escalation to a more expensive tier.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfread::{ExtractionConfig, ExtractionMethod, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_escalation(&self, from: ExtractionMethod, to: ExtractionMethod, reason: &str) {
//!         eprintln!("{from} -> {to}: {reason}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ExtractionMethod;
use std::sync::Arc;

/// Called by the pipeline as it moves through stages and pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: several
/// extractions may share one callback from different tasks.
pub trait ExtractionProgressCallback: Send + Sync {
    /// A stage is about to process `pages` pages.
    fn on_stage_start(&self, stage: ExtractionMethod, pages: usize) {
        let _ = (stage, pages);
    }

    /// A page finished within `stage`; `chars` is the length of its text
    /// (zero for pages that yielded nothing).
    fn on_page_complete(&self, stage: ExtractionMethod, page_num: usize, chars: usize) {
        let _ = (stage, page_num, chars);
    }

    /// A page failed within `stage` without failing the stage.
    fn on_page_error(&self, stage: ExtractionMethod, page_num: usize, error: &str) {
        let _ = (stage, page_num, error);
    }

    /// The pipeline judged `from` insufficient and moves on to `to`.
    fn on_escalation(&self, from: ExtractionMethod, to: ExtractionMethod, reason: &str) {
        let _ = (from, to, reason);
    }

    /// The pipeline returned text produced by `method`.
    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        let _ = (method, chars);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
