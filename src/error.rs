//! Error types for the edgequake-pdfread library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ExtractError`]: **fatal** for one `extract()` call: the cascade could
//!   not produce an authoritative text (corrupt PDF, rasteriser failure,
//!   vision model missing or failing). Each variant names the stage that
//!   gave up so the caller can tell a capability gap from a broken document.
//!
//! * [`AgentError`]: failures of the downstream chat layer (provider not
//!   configured, API rejected the call).
//!
//! A failed OCR call on a single page is *not* an error here: the page is
//! retried once with the fallback language and, failing that, contributes
//! no text. Those events are logged and reported through
//! [`crate::progress::ExtractionProgressCallback::on_page_error`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: [u8; 4] },

    // ── Stage A: text layer ───────────────────────────────────────────────
    /// PDF structure is damaged beyond what tolerant parsing can repair.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// The document parsed but has no pages at all.
    #[error("PDF has no pages; nothing to extract")]
    EmptyDocument,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Stage B: raster + OCR ─────────────────────────────────────────────
    /// An external tool could not be started at all.
    #[error("Could not start {tool} at '{path}': {source}\nInstall it or point the configuration at the binary.")]
    ToolUnavailable {
        tool: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rasteriser exited non-zero. Not retried.
    #[error("Page rasteriser failed ({status}).\nCommand: {command}\nSTDERR:\n{stderr}\nSTDOUT:\n{stdout}")]
    RenderFailed {
        command: String,
        status: String,
        stderr: String,
        stdout: String,
    },

    /// The rasteriser exited zero but wrote no page images.
    #[error("Page rasteriser reported success but produced no PNG images in '{dir}'.\nFiles present: {listing:?}")]
    RenderProducedNoImages { dir: PathBuf, listing: Vec<String> },

    /// A rendered page image could not be decoded for OCR.
    #[error("Rendered image for page {page} could not be decoded: {detail}")]
    ImageDecode { page: usize, detail: String },

    // ── Stage C: vision fallback ──────────────────────────────────────────
    /// OCR was insufficient and no vision model is configured.
    #[error(
        "OCR produced too little text and no vision model is configured.\n{hint}\n\
Configure a vision provider (e.g. set ANTHROPIC_API_KEY) to enable diagram and image analysis."
    )]
    VisionNotConfigured { hint: String },

    /// The vision model call failed. Terminal: there is no further tier.
    #[error("Vision model call failed on page {page}: {message}")]
    VisionCallFailed { page: usize, message: String },

    /// Every tier ran and none produced any text.
    #[error("No text could be extracted from the first {pages} pages by any method")]
    NothingExtracted { pages: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Scratch space or other local I/O failed.
    #[error("I/O error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ExtractError::Io {
            context: context.into(),
            source,
        }
    }
}

/// A non-fatal OCR failure for one recognition attempt.
///
/// The OCR stage retries once with the fallback language; if that attempt
/// fails too, the page contributes no text and the stage carries on.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The OCR engine could not be started.
    #[error("could not start OCR engine: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine ran and exited non-zero (e.g. missing language pack).
    #[error("OCR engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// Any other engine-specific failure.
    #[error("OCR failed: {0}")]
    Engine(String),
}

/// Errors from the chat-agent layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The configured chat provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The chat API returned an error (auth, quota, timeout).
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },
}
