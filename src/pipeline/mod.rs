//! Pipeline stages of the extraction cascade.
//!
//! Each external capability sits behind a port (trait) so the orchestrator
//! in [`crate::extract`] never knows whether pages come from pdftoppm or an
//! in-process rasteriser, or whether OCR is tesseract or something else.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌── text ──▶ non-empty? ──▶ TEXT
//! PDF bytes ─┤
//!            └── render ─▶ encode (gray) ─▶ ocr ─▶ ≥ threshold? ─▶ OCR
//!                   │                                   │ no
//!                   └─────── retained PNGs ─▶ vision ◀──┘ ─▶ VISION
//! ```
//!
//! 1. [`text`]: pdfium text layer (Stage A)
//! 2. [`render`]: `pdftoppm` rasterisation into a scoped temp dir
//! 3. [`encode`]: grayscale for OCR, base64 for the vision model
//! 4. [`ocr`]: tesseract with one language-fallback retry (Stage B)
//! 5. [`vision`]: image-understanding model (Stage C)
//! 6. [`input`]: path/URL loading for the CLI and convenience APIs

pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;
pub mod text;
pub mod vision;
