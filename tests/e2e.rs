//! End-to-end integration tests for edgequake-pdfread.
//!
//! These run the real pdfium, pdftoppm and tesseract (and, for the vision
//! tier, a live model). They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! Scanned fixtures are looked up in `./test_cases/`; tests whose fixture is
//! missing are skipped.

use edgequake_pdfread::{ExtractError, ExtractionConfig, ExtractionMethod, PdfExtractor};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// A one-page PDF whose only content is `text` in Helvetica.
///
/// Offsets in the xref table are computed so strict parsers accept it too.
fn text_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

// ── Stage A ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_pdf_uses_text_layer() {
    e2e_skip_unless_enabled!();

    let extractor = PdfExtractor::from_env();
    let result = extractor
        .extract(&text_pdf("Quarterly report"), None)
        .await
        .expect("extract() should succeed");

    assert_eq!(result.method, ExtractionMethod::Text);
    assert_eq!(result.total_pages, 1);
    assert!(result.text.starts_with("--- Page 1 ---"), "got: {}", result.text);
    assert!(result.text.contains("Quarterly report"));
}

#[tokio::test]
async fn test_garbage_bytes_are_rejected() {
    e2e_skip_unless_enabled!();

    let err = PdfExtractor::from_env()
        .extract(b"%PDF-1.4\nthis is not really a pdf", None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExtractError::CorruptPdf { .. }),
        "unexpected error: {err}"
    );
}

// ── Stage B / C ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scanned_letter_uses_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_letter.pdf"));

    let result = PdfExtractor::from_env()
        .extract_input(path.to_str().unwrap(), Some(2))
        .await
        .expect("extract_input() should succeed");

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert!(result.text.starts_with("--- Page 1 (OCR) ---"));
    assert!(result.text.chars().count() >= 100);
    println!("{}", result.text);
}

#[tokio::test]
async fn test_flowchart_reaches_vision() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("flowchart.pdf"));

    let extractor = PdfExtractor::new(ExtractionConfig::from_env());
    if !extractor.has_vision() {
        println!("SKIP: no vision provider configured");
        return;
    }

    let result = extractor
        .extract_input(path.to_str().unwrap(), Some(1))
        .await
        .expect("extract_input() should succeed");

    assert_eq!(result.method, ExtractionMethod::Vision);
    assert!(result.text.starts_with("--- Page 1 (Vision) ---"));
    println!("{}", result.text);
}

#[tokio::test]
async fn test_missing_pdftoppm_is_reported() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_letter.pdf"));

    let config = ExtractionConfig::builder()
        .pdftoppm_path("/definitely/not/pdftoppm")
        .build()
        .unwrap();
    let err = PdfExtractor::new(config)
        .extract_input(path.to_str().unwrap(), Some(1))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExtractError::ToolUnavailable { tool: "pdftoppm", .. }),
        "unexpected error: {err}"
    );
}

// ── Always-run structural tests ──────────────────────────────────────────────

#[test]
fn test_fixture_pdf_is_well_formed() {
    let pdf = text_pdf("abc");
    assert!(pdf.starts_with(b"%PDF-1.4"));
    assert!(pdf.ends_with(b"%%EOF\n"));
}

/// The callback type stored in the config must be movable into a task.
#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    use edgequake_pdfread::ExtractionProgressCallback;
    use std::sync::{Arc, Mutex};

    struct ErrorLogger {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ExtractionProgressCallback for ErrorLogger {
        fn on_page_error(&self, _stage: ExtractionMethod, _page: usize, error: &str) {
            self.log.lock().unwrap().push(error.to_string());
        }
    }

    let logger = Arc::new(ErrorLogger {
        log: Arc::new(Mutex::new(vec![])),
    });
    let log_ref = Arc::clone(&logger.log);
    let cb: Arc<dyn ExtractionProgressCallback> = logger;

    tokio::spawn(async move {
        cb.on_page_error(ExtractionMethod::Ocr, 2, "Failed loading language 'por'");
    })
    .await
    .expect("spawn must succeed");

    assert_eq!(
        log_ref.lock().unwrap().clone(),
        vec!["Failed loading language 'por'"]
    );
}
