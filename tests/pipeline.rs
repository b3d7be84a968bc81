//! Cascade behaviour tests.
//!
//! The orchestrator is driven through mock ports from
//! `edgequake_pdfread::testing`, so these run without pdfium, poppler,
//! tesseract or a network. The `pdftoppm` renderer itself is exercised
//! against small shell scripts standing in for the real binary.

use edgequake_pdfread::error::ExtractError;
use edgequake_pdfread::pipeline::vision::VisionModel;
use edgequake_pdfread::testing::{page_png, MockOcr, MockRenderer, MockTextLayer, MockVision};
use edgequake_pdfread::{
    ExtractionConfig, ExtractionMethod, ExtractionProgressCallback, PdfExtractor,
};
use std::sync::{Arc, Mutex};

const PDF: &[u8] = b"%PDF-1.7\n%mock\n";

struct Ports {
    text: Arc<MockTextLayer>,
    renderer: Arc<MockRenderer>,
    ocr: Arc<MockOcr>,
    vision: Option<Arc<MockVision>>,
}

impl Ports {
    fn new(text: MockTextLayer, renderer: MockRenderer, ocr: MockOcr, vision: Option<MockVision>) -> Self {
        Self {
            text: Arc::new(text),
            renderer: Arc::new(renderer),
            ocr: Arc::new(ocr),
            vision: vision.map(Arc::new),
        }
    }

    fn extractor(&self, config: ExtractionConfig) -> PdfExtractor {
        PdfExtractor::with_ports(
            config,
            self.text.clone(),
            self.renderer.clone(),
            self.ocr.clone(),
            self.vision.clone().map(|v| v as Arc<dyn VisionModel>),
        )
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ExtractionProgressCallback for Recorder {
    fn on_stage_start(&self, stage: ExtractionMethod, pages: usize) {
        self.events.lock().unwrap().push(format!("start {stage} {pages}"));
    }
    fn on_page_error(&self, stage: ExtractionMethod, page_num: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("error {stage} {page_num}"));
    }
    fn on_escalation(&self, from: ExtractionMethod, to: ExtractionMethod, _reason: &str) {
        self.events.lock().unwrap().push(format!("escalate {from}->{to}"));
    }
    fn on_extraction_complete(&self, method: ExtractionMethod, _chars: usize) {
        self.events.lock().unwrap().push(format!("done {method}"));
    }
}

// ── Stage A ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_layer_short_circuits_the_cascade() {
    let ports = Ports::new(
        MockTextLayer::new(3).with_page_text(2, "Invoice #4521"),
        MockRenderer::new(),
        MockOcr::new(),
        Some(MockVision::new()),
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap();

    assert_eq!(result.text, "--- Page 2 ---\nInvoice #4521");
    assert_eq!(result.method, ExtractionMethod::Text);
    assert_eq!(result.total_pages, 3);
    assert_eq!(result.pages_read, 3);
    assert!(ports.renderer.calls().is_empty(), "renderer must not run");
    assert!(ports.ocr.calls().is_empty());
    assert!(ports.vision.as_ref().unwrap().pages_seen().is_empty());
}

#[tokio::test]
async fn total_pages_is_the_full_document_length() {
    let ports = Ports::new(
        MockTextLayer::new(40).with_page_text(1, "Cover"),
        MockRenderer::new(),
        MockOcr::new(),
        None,
    );
    let extractor = ports.extractor(ExtractionConfig::default());

    let result = extractor.extract(PDF, None).await.unwrap();
    assert_eq!(result.total_pages, 40);
    assert_eq!(result.pages_read, 15);

    let result = extractor.extract(PDF, Some(5)).await.unwrap();
    assert_eq!(result.total_pages, 40);
    assert_eq!(result.pages_read, 5);
}

#[tokio::test]
async fn page_limit_is_clamped() {
    let ports = Ports::new(
        MockTextLayer::new(500).with_page_text(1, "x"),
        MockRenderer::new(),
        MockOcr::new(),
        None,
    );
    let extractor = ports.extractor(ExtractionConfig::default());

    extractor.extract(PDF, Some(0)).await.unwrap();
    extractor.extract(PDF, Some(10_000)).await.unwrap();
    extractor.extract(PDF, None).await.unwrap();

    assert_eq!(ports.text.calls(), vec![1, 200, 15]);
}

#[tokio::test]
async fn text_past_the_limit_does_not_count() {
    let ports = Ports::new(
        MockTextLayer::new(10).with_page_text(9, "appendix"),
        MockRenderer::new(),
        MockOcr::new().with_page_text(1, "x".repeat(200)),
        None,
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, Some(3))
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(ports.renderer.calls()[0].last_page, 3);
}

#[tokio::test]
async fn text_stage_progress_covers_every_page_read() {
    #[derive(Default)]
    struct Pages {
        starts: Mutex<Vec<usize>>,
        done: Mutex<Vec<(usize, usize)>>,
    }
    impl ExtractionProgressCallback for Pages {
        fn on_stage_start(&self, stage: ExtractionMethod, pages: usize) {
            if stage == ExtractionMethod::Text {
                self.starts.lock().unwrap().push(pages);
            }
        }
        fn on_page_complete(&self, stage: ExtractionMethod, page_num: usize, chars: usize) {
            if stage == ExtractionMethod::Text {
                self.done.lock().unwrap().push((page_num, chars));
            }
        }
    }

    let pages = Arc::new(Pages::default());
    let ports = Ports::new(
        MockTextLayer::new(2).with_page_text(2, "Invoice"),
        MockRenderer::new(),
        MockOcr::new(),
        None,
    );
    let config = ExtractionConfig::builder()
        .progress_callback(pages.clone())
        .build()
        .unwrap();

    ports.extractor(config).extract(PDF, None).await.unwrap();

    assert_eq!(*pages.starts.lock().unwrap(), vec![2], "document length, not the limit");
    assert_eq!(*pages.done.lock().unwrap(), vec![(1, 0), (2, 7)]);
}

#[tokio::test]
async fn empty_and_corrupt_documents_fail() {
    let ports = Ports::new(MockTextLayer::new(0), MockRenderer::new(), MockOcr::new(), None);
    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyDocument));

    let ports = Ports::new(
        MockTextLayer::new(3).corrupt("xref table unreadable"),
        MockRenderer::new(),
        MockOcr::new(),
        None,
    );
    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::CorruptPdf { .. }));
    assert!(ports.renderer.calls().is_empty());
}

// ── Stage B ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scanned_document_is_read_by_ocr() {
    let body = "Relatório anual de atividades. ".repeat(5);
    let ports = Ports::new(
        MockTextLayer::new(2),
        MockRenderer::new(),
        MockOcr::new().with_page_text(1, format!("  {body}\n")),
        Some(MockVision::new()),
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(result.text, format!("--- Page 1 (OCR) ---\n{}", body.trim()));
    assert_eq!(result.pages_read, 2);
    assert!(ports.vision.as_ref().unwrap().pages_seen().is_empty());

    let calls = ports.renderer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last_page, 2);
    assert!(calls[0].pdf_existed, "PDF must be on disk before rendering");
    assert!(!calls[0].out_dir.exists(), "scratch directory must be removed");
}

#[tokio::test]
async fn ocr_threshold_counts_assembled_characters() {
    // "--- Page 1 (OCR) ---\na b" is 24 characters.
    let ports = Ports::new(
        MockTextLayer::new(1),
        MockRenderer::new(),
        MockOcr::new().with_page_text(1, "a b"),
        Some(MockVision::new()),
    );

    let at = ExtractionConfig::builder().ocr_min_chars(24).build().unwrap();
    let result = ports.extractor(at).extract(PDF, None).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(result.text, "--- Page 1 (OCR) ---\na b");

    let above = ExtractionConfig::builder().ocr_min_chars(25).build().unwrap();
    let result = ports.extractor(above).extract(PDF, None).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Vision);
}

#[tokio::test]
async fn short_ocr_escalates_to_vision_with_every_page() {
    let ports = Ports::new(
        MockTextLayer::new(3),
        MockRenderer::new(),
        MockOcr::new().with_page_text(1, "a b"),
        Some(MockVision::new().with_page_text(2, "Flowchart: start -> approve -> end")),
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Vision);
    assert_eq!(result.total_pages, 3);
    assert_eq!(
        result.text,
        "--- Page 1 (Vision) ---\npage 1 described\n\n\
         --- Page 2 (Vision) ---\nFlowchart: start -> approve -> end\n\n\
         --- Page 3 (Vision) ---\npage 3 described"
    );

    let vision = ports.vision.as_ref().unwrap();
    assert_eq!(vision.pages_seen(), vec![1, 2, 3], "pages with empty OCR are included");
    assert_eq!(vision.images_seen()[0], page_png(1), "vision gets the rendered image");
}

#[tokio::test]
async fn combined_language_failure_retries_with_fallback() {
    let ports = Ports::new(
        MockTextLayer::new(1),
        MockRenderer::new(),
        MockOcr::new()
            .failing_language("por+eng")
            .with_page_text(1, "y".repeat(150)),
        None,
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    let languages: Vec<String> = ports.ocr.calls().into_iter().map(|c| c.language).collect();
    assert_eq!(languages, vec!["por+eng", "eng"]);
}

#[tokio::test]
async fn ocr_failing_twice_blanks_the_page_and_continues() {
    let recorder = Arc::new(Recorder::default());
    let ports = Ports::new(
        MockTextLayer::new(2),
        MockRenderer::new(),
        MockOcr::new()
            .failing_language("por+eng")
            .failing_language("eng"),
        Some(MockVision::new()),
    );
    let config = ExtractionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let result = ports.extractor(config).extract(PDF, None).await.unwrap();

    assert_eq!(result.method, ExtractionMethod::Vision);
    assert_eq!(ports.ocr.calls().len(), 4, "two attempts per page, no more");
    assert_eq!(
        recorder.events(),
        vec![
            "start text 2",
            "escalate text->ocr",
            "start ocr 2",
            "error ocr 1",
            "error ocr 2",
            "escalate ocr->vision",
            "start vision 2",
            "done vision",
        ]
    );
}

#[tokio::test]
async fn render_failure_propagates_without_further_stages() {
    let ports = Ports::new(
        MockTextLayer::new(2),
        MockRenderer::new().failing("Syntax Error: Couldn't read xref table"),
        MockOcr::new(),
        Some(MockVision::new()),
    );

    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();

    match err {
        ExtractError::RenderFailed { stderr, .. } => assert!(stderr.contains("xref")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(ports.ocr.calls().is_empty());
    assert!(ports.vision.as_ref().unwrap().pages_seen().is_empty());
    assert!(!ports.renderer.calls()[0].out_dir.exists());
}

#[tokio::test]
async fn renderer_producing_nothing_is_an_error() {
    let ports = Ports::new(MockTextLayer::new(2), MockRenderer::new().empty(), MockOcr::new(), None);

    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();

    match err {
        ExtractError::RenderProducedNoImages { listing, .. } => {
            assert_eq!(listing, vec!["input.pdf".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Stage C ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_vision_model_is_reported_only_when_needed() {
    let ports = Ports::new(MockTextLayer::new(1), MockRenderer::new(), MockOcr::new(), None);
    let extractor = ports.extractor(ExtractionConfig::default());
    assert!(!extractor.has_vision());

    let err = extractor.extract(PDF, None).await.unwrap_err();
    assert!(matches!(err, ExtractError::VisionNotConfigured { .. }));
    assert!(err.to_string().contains("no vision model is configured"));
}

#[tokio::test]
async fn vision_failure_is_terminal() {
    let ports = Ports::new(
        MockTextLayer::new(3),
        MockRenderer::new(),
        MockOcr::new(),
        Some(MockVision::new().failing_on(2)),
    );

    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::VisionCallFailed { page: 2, .. }));
    assert_eq!(ports.vision.as_ref().unwrap().pages_seen(), vec![1, 2]);
}

#[tokio::test]
async fn all_tiers_empty_is_an_error() {
    let ports = Ports::new(
        MockTextLayer::new(1),
        MockRenderer::new(),
        MockOcr::new(),
        Some(MockVision::new().with_page_text(1, "   ")),
    );

    let err = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NothingExtracted { pages: 1 }));
}

#[tokio::test]
async fn one_page_scan_with_three_ocr_chars_is_described() {
    let ports = Ports::new(
        MockTextLayer::new(1),
        MockRenderer::new(),
        MockOcr::new().with_page_text(1, "a b"),
        Some(MockVision::new().with_page_text(1, "This is a flowchart showing the approval path.")),
    );

    let result = ports
        .extractor(ExtractionConfig::default())
        .extract(PDF, None)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Vision);
    assert_eq!(result.total_pages, 1);
    assert_eq!(
        result.text,
        "--- Page 1 (Vision) ---\nThis is a flowchart showing the approval path."
    );
}

// ── Whole-pipeline properties ────────────────────────────────────────────────

#[tokio::test]
async fn repeated_calls_give_identical_results() {
    let ports = Ports::new(
        MockTextLayer::new(4),
        MockRenderer::new(),
        MockOcr::new().with_page_text(3, "z".repeat(120)),
        None,
    );
    let extractor = ports.extractor(ExtractionConfig::default());

    let first = extractor.extract(PDF, Some(4)).await.unwrap();
    let second = extractor.extract(PDF, Some(4)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_calls_use_separate_scratch_directories() {
    let scratch = tempfile::tempdir().unwrap();
    let ports = Ports::new(
        MockTextLayer::new(2),
        MockRenderer::new(),
        MockOcr::new().with_page_text(2, "w".repeat(150)),
        None,
    );
    let config = ExtractionConfig::builder()
        .scratch_dir(scratch.path())
        .build()
        .unwrap();
    let extractor = ports.extractor(config);
    let other = extractor.clone();

    let (a, b) = tokio::join!(extractor.extract(PDF, None), other.extract(PDF, None));
    assert_eq!(a.unwrap(), b.unwrap());

    let calls = ports.renderer.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].out_dir, calls[1].out_dir);
    for call in &calls {
        assert_eq!(call.out_dir.parent(), Some(scratch.path()));
        assert!(!call.out_dir.exists());
    }
}

#[test]
fn extract_sync_matches_async() {
    let ports = Ports::new(
        MockTextLayer::new(1).with_page_text(1, "hello"),
        MockRenderer::new(),
        MockOcr::new(),
        None,
    );
    let result = ports
        .extractor(ExtractionConfig::default())
        .extract_sync(PDF, None)
        .unwrap();
    assert_eq!(result.text, "--- Page 1 ---\nhello");
}

#[test]
fn result_serialises_with_lowercase_method() {
    let result = edgequake_pdfread::ExtractionResult {
        text: "--- Page 1 (OCR) ---\nx".into(),
        total_pages: 3,
        pages_read: 3,
        method: ExtractionMethod::Ocr,
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["method"], "ocr");
    assert_eq!(json["total_pages"], 3);
}

// ── pdftoppm renderer against stand-in scripts ───────────────────────────────

#[cfg(unix)]
mod pdftoppm {
    use edgequake_pdfread::error::ExtractError;
    use edgequake_pdfread::pipeline::render::{PageRenderer, PdftoppmRenderer};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-pdftoppm");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn non_zero_exit_reports_command_and_stderr() {
        let tools = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = script(
            tools.path(),
            "echo \"Syntax Error: Couldn't read xref table\" >&2\nexit 99",
        );

        let err = PdftoppmRenderer::new(&program, 150)
            .render(Path::new("/tmp/in.pdf"), 4, out.path())
            .await
            .unwrap_err();

        match err {
            ExtractError::RenderFailed {
                command, stderr, ..
            } => {
                assert!(command.contains("-f 1 -l 4 -png -r 150"), "got: {command}");
                assert!(command.contains("/tmp/in.pdf"));
                assert!(stderr.contains("Couldn't read xref table"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn success_without_images_lists_the_directory() {
        let tools = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("input.pdf"), b"%PDF").unwrap();
        let program = script(tools.path(), "exit 0");

        let err = PdftoppmRenderer::new(&program, 200)
            .render(&out.path().join("input.pdf"), 2, out.path())
            .await
            .unwrap_err();

        match err {
            ExtractError::RenderProducedNoImages { listing, .. } => {
                assert_eq!(listing, vec!["input.pdf".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn pages_come_back_in_numeric_order() {
        let tools = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // The output prefix is the last argument.
        let program = script(
            tools.path(),
            "for a in \"$@\"; do last=\"$a\"; done\n\
             for n in 10 02 01; do printf 'p%s' \"$n\" > \"$last-$n.png\"; done",
        );

        let pages = PdftoppmRenderer::new(&program, 200)
            .render(Path::new("/tmp/in.pdf"), 10, out.path())
            .await
            .unwrap();

        let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 10]);
        assert_eq!(pages[2].image_bytes, b"p10");
    }

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let out = tempfile::tempdir().unwrap();
        let err = PdftoppmRenderer::new("/definitely/not/pdftoppm", 200)
            .render(Path::new("/tmp/in.pdf"), 1, out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ToolUnavailable { tool: "pdftoppm", .. }));
    }
}
