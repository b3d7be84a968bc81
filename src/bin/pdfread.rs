//! CLI binary for edgequake-pdfread.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfread::{
    load_input, EdgequakeChat, ExplainPdf, ExtractionConfig, ExtractionMethod,
    ExtractionProgressCallback, PdfExtractor, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar per stage, a log line per page and per
/// escalation.
struct CliProgressCallback {
    bar: ProgressBar,
    /// OCR pages that failed even with the fallback language.
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Opening");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_errors: AtomicUsize::new(0),
        })
    }

    /// Stop the spinner and wipe the bar so an error prints on a clean line.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn stage_prefix(stage: ExtractionMethod) -> &'static str {
        match stage {
            ExtractionMethod::Text => "Text layer",
            ExtractionMethod::Ocr => "OCR",
            ExtractionMethod::Vision => "Vision",
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: ExtractionMethod, pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_prefix(Self::stage_prefix(stage));
        self.bar.set_length(pages as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn on_page_complete(&self, stage: ExtractionMethod, page_num: usize, chars: usize) {
        if stage != ExtractionMethod::Text {
            self.bar.println(format!(
                "  {} Page {:>3}  {}",
                green("✓"),
                page_num,
                dim(&format!("{chars:>5} chars ({})", stage.as_str())),
            ));
        }
        self.bar.inc(1);
    }

    fn on_page_error(&self, _stage: ExtractionMethod, page_num: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Page {:>3}  {}", red("✗"), page_num, red(&msg)));
    }

    fn on_escalation(&self, _from: ExtractionMethod, to: ExtractionMethod, reason: &str) {
        self.bar.println(format!(
            "{} {} {}",
            cyan("◆"),
            bold(&format!("Switching to {}:", to.label())),
            dim(reason)
        ));
    }

    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        self.bar.finish_and_clear();
        let errors = self.page_errors.load(Ordering::SeqCst);
        let mark = if errors == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{} {} chars via {}{}",
            mark,
            bold(&chars.to_string()),
            method.label(),
            if errors == 0 {
                String::new()
            } else {
                format!("  ({} OCR pages failed)", red(&errors.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text (stdout)
  pdfread document.pdf

  # Read more pages of a long report
  pdfread --max-pages 60 report.pdf

  # JSON result with method and page counts
  pdfread --json scan.pdf > result.json

  # Extract, then ask a model to explain it
  pdfread --explain "What are the payment terms?" contract.pdf

  # Extract from URL
  pdfread https://example.com/flowchart.pdf

HOW IT WORKS:
  1. Text layer   selectable text of the first N pages (pdfium)
  2. OCR          only if there is no text: pdftoppm + tesseract (por+eng)
  3. Vision       only if OCR finds fewer than 100 chars: every page image
                  is sent to a vision model (diagrams, flowcharts)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH           Directory or file of libpdfium
  PDFTOPPM_PATH             pdftoppm executable
  POPPLER_PATH              Directory containing pdftoppm
  TESSERACT_CMD             tesseract executable
  PDFREAD_VISION_PROVIDER   Vision provider (anthropic, openai, gemini, ...)
  PDFREAD_VISION_MODEL      Vision model ID (default depends on the provider)
  PDFREAD_VISION_LANGUAGE   Language vision answers are written in (Portuguese)
  ANTHROPIC_API_KEY         Enables the anthropic vision provider by default
  OPENAI_API_KEY            Key for --explain with the openai provider
  PDFREAD_SCRATCH_DIR       Parent directory for temporary page images
"#;

/// Extract text from any PDF: text layer, then OCR, then a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdfread",
    version,
    about = "Extract text from any PDF: text layer, then OCR, then a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Number of leading pages to read (1–200).
    #[arg(long, env = "PDFREAD_MAX_PAGES",
          value_parser = clap::value_parser!(u64).range(1..=200))]
    max_pages: Option<u64>,

    /// Output the structured result as JSON.
    #[arg(long, env = "PDFREAD_JSON")]
    json: bool,

    /// After extraction, ask a chat model to explain the document for this goal.
    #[arg(long, value_name = "GOAL")]
    explain: Option<String>,

    /// Chat model used by --explain.
    #[arg(long, env = "PDFREAD_MODEL", default_value = "gpt-4.1-nano")]
    model: String,

    /// Chat provider used by --explain: openai, anthropic, gemini, ollama.
    #[arg(long, env = "PDFREAD_PROVIDER", default_value = "openai")]
    provider: String,

    /// Vision provider for the last-resort tier.
    #[arg(long)]
    vision_provider: Option<String>,

    /// Vision model for the last-resort tier.
    #[arg(long)]
    vision_model: Option<String>,

    /// Rasterisation DPI for OCR and vision (72–400).
    #[arg(long, env = "PDFREAD_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Combined tesseract language spec tried first.
    #[arg(long, env = "PDFREAD_OCR_LANG", default_value = "por+eng")]
    ocr_lang: String,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFREAD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDFREAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFREAD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFREAD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless verbose output is asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = progress
        .clone()
        .map(|p| p as Arc<dyn ExtractionProgressCallback>);
    let config = build_config(&cli, progress_cb);
    let extractor = PdfExtractor::new(config);

    // ── Extract ──────────────────────────────────────────────────────────
    let extracted = async {
        let loaded = load_input(&cli.input, cli.download_timeout)
            .await
            .with_context(|| format!("Failed to load '{}'", cli.input))?;
        extractor
            .extract(&loaded.bytes, cli.max_pages.map(|n| n as usize))
            .await
            .with_context(|| format!("Extraction failed for '{}'", loaded.name))
    }
    .await;
    let result = match extracted {
        Ok(result) => result,
        Err(e) => {
            if let Some(ref p) = progress {
                p.abandon();
            }
            return Err(e);
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}",
            dim(&format!(
                "{} pages in file · {} pages read · {}",
                result.total_pages,
                result.pages_read,
                result.method.label()
            ))
        );
    }

    // ── Explain ──────────────────────────────────────────────────────────
    if let Some(ref goal) = cli.explain {
        let llm = Arc::new(EdgequakeChat::new(cli.provider.clone()));
        let response = ExplainPdf::new(llm)
            .run(&cli.model, &[], &result, goal)
            .await
            .context("Explanation failed")?;

        println!();
        println!("{}", bold("Explanation"));
        println!("{}", response.text.trim());
        if !cli.quiet {
            for note in &response.safety_notes {
                eprintln!("{} {}", cyan("⚠"), note);
            }
            eprintln!(
                "{}",
                dim(&format!("{} · {}ms", response.used_model, response.latency_ms))
            );
        }
    }

    Ok(())
}

/// Map CLI args onto the environment-derived `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> ExtractionConfig {
    let mut config = ExtractionConfig::from_env();
    config.dpi = cli.dpi;
    config.ocr_language = cli.ocr_lang.clone();
    if cli.vision_provider.is_some() {
        config.vision_provider_name = cli.vision_provider.clone();
    }
    if cli.vision_model.is_some() {
        config.vision_model = cli.vision_model.clone();
    }
    config.progress_callback = progress;
    config
}
