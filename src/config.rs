//! Configuration for the extraction cascade.
//!
//! Every external dependency of the pipeline (tool paths, OCR languages,
//! thresholds, the vision provider) is a field of [`ExtractionConfig`].
//! The pipeline never reads the environment at call time; callers resolve
//! overrides once with [`ExtractionConfig::from_env`] (or the builder) and
//! pass the result to [`crate::PdfExtractor::new`].

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Minimum OCR output (in characters, headers included) treated as a
/// successful read. Below it the document is presumed image-dominant.
pub const DEFAULT_OCR_MIN_CHARS: usize = 100;

/// Pages read when the caller does not ask for a specific limit.
pub const DEFAULT_MAX_PAGES: usize = 15;

/// Language vision answers are requested in unless configured otherwise.
pub const DEFAULT_VISION_LANGUAGE: &str = "Portuguese";

/// Upper bound on pages per extraction, whatever the caller asks for.
pub const MAX_PAGES_CAP: usize = 200;

/// Vision-capable model used when only a provider name is known.
///
/// `None` for providers without a sensible default; those need an explicit
/// `vision_model`.
pub fn default_vision_model(provider: &str) -> Option<&'static str> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "openai" => Some("gpt-4.1-nano"),
        "gemini" => Some("gemini-2.0-flash"),
        "ollama" => Some("llama3.2-vision"),
        _ => None,
    }
}

/// Configuration for one [`crate::PdfExtractor`].
///
/// Built via [`ExtractionConfig::builder()`], [`ExtractionConfig::from_env()`]
/// or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfread::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .pdftoppm_path("/opt/poppler/bin/pdftoppm")
///     .ocr_language("deu+eng")
///     .default_max_pages(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// `pdftoppm` executable. Default: `pdftoppm` on `PATH`.
    pub pdftoppm_path: PathBuf,

    /// `tesseract` executable. Default: `tesseract` on `PATH`.
    pub tesseract_path: PathBuf,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Rasterisation DPI. Range: 72–400. Default: 200.
    ///
    /// 200 DPI keeps 10 pt body text above the x-height tesseract needs
    /// without producing images too large for vision upload limits.
    pub dpi: u32,

    /// Combined tesseract language spec tried first. Default: `por+eng`.
    pub ocr_language: String,

    /// Single language retried when the combined pack fails. Default: `eng`.
    pub ocr_fallback_language: String,

    /// Tesseract page-segmentation mode. Default: 3 (fully automatic).
    pub ocr_psm: u8,

    /// OCR escalation threshold in characters. Default: 100.
    pub ocr_min_chars: usize,

    /// Pages read when `extract` is called without a limit. Default: 15.
    pub default_max_pages: usize,

    /// Hard cap on pages per call. Default: 200.
    pub max_pages_cap: usize,

    /// Vision provider name (e.g. "anthropic", "openai", "gemini").
    pub vision_provider_name: Option<String>,

    /// Vision model identifier. If None, [`default_vision_model`] for the
    /// provider.
    pub vision_model: Option<String>,

    /// Pre-constructed vision provider. Takes precedence over the name.
    pub vision_provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens per vision answer. Default: 4096.
    pub vision_max_tokens: usize,

    /// Sampling temperature for vision answers. Default: 0.1.
    pub vision_temperature: f32,

    /// Language the vision model should answer in. Default: `Portuguese`,
    /// matching the `por+eng` OCR default. Blank means no preference.
    pub vision_response_language: Option<String>,

    /// Parent directory for per-call scratch space. If None, the OS temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            tesseract_path: PathBuf::from("tesseract"),
            pdfium_lib_path: None,
            dpi: 200,
            ocr_language: "por+eng".to_string(),
            ocr_fallback_language: "eng".to_string(),
            ocr_psm: 3,
            ocr_min_chars: DEFAULT_OCR_MIN_CHARS,
            default_max_pages: DEFAULT_MAX_PAGES,
            max_pages_cap: MAX_PAGES_CAP,
            vision_provider_name: None,
            vision_model: None,
            vision_provider: None,
            vision_max_tokens: 4096,
            vision_temperature: 0.1,
            vision_response_language: Some(DEFAULT_VISION_LANGUAGE.to_string()),
            scratch_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("pdftoppm_path", &self.pdftoppm_path)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("dpi", &self.dpi)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_fallback_language", &self.ocr_fallback_language)
            .field("ocr_psm", &self.ocr_psm)
            .field("ocr_min_chars", &self.ocr_min_chars)
            .field("default_max_pages", &self.default_max_pages)
            .field("max_pages_cap", &self.max_pages_cap)
            .field("vision_provider_name", &self.vision_provider_name)
            .field("vision_model", &self.vision_model)
            .field(
                "vision_provider",
                &self.vision_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field("vision_response_language", &self.vision_response_language)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults plus overrides from the process environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PDFTOPPM_PATH` | `pdftoppm_path` |
    /// | `POPPLER_PATH` | `pdftoppm_path` = `$POPPLER_PATH/pdftoppm` (if `PDFTOPPM_PATH` unset) |
    /// | `TESSERACT_CMD` | `tesseract_path` |
    /// | `PDFIUM_LIB_PATH` | `pdfium_lib_path` |
    /// | `PDFREAD_VISION_PROVIDER` | `vision_provider_name` |
    /// | `ANTHROPIC_API_KEY` | `vision_provider_name` = `anthropic` (if the above is unset) |
    /// | `PDFREAD_VISION_MODEL` | `vision_model` |
    /// | `PDFREAD_VISION_LANGUAGE` | `vision_response_language` |
    /// | `PDFREAD_SCRATCH_DIR` | `scratch_dir` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("PDFTOPPM_PATH") {
            config.pdftoppm_path = PathBuf::from(path);
        } else if let Some(dir) = get("POPPLER_PATH") {
            config.pdftoppm_path = PathBuf::from(dir).join(pdftoppm_binary_name());
        }
        if let Some(path) = get("TESSERACT_CMD") {
            config.tesseract_path = PathBuf::from(path);
        }
        config.pdfium_lib_path = get("PDFIUM_LIB_PATH").map(PathBuf::from);
        config.vision_provider_name = get("PDFREAD_VISION_PROVIDER")
            .or_else(|| get("ANTHROPIC_API_KEY").map(|_| "anthropic".to_string()));
        config.vision_model = get("PDFREAD_VISION_MODEL");
        if let Some(lang) = get("PDFREAD_VISION_LANGUAGE") {
            config.vision_response_language = Some(lang);
        }
        config.scratch_dir = get("PDFREAD_SCRATCH_DIR").map(PathBuf::from);
        config
    }

    /// The vision model to request: `vision_model`, else the provider's
    /// default. `None` when neither is known.
    pub fn resolved_vision_model(&self) -> Option<String> {
        self.vision_model.clone().or_else(|| {
            self.vision_provider_name
                .as_deref()
                .and_then(default_vision_model)
                .map(str::to_string)
        })
    }

    /// Resolve how many leading pages to process.
    ///
    /// `requested` falls back to `default_max_pages`, is clamped to
    /// `1..=max_pages_cap`, and never exceeds the document length.
    pub fn pages_to_read(&self, total_pages: usize, requested: Option<usize>) -> usize {
        let wanted = requested
            .unwrap_or(self.default_max_pages)
            .clamp(1, self.max_pages_cap.max(1));
        wanted.min(total_pages)
    }
}

fn pdftoppm_binary_name() -> &'static str {
    if cfg!(windows) {
        "pdftoppm.exe"
    } else {
        "pdftoppm"
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_path = path.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_fallback_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_fallback_language = lang.into();
        self
    }

    pub fn ocr_psm(mut self, psm: u8) -> Self {
        self.config.ocr_psm = psm;
        self
    }

    pub fn ocr_min_chars(mut self, n: usize) -> Self {
        self.config.ocr_min_chars = n;
        self
    }

    pub fn default_max_pages(mut self, n: usize) -> Self {
        self.config.default_max_pages = n.max(1);
        self
    }

    pub fn max_pages_cap(mut self, n: usize) -> Self {
        self.config.max_pages_cap = n.max(1);
        self
    }

    pub fn vision_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider_name = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision_provider = Some(provider);
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n;
        self
    }

    pub fn vision_temperature(mut self, t: f32) -> Self {
        self.config.vision_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn vision_response_language(mut self, lang: impl Into<String>) -> Self {
        self.config.vision_response_language = Some(lang.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.ocr_language.trim().is_empty() || c.ocr_fallback_language.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "OCR languages must not be empty".into(),
            ));
        }
        if c.default_max_pages > c.max_pages_cap {
            return Err(ExtractError::InvalidConfig(format!(
                "default_max_pages ({}) exceeds max_pages_cap ({})",
                c.default_max_pages, c.max_pages_cap
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_reference_deployment() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.ocr_language, "por+eng");
        assert_eq!(c.ocr_fallback_language, "eng");
        assert_eq!(c.ocr_psm, 3);
        assert_eq!(c.ocr_min_chars, 100);
        assert_eq!(c.default_max_pages, 15);
        assert_eq!(c.max_pages_cap, 200);
        assert_eq!(c.vision_response_language.as_deref(), Some("Portuguese"));
    }

    #[test]
    fn pages_to_read_bounds() {
        let c = ExtractionConfig::default();
        assert_eq!(c.pages_to_read(40, None), 15);
        assert_eq!(c.pages_to_read(3, None), 3);
        assert_eq!(c.pages_to_read(500, Some(1000)), 200);
        assert_eq!(c.pages_to_read(10, Some(0)), 1);
        assert_eq!(c.pages_to_read(10, Some(4)), 4);
    }

    #[test]
    fn lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("POPPLER_PATH", "/opt/poppler/bin"),
            ("TESSERACT_CMD", "/usr/local/bin/tesseract"),
            ("PDFREAD_VISION_PROVIDER", "anthropic"),
            ("PDFREAD_VISION_MODEL", ""),
        ]
        .into_iter()
        .collect();
        let c = ExtractionConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(c.pdftoppm_path.starts_with("/opt/poppler/bin"));
        assert_eq!(c.tesseract_path, PathBuf::from("/usr/local/bin/tesseract"));
        assert_eq!(c.vision_provider_name.as_deref(), Some("anthropic"));
        assert_eq!(c.vision_model, None, "blank values are ignored");
    }

    #[test]
    fn anthropic_key_selects_anthropic_vision() {
        let c = ExtractionConfig::from_lookup(|k| match k {
            "ANTHROPIC_API_KEY" => Some("sk-ant-test".into()),
            _ => None,
        });
        assert_eq!(c.vision_provider_name.as_deref(), Some("anthropic"));

        let none = ExtractionConfig::from_lookup(|_| None);
        assert_eq!(none.vision_provider_name, None);
    }

    #[test]
    fn openai_provider_gets_an_openai_model() {
        let c = ExtractionConfig::from_lookup(|k| match k {
            "PDFREAD_VISION_PROVIDER" => Some("openai".into()),
            _ => None,
        });
        assert_eq!(c.vision_model, None);
        assert_eq!(c.resolved_vision_model().as_deref(), Some("gpt-4.1-nano"));
    }

    #[test]
    fn vision_model_defaults_follow_the_provider() {
        let model = |provider: &str, explicit: Option<&str>| {
            let mut c = ExtractionConfig::default();
            c.vision_provider_name = Some(provider.to_string());
            c.vision_model = explicit.map(str::to_string);
            c.resolved_vision_model()
        };
        assert_eq!(model("anthropic", None).as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(model("Gemini", None).as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(model("ollama", None).as_deref(), Some("llama3.2-vision"));
        assert_eq!(model("mistral", None), None);
        assert_eq!(model("mistral", Some("pixtral-12b")).as_deref(), Some("pixtral-12b"));
        assert_eq!(ExtractionConfig::default().resolved_vision_model(), None);
    }

    #[test]
    fn vision_language_override() {
        let c = ExtractionConfig::from_lookup(|k| match k {
            "PDFREAD_VISION_LANGUAGE" => Some("English".into()),
            _ => None,
        });
        assert_eq!(c.vision_response_language.as_deref(), Some("English"));
    }

    #[test]
    fn explicit_pdftoppm_path_beats_poppler_dir() {
        let c = ExtractionConfig::from_lookup(|k| match k {
            "PDFTOPPM_PATH" => Some("/x/pdftoppm".into()),
            "POPPLER_PATH" => Some("/y".into()),
            _ => None,
        });
        assert_eq!(c.pdftoppm_path, PathBuf::from("/x/pdftoppm"));
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ExtractionConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);

        let err = ExtractionConfig::builder()
            .ocr_language("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));

        let err = ExtractionConfig::builder()
            .max_pages_cap(10)
            .default_max_pages(20)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
