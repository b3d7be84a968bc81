//! Stage C: ask an image-understanding model to read what OCR could not.
//!
//! Reached only when OCR produced less text than the confidence threshold,
//! which in practice means diagrams, flowcharts and sparse scanned forms.
//! Every rendered page is sent, including pages OCR judged empty.
//!
//! There is no retry here and no tier below this one: a failed call ends
//! the extraction with [`ExtractError::VisionCallFailed`].

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionMethod, PageOutput, RenderedPage};
use crate::pipeline::encode::encode_page;
use crate::prompts::vision_instruction;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Port for Stage C.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Answer `instruction` about one page image.
    ///
    /// Failures are reported as [`ExtractError::VisionCallFailed`] naming
    /// `page.index`.
    async fn describe(&self, page: &RenderedPage, instruction: &str) -> Result<String, ExtractError>;
}

/// [`VisionModel`] backed by any `edgequake_llm` provider with vision support.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    async fn describe(&self, page: &RenderedPage, instruction: &str) -> Result<String, ExtractError> {
        let start = Instant::now();
        let image = encode_page(&page.image_bytes);
        let messages = vec![ChatMessage::user_with_images(instruction, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ExtractError::VisionCallFailed {
                page: page.index,
                message: e.to_string(),
            })?;

        debug!(
            "Page {}: {} input tokens, {} output tokens, {:?}",
            page.index,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content.trim().to_string())
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.vision_temperature),
        max_tokens: Some(config.vision_max_tokens),
        ..Default::default()
    }
}

/// Resolve the vision provider from configuration.
///
/// 1. A pre-built provider (`config.vision_provider`) is used as-is.
/// 2. A provider name is handed to [`ProviderFactory::create_llm_provider`],
///    which reads that provider's API key. The model is `vision_model`, or
///    the provider's default; a provider with neither is not configured.
///
/// `Err` carries a hint for [`ExtractError::VisionNotConfigured`]; the
/// pipeline only raises it if OCR turns out to be insufficient.
pub fn resolve_vision_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, String> {
    if let Some(ref provider) = config.vision_provider {
        return Ok(Arc::clone(provider));
    }

    let Some(ref name) = config.vision_provider_name else {
        return Err("No vision provider is configured \
            (set PDFREAD_VISION_PROVIDER or ANTHROPIC_API_KEY)."
            .to_string());
    };

    let Some(model) = config.resolved_vision_model() else {
        return Err(format!(
            "Vision provider '{name}' has no default model \
             (set PDFREAD_VISION_MODEL or --vision-model)."
        ));
    };
    ProviderFactory::create_llm_provider(name, &model)
        .map_err(|e| format!("Vision provider '{name}' with model '{model}' is unavailable: {e}"))
}

/// Describe every page in order, one request per page.
pub async fn describe_pages(
    model: &dyn VisionModel,
    pages: &[RenderedPage],
    config: &ExtractionConfig,
) -> Result<Vec<PageOutput>, ExtractError> {
    let instruction = vision_instruction(config.vision_response_language.as_deref());
    let mut out = Vec::with_capacity(pages.len());

    for page in pages {
        let text = model.describe(page, &instruction).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(ExtractionMethod::Vision, page.index, text.chars().count());
        }
        out.push(PageOutput::new(page.index, text));
    }

    info!("Vision model described {} pages", out.len());
    Ok(out)
}
