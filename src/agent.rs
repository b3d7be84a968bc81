//! Conversational layer on top of the extraction result.
//!
//! [`ExplainPdf`] turns an [`ExtractionResult`] into a plain-language
//! explanation; [`ChatAgent`] handles free-form follow-up questions. Both
//! talk to a model through [`LlmPort`] so they can be driven by a mock.

use crate::error::AgentError;
use crate::output::ExtractionResult;
use crate::policy::PolicyService;
use crate::prompts::{pdf_system_prompt, AGENT_IDENTITY};
use async_trait::async_trait;
use edgequake_llm::ProviderFactory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Upper bound on extracted characters placed in one prompt.
pub const MAX_PDF_CHARS: usize = 18_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A model answer plus bookkeeping for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub text: String,
    pub used_model: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub safety_notes: Vec<String>,
}

/// Port for chat completion.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AgentError>;
}

/// [`LlmPort`] backed by an `edgequake_llm` provider chosen by name
/// (`"openai"`, `"anthropic"`, `"gemini"`, ...).
///
/// A provider instance is created per call because the model is a call
/// argument; creation only reads the API key from the environment.
pub struct EdgequakeChat {
    provider_name: String,
}

impl EdgequakeChat {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
        }
    }
}

#[async_trait]
impl LlmPort for EdgequakeChat {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, model).map_err(
            |e| AgentError::ProviderNotConfigured {
                provider: self.provider_name.clone(),
                hint: e.to_string(),
            },
        )?;

        let messages: Vec<edgequake_llm::ChatMessage> = messages
            .iter()
            .map(|m| match m.role {
                Role::System => edgequake_llm::ChatMessage::system(m.content.as_str()),
                Role::User => edgequake_llm::ChatMessage::user(m.content.as_str()),
                Role::Assistant => edgequake_llm::ChatMessage::assistant(m.content.as_str()),
            })
            .collect();

        let response = provider
            .chat(&messages, None)
            .await
            .map_err(|e| AgentError::LlmApiError {
                message: e.to_string(),
            })?;

        debug!(
            "{}/{}: {} input tokens, {} output tokens",
            self.provider_name, model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Truncate to at most `max_chars` characters without splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Explain an extracted PDF against the user's goal.
pub struct ExplainPdf {
    llm: Arc<dyn LlmPort>,
}

impl ExplainPdf {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self { llm }
    }

    pub async fn run(
        &self,
        model: &str,
        history: &[ChatMessage],
        extraction: &ExtractionResult,
        user_goal: &str,
    ) -> Result<AgentResponse, AgentError> {
        let start = Instant::now();

        let excerpt = truncate_chars(&extraction.text, MAX_PDF_CHARS);
        let user = ChatMessage::user(format!(
            "USER GOAL:\n{user_goal}\n\n\
             TEXT EXTRACTED FROM THE PDF (may be partial; obtained via {}):\n{excerpt}",
            extraction.method.label()
        ));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(pdf_system_prompt()));
        messages.extend_from_slice(history);
        messages.push(user);

        let text = self.llm.chat(model, &messages).await?;
        let latency_ms = start.elapsed().as_millis() as u64;
        info!("Explained PDF with {} in {}ms", model, latency_ms);

        let mut safety_notes = Vec::new();
        if excerpt.len() < extraction.text.len() {
            safety_notes.push(format!(
                "Extracted text was truncated to {MAX_PDF_CHARS} characters."
            ));
        }

        Ok(AgentResponse {
            text,
            used_model: model.to_string(),
            latency_ms,
            safety_notes,
        })
    }
}

/// General chat with redaction of personal data in user input.
pub struct ChatAgent {
    llm: Arc<dyn LlmPort>,
    policy: PolicyService,
}

impl ChatAgent {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self {
            llm,
            policy: PolicyService::new(),
        }
    }

    pub async fn run(
        &self,
        model: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<AgentResponse, AgentError> {
        let start = Instant::now();

        let clean = self.policy.sanitize(user_text);
        let mut safety_notes = Vec::new();
        if clean != user_text {
            safety_notes.push("Personal data was redacted from the message.".to_string());
        }
        let validated = self.policy.validate(clean);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(AGENT_IDENTITY.trim()));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(validated));

        let text = self.llm.chat(model, &messages).await?;
        Ok(AgentResponse {
            text,
            used_model: model.to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
            safety_notes,
        })
    }
}
