//! Redaction of personal data before user text reaches a model.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+").unwrap());

/// Brazilian individual taxpayer number, `000.000.000-00`.
static CPF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b").unwrap());

/// Brazilian company registration number, `00.000.000/0000-00`.
static CNPJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b").unwrap());

/// Governance hook applied to free-form user input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyService;

impl PolicyService {
    pub fn new() -> Self {
        Self
    }

    /// Replace e-mail addresses, CPF and CNPJ numbers with placeholders.
    pub fn sanitize(&self, text: &str) -> String {
        let text = EMAIL_RE.replace_all(text, "[EMAIL_REDACTED]");
        let text = CPF_RE.replace_all(&text, "[CPF_REDACTED]");
        let text = CNPJ_RE.replace_all(&text, "[CNPJ_REDACTED]");
        text.into_owned()
    }

    /// Content gate for inappropriate input. Currently accepts everything.
    pub fn validate(&self, text: String) -> String {
        text
    }
}
