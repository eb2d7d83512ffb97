//! Summarization: the [`Summarizer`] contract, its OpenAI-compatible and
//! Gemini clients, and the [`SummarizationStage`].

pub mod gemini;
pub mod openai;
pub mod stage;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::aggregate::FailureReason;
use crate::config::{Credentials, SummarizeConfig, SummarizerKind};
use crate::error::PipelineError;

pub use gemini::GeminiSummarizer;
pub use openai::OpenAiCompatibleSummarizer;
pub use stage::{SummarizationStage, SummaryOutcome};

/// System instruction shared by every summarizer client.
pub const SYSTEM_PROMPT: &str = "You are a research assistant. Summarize web content accurately \
and concisely. Keep concrete facts, figures and names. Do not invent information.";

/// Maximum characters of an error body kept in messages.
const MAX_ERROR_CHARS: usize = 300;

/// Why a summarizer call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizeError {
    /// Rate limiting, server errors, timeouts, dropped connections.
    #[error("transient summarizer failure: {0}")]
    Transient(String),

    /// The service's usage allowance is exhausted.
    #[error("summarizer quota exhausted: {0}")]
    Quota(String),

    /// Anything else: bad request, auth failure, unusable response.
    #[error("summarizer error: {0}")]
    Other(String),
}

impl SummarizeError {
    /// Only transient failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Reason tag recorded in `failed_sources`.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Transient(_) => FailureReason::Transient,
            Self::Quota(_) => FailureReason::Quota,
            Self::Other(_) => FailureReason::Summarizer,
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// 429 with a quota marker (`insufficient_quota`, `RESOURCE_EXHAUSTED`,
    /// "quota") and 402 are quota exhaustion; other 429s and 5xx are
    /// transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {}", extract_error_message(body));
        let lower = body.to_lowercase();
        let quota_marker = lower.contains("insufficient_quota")
            || lower.contains("resource_exhausted")
            || lower.contains("quota");

        match status {
            429 if quota_marker => Self::Quota(message),
            402 => Self::Quota(message),
            429 | 500..=599 => Self::Transient(message),
            _ => Self::Other(message),
        }
    }

    /// Classify a transport-level failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Other(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Produces a summary of `text`.
///
/// `context` is a hint such as the page title or the original query.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, SummarizeError>;
}

/// User prompt for a summarization request.
pub fn build_prompt(text: &str, context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "Summarize the following content in a few sentences.\nContext: {context}\n\n---\n{text}"
        ),
        None => format!("Summarize the following content in a few sentences.\n\n---\n{text}"),
    }
}

/// Build the configured summarizer client.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if the provider's API key is not set
/// or the HTTP client cannot be built.
pub fn build_summarizer(
    config: &SummarizeConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn Summarizer>, PipelineError> {
    let kind = config.provider;
    let api_key = credentials.summarizer_key(kind).ok_or_else(|| {
        PipelineError::Config(format!(
            "{} summarizer selected but {} is not set",
            kind.name(),
            kind.api_key_var()
        ))
    })?;
    let timeout = Duration::from_secs(config.timeout_seconds);

    let summarizer: Arc<dyn Summarizer> = match kind {
        SummarizerKind::Gemini => Arc::new(GeminiSummarizer::new(
            api_key,
            config.model(),
            config.base_url(),
            timeout,
        )?),
        SummarizerKind::OpenAi | SummarizerKind::OpenRouter | SummarizerKind::DeepSeek => {
            Arc::new(OpenAiCompatibleSummarizer::new(
                kind.name(),
                api_key,
                config.model(),
                config.base_url(),
                timeout,
            )?)
        }
    };
    tracing::debug!(provider = kind.name(), model = config.model(), "summarizer configured");
    Ok(summarizer)
}

/// Pull `error.message` out of a JSON error body, falling back to the
/// (truncated) raw body.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());
    sage_search::content::truncate_chars(&message, MAX_ERROR_CHARS).to_owned()
}
