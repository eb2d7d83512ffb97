//! Summarizer over the OpenAI Chat Completions API.
//!
//! OpenRouter and DeepSeek expose the same wire format, so one client
//! serves all three; only the base URL, model and key differ.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_prompt, SummarizeError, Summarizer, SYSTEM_PROMPT};
use crate::error::PipelineError;

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiCompatibleSummarizer {
    name: String,
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCompatibleSummarizer {
    /// `base_url` is the API root including the version, e.g.
    /// `https://api.openai.com/v1`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn request_body(&self, text: &str, context: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(text, context)},
            ],
            "temperature": 0.3,
        })
    }
}

impl std::fmt::Debug for OpenAiCompatibleSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleSummarizer")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl Summarizer for OpenAiCompatibleSummarizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, SummarizeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "sage")
            .json(&self.request_body(text, context))
            .send()
            .await
            .map_err(|e| SummarizeError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::from_status(status.as_u16(), &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Other(format!("unreadable completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SummarizeError::Other("completion had no content".into()))
    }
}
