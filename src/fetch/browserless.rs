//! Browserless page fetcher for JavaScript-rendered pages.
//!
//! Posts `{"url": ...}` to a Browserless instance's `/content` endpoint and
//! cleans the fully rendered HTML it returns.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use sage_search::PageContent;

use super::{page_from_html, read_capped_body, FetchError, PageFetcher, MAX_BODY_BYTES};
use crate::error::PipelineError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    timeout: u64,
    wait_until: &'static str,
}

/// Renders pages through Browserless.
pub struct BrowserlessPageFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_body_bytes: usize,
}

impl BrowserlessPageFetcher {
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `base_url` is blank or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, PipelineError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(PipelineError::Config("Browserless URL must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
            token: token.map(String::from),
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Read at most `bytes` of each rendered page.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

impl std::fmt::Debug for BrowserlessPageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserlessPageFetcher")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl PageFetcher for BrowserlessPageFetcher {
    fn name(&self) -> &'static str {
        "browserless"
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageContent, FetchError> {
        let endpoint = format!("{}/content", self.base_url);
        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                timeout: timeout.as_millis() as u64,
                wait_until: "networkidle2",
            },
        };

        let mut request = self.client.post(&endpoint).timeout(timeout).json(&body);
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let message = read_capped_body(response, 1024, timeout).await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %message, "Browserless rejected page");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let html = read_capped_body(response, self.max_body_bytes, timeout).await?;
        page_from_html(&html, url)
    }
}
