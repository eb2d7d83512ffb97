//! Serper provider: Google results through the Serper JSON API.
//!
//! Requires an API key. Organic results are returned in Google's order;
//! knowledge-graph and "people also ask" blocks are ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::ProviderClient;
use crate::types::{ProviderHit, SearchProvider};

/// Default Serper search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

/// Serper accepts at most this many results per request.
const MAX_NUM: usize = 100;

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    link: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

/// Serper.dev search API client.
pub struct SerperProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperProvider {
    /// Create a provider against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `api_key` is blank, or
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self, SearchError> {
        Self::with_endpoint(config, api_key, DEFAULT_ENDPOINT)
    }

    /// Create a provider against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_endpoint(
        config: &SearchConfig,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::Config("Serper API key must not be empty".into()));
        }
        Ok(Self {
            client: http::build_search_client(config)?,
            api_key,
            endpoint: endpoint.into(),
        })
    }
}

impl std::fmt::Debug for SerperProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProviderClient for SerperProvider {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Serper
    }

    async fn query(&self, query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
        tracing::trace!(query, "Serper search");

        let body = SerperRequest {
            q: query,
            num: limit.clamp(1, MAX_NUM),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                message: truncate_message(&message),
            });
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Serper response: {e}")))?;

        let hits: Vec<ProviderHit> = parsed
            .organic
            .into_iter()
            .filter(|o| !o.link.trim().is_empty())
            .take(limit)
            .map(|o| ProviderHit {
                url: o.link,
                title: o.title.filter(|t| !t.trim().is_empty()),
                snippet: o.snippet.filter(|s| !s.trim().is_empty()),
            })
            .collect();

        tracing::debug!(count = hits.len(), "Serper results parsed");
        Ok(hits)
    }
}

fn truncate_message(body: &str) -> String {
    body.chars().take(200).collect()
}
