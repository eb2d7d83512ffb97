//! DuckDuckGo search provider. Scrapes the HTML endpoint, no API key.
//!
//! Queries go to the JavaScript-free endpoint at
//! `https://html.duckduckgo.com/html/` as a form POST; sponsored results
//! are dropped and redirect links are unwrapped to their targets.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::ProviderClient;
use crate::types::{ProviderHit, SearchProvider};

/// Default DuckDuckGo HTML endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo HTML search scraper.
///
/// Uses a POST request to the HTML-only endpoint which requires no
/// JavaScript.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    config: SearchConfig,
    endpoint: String,
}

impl DuckDuckGoProvider {
    /// Create a provider against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        Self::with_endpoint(config, DEFAULT_ENDPOINT)
    }

    /// Create a provider against a custom endpoint (mirrors, tests).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn with_endpoint(
        config: SearchConfig,
        endpoint: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let client = http::build_search_client(&config)?;
        Ok(Self {
            client,
            config,
            endpoint: endpoint.into(),
        })
    }

    /// Target of a result link.
    ///
    /// Organic links usually point at `//duckduckgo.com/l/?uddg=<encoded>`;
    /// the decoded `uddg` parameter is the real URL. Direct links pass
    /// through unchanged.
    fn extract_url(href: &str) -> Option<String> {
        let full_href = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&full_href).ok()?;

        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(full_href)
        }
    }
}

#[async_trait]
impl ProviderClient for DuckDuckGoProvider {
    fn provider(&self) -> SearchProvider {
        SearchProvider::DuckDuckGo
    }

    async fn query(&self, query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
        tracing::trace!(query, "DuckDuckGo search");
        http::polite_delay(&self.config).await;

        let mut params = vec![("q", query)];
        if self.config.safe_search {
            params.push(("kp", "1"));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&params)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?
            .error_for_status()?;

        let html = response.text().await?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

        parse_duckduckgo_html(&html, limit)
    }
}

/// Organic hits from a results page, in page order, at most `limit`.
pub(crate) fn parse_duckduckgo_html(
    html: &str,
    limit: usize,
) -> Result<Vec<ProviderHit>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut hits = Vec::new();

    for element in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }

        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let Some(url) = title_el
            .value()
            .attr("href")
            .and_then(DuckDuckGoProvider::extract_url)
        else {
            continue;
        };

        let mut hit = ProviderHit::new(url).with_title(title);
        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if !snippet.is_empty() {
            hit = hit.with_snippet(snippet);
        }
        hits.push(hit);
    }

    tracing::debug!(count = hits.len(), "DuckDuckGo results parsed");
    Ok(hits)
}
