//! Core types for provider hits, candidate URLs and provider identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single hit returned by a search provider, before deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHit {
    /// The URL of the result page, as reported by the provider.
    pub url: String,
    /// The title of the result page, if the provider supplied one.
    pub title: Option<String>,
    /// A text snippet describing the page, if the provider supplied one.
    pub snippet: Option<String>,
}

impl ProviderHit {
    /// Create a hit with only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
        }
    }

    /// Attach a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach a snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// A deduplicated URL eligible for fetching.
///
/// Created by the search orchestrator; the first provider (in merge order)
/// to report the URL owns it and its title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateUrl {
    /// Normalised absolute URL.
    pub url: String,
    /// Title reported by the originating provider.
    pub provider_title: Option<String>,
    /// Which provider first reported this URL.
    pub source_provider: SearchProvider,
}

/// Search providers that sage can query.
///
/// Serialises as its [`name`](Self::name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SearchProvider {
    /// DuckDuckGo HTML endpoint. No key required.
    DuckDuckGo,
    /// Serper Google Search API. Requires an API key.
    Serper,
    /// A provider registered by the embedding application.
    Custom(&'static str),
}

impl SearchProvider {
    /// Returns the stable identifier of this provider.
    ///
    /// Used as the key in per-provider metadata maps.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Serper => "serper",
            Self::Custom(name) => name,
        }
    }
}

impl Serialize for SearchProvider {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracted readable content from a fetched web page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    /// The URL that was fetched.
    pub url: String,
    /// The page title extracted from HTML.
    pub title: String,
    /// Cleaned, readable text content with HTML boilerplate stripped.
    pub text: String,
    /// Number of words in the extracted text.
    pub word_count: usize,
}
