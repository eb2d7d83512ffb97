//! Page fetching: the [`PageFetcher`] contract, its HTTP and Browserless
//! implementations, and the bounded [`FetchCoordinator`].

pub mod browserless;
pub mod coordinator;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use sage_search::content::clean_html;
use sage_search::{PageContent, SearchProvider};

use crate::aggregate::FailureReason;

pub use browserless::BrowserlessPageFetcher;
pub use coordinator::{FetchCoordinator, FetchOutcome};
pub use http::HttpPageFetcher;

/// Why one page could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The page loaded but nothing readable was left after cleaning.
    #[error("no extractable content")]
    EmptyContent,
}

impl FetchError {
    /// Reason tag recorded in `failed_sources`.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::InvalidUrl(_) => FailureReason::InvalidUrl,
            Self::Timeout(_) => FailureReason::Timeout,
            Self::Transport(_) => FailureReason::Transport,
            Self::HttpStatus(_) => FailureReason::HttpStatus,
            Self::EmptyContent => FailureReason::EmptyContent,
        }
    }

    /// Timeouts, transport errors, 429 and 5xx may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::HttpStatus(status) => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) | Self::EmptyContent => false,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout.as_secs())
        } else if let Some(status) = err.status() {
            Self::HttpStatus(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Retrieves one page and returns its title and cleaned text.
///
/// Implementations must honour `timeout`; the coordinator also enforces it
/// from the outside.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageContent, FetchError>;
}

/// A page that was fetched and cleaned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    /// First `preview_chars` characters of `full_content`.
    pub content_preview: String,
    /// Cleaned text, silently capped at `max_content_chars`.
    pub full_content: String,
    pub source_provider: SearchProvider,
}

/// Bytes of response body read per page before the rest is dropped.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Read at most `limit` bytes of body, decoding them as lossy UTF-8.
///
/// The body is streamed, so an oversized page never sits in memory whole.
pub(crate) async fn read_capped_body(
    mut response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<String, FetchError> {
    let expected = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut body = Vec::with_capacity(expected.min(limit));
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::from_reqwest(&e, timeout))?
    {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            tracing::debug!(limit, "response body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Clean raw HTML into page content; empty results are a fetch failure.
pub(crate) fn page_from_html(html: &str, url: &str) -> Result<PageContent, FetchError> {
    clean_html(html, url, usize::MAX).map_err(|_| FetchError::EmptyContent)
}
