//! Error types for the sage-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.

/// Errors that can occur while searching, fetching or cleaning pages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// Every configured provider failed and no candidates were produced.
    #[error("all search providers failed: {0}")]
    AllProvidersFailed(String),

    /// A provider or page request did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}: {message}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Short description or response body excerpt.
        message: String,
    },

    /// Failed to parse a provider response or page HTML.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The operation was abandoned because the run was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl SearchError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Transport failures, timeouts, rate limits (429) and server errors
    /// (5xx) are transient. Parse, configuration and cancellation errors
    /// are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::AllProvidersFailed(_)
            | Self::Parse(_)
            | Self::Config(_)
            | Self::Cancelled(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Convenience type alias for sage-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
