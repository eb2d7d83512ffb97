//! Error types for the sage pipeline.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via
//! [`PipelineError::code()`]. Codes appear in serialized run results and
//! will not change.

use sage_search::SearchError;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Bad run input, rejected before any network activity.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";

    /// One search provider failed; the others carried on.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// Every search provider failed and nothing was found.
    pub const ALL_PROVIDERS_FAILED: &str = "ALL_PROVIDERS_FAILED";

    /// A single page could not be fetched.
    pub const FETCH_ERROR: &str = "FETCH_ERROR";

    /// A summarizer call failed transiently and retries ran out.
    pub const SUMMARIZE_TRANSIENT: &str = "SUMMARIZE_TRANSIENT";

    /// The summarizer reported its usage quota as exhausted.
    pub const QUOTA_EXCEEDED: &str = "QUOTA_EXCEEDED";

    /// The overall summary could not be produced.
    pub const SYNTHESIS_ERROR: &str = "SYNTHESIS_ERROR";

    /// The finished result could not be stored.
    pub const PERSISTENCE_ERROR: &str = "PERSISTENCE_ERROR";

    /// The run was cancelled by the caller.
    pub const CANCELLED: &str = "CANCELLED";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors produced by the pipeline and its stages.
///
/// Only [`Validation`](Self::Validation),
/// [`AllProvidersFailed`](Self::AllProvidersFailed) and
/// [`Cancelled`](Self::Cancelled) end a run early; every other kind is
/// captured into the run result and never escapes its stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Bad run input.
    #[error("[{}] {}", error_codes::VALIDATION_ERROR, .0)]
    Validation(String),

    /// One search provider failed.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    Provider(String),

    /// Every search provider failed.
    #[error("[{}] {}", error_codes::ALL_PROVIDERS_FAILED, .0)]
    AllProvidersFailed(String),

    /// One page could not be fetched.
    #[error("[{}] {}", error_codes::FETCH_ERROR, .0)]
    Fetch(String),

    /// Summarizer retries ran out on a transient failure.
    #[error("[{}] {}", error_codes::SUMMARIZE_TRANSIENT, .0)]
    SummarizeTransient(String),

    /// Summarizer quota exhausted.
    #[error("[{}] {}", error_codes::QUOTA_EXCEEDED, .0)]
    QuotaExceeded(String),

    /// Overall synthesis failed.
    #[error("[{}] {}", error_codes::SYNTHESIS_ERROR, .0)]
    Synthesis(String),

    /// Persisting the result failed.
    #[error("[{}] {}", error_codes::PERSISTENCE_ERROR, .0)]
    Persistence(String),

    /// The run was cancelled.
    #[error("[{}] {}", error_codes::CANCELLED, .0)]
    Cancelled(String),

    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl PipelineError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_ERROR,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
            Self::AllProvidersFailed(_) => error_codes::ALL_PROVIDERS_FAILED,
            Self::Fetch(_) => error_codes::FETCH_ERROR,
            Self::SummarizeTransient(_) => error_codes::SUMMARIZE_TRANSIENT,
            Self::QuotaExceeded(_) => error_codes::QUOTA_EXCEEDED,
            Self::Synthesis(_) => error_codes::SYNTHESIS_ERROR,
            Self::Persistence(_) => error_codes::PERSISTENCE_ERROR,
            Self::Cancelled(_) => error_codes::CANCELLED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Provider(m)
            | Self::AllProvidersFailed(m)
            | Self::Fetch(m)
            | Self::SummarizeTransient(m)
            | Self::QuotaExceeded(m)
            | Self::Synthesis(m)
            | Self::Persistence(m)
            | Self::Cancelled(m)
            | Self::Config(m) => m,
        }
    }

    /// Returns true if retrying the failed call may succeed.
    ///
    /// Quota exhaustion is deliberately not retryable: the allowance will
    /// not come back within a run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(_) | Self::Fetch(_) | Self::SummarizeTransient(_) => true,
            Self::Validation(_)
            | Self::AllProvidersFailed(_)
            | Self::QuotaExceeded(_)
            | Self::Synthesis(_)
            | Self::Persistence(_)
            | Self::Cancelled(_)
            | Self::Config(_) => false,
        }
    }

    /// Returns true if this error ends the run with `status = "error"`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AllProvidersFailed(_) | Self::Cancelled(_) | Self::Config(_)
        )
    }
}

impl From<SearchError> for PipelineError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::AllProvidersFailed(m) => Self::AllProvidersFailed(m),
            SearchError::Cancelled(m) => Self::Cancelled(m),
            SearchError::Config(m) => Self::Config(m),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Convenience alias for pipeline results.
pub type Result<T> = std::result::Result<T, PipelineError>;
