//! Settings for the search stage.
//!
//! [`SearchConfig`] holds what every provider shares: the per-call timeout,
//! retry policy, optional result caching and request pacing. Which
//! providers run, and in what priority, is decided by the
//! [`SearchOrchestrator`](crate::orchestrator::search::SearchOrchestrator)
//! they are registered with.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::retry::RetryPolicy;

/// Shared provider settings. Every field has a default, so a partial
/// `[search]` table is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-provider request timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering from providers that support it.
    pub safe_search: bool,
    /// How long a [`CachedProvider`](crate::providers::CachedProvider) keeps
    /// results, in seconds. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Random delay range in milliseconds `(min, max)` applied before each
    /// scraped request, spreading load over time.
    pub request_delay_ms: (u64, u64),
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Retry behaviour for failed provider calls.
    pub retry: RetryPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            safe_search: true,
            cache_ttl_seconds: 0,
            request_delay_ms: (0, 250),
            user_agent: None,
            retry: RetryPolicy::default().with_max_retries(1),
        }
    }
}

impl SearchConfig {
    /// Reject settings the orchestrator cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for a zero timeout, an inverted delay
    /// range, an inverted retry delay range or jitter outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(SearchError::Config(
                "retry base_delay_ms must be <= max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(SearchError::Config(
                "retry jitter must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_retry_once_without_cache() {
        let config = SearchConfig::default();
        assert_eq!(config.timeout_seconds, 15);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.cache_ttl_seconds, 0);
        assert_eq!(config.request_delay_ms, (0, 250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_settings() {
        let cases = [
            (
                SearchConfig {
                    timeout_seconds: 0,
                    ..Default::default()
                },
                "timeout_seconds",
            ),
            (
                SearchConfig {
                    request_delay_ms: (500, 100),
                    ..Default::default()
                },
                "request_delay_ms",
            ),
            (
                SearchConfig {
                    retry: RetryPolicy::default().with_base_delay_ms(9_000),
                    ..Default::default()
                },
                "base_delay_ms",
            ),
            (
                SearchConfig {
                    retry: RetryPolicy::default().with_jitter(1.5),
                    ..Default::default()
                },
                "jitter",
            ),
        ];
        for (config, field) in cases {
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{err} should mention {field}");
        }
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config: SearchConfig = serde_json::from_str(
            r#"{"timeout_seconds": 5, "retry": {"max_retries": 0}}"#,
        )
        .expect("deserialize");
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!(config.safe_search);
    }
}
