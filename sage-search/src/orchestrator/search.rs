//! Core search orchestrator: concurrent multi-provider fan-out and merge.
//!
//! Queries all registered providers concurrently, each under its own
//! timeout and retry policy, then interleaves the results round-robin in
//! registration (priority) order, deduplicates by normalised URL and
//! truncates to the requested maximum.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::provider::ProviderClient;
use crate::retry::{retry_with_policy, RetryError};
use crate::types::{CandidateUrl, ProviderHit, SearchProvider};

use super::merge::merge_round_robin;

/// What the search stage produced.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Deduplicated candidates in deterministic merge order.
    pub candidates: Vec<CandidateUrl>,
    /// Raw hit count per provider, zero for failed providers.
    pub provider_counts: BTreeMap<String, usize>,
    /// Failure message per provider that did not answer.
    pub provider_errors: BTreeMap<String, String>,
    /// Hits dropped because they were not fetchable URLs.
    pub rejected_urls: usize,
    /// True if the cancellation token fired while providers were running.
    pub cancelled: bool,
}

/// Fans a query out to a fixed, ordered set of providers.
///
/// Registration order is priority order for the round-robin merge.
pub struct SearchOrchestrator {
    providers: Vec<Arc<dyn ProviderClient>>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    /// Create an orchestrator over `providers` in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if no provider is given or the
    /// configuration is invalid.
    pub fn new(
        providers: Vec<Arc<dyn ProviderClient>>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        if providers.is_empty() {
            return Err(SearchError::Config(
                "at least one search provider must be registered".into(),
            ));
        }
        config.validate()?;
        Ok(Self { providers, config })
    }

    /// Providers in priority order.
    pub fn providers(&self) -> Vec<SearchProvider> {
        self.providers.iter().map(|p| p.provider()).collect()
    }

    /// Orchestrate a concurrent search across all registered providers.
    ///
    /// # Pipeline
    ///
    /// 1. Fan out `query` with `max_results` to every provider concurrently
    ///    with [`futures::future::join_all`]
    /// 2. Apply the per-provider timeout and retry policy to each call
    /// 3. Log per-provider errors at warn level; a failed provider
    ///    contributes an empty list
    /// 4. Merge round-robin, deduplicate by normalised URL
    /// 5. Truncate to `max_urls`
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::AllProvidersFailed`] only if **every** provider
    /// fails and no candidate was produced. Cancellation is not an error:
    /// the outcome is returned with `cancelled` set and whatever finished.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        max_urls: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        tracing::trace!(query, max_results, max_urls, "search fan-out");

        let futures: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                async move {
                    let result = self.query_provider(provider.as_ref(), query, max_results, cancel).await;
                    (provider.provider(), result)
                }
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;

        let mut outcome = SearchOutcome::default();
        let mut lists: Vec<(SearchProvider, Vec<ProviderHit>)> = Vec::with_capacity(outcomes.len());
        let mut failures = 0usize;

        for (provider, result) in outcomes {
            match result {
                Ok(hits) => {
                    tracing::debug!(%provider, count = hits.len(), "provider returned results");
                    *outcome.provider_counts.entry(provider.name().to_string()).or_default() +=
                        hits.len();
                    lists.push((provider, hits));
                }
                Err(err) => {
                    if matches!(err, SearchError::Cancelled(_)) {
                        outcome.cancelled = true;
                    } else {
                        failures += 1;
                        tracing::warn!(%provider, error = %err, "provider query failed");
                    }
                    outcome.provider_counts.entry(provider.name().to_string()).or_default();
                    outcome
                        .provider_errors
                        .insert(provider.name().to_string(), err.to_string());
                    lists.push((provider, Vec::new()));
                }
            }
        }

        let merged = merge_round_robin(&lists, max_urls);
        outcome.candidates = merged.candidates;
        outcome.rejected_urls = merged.rejected;

        if !outcome.cancelled && failures == self.providers.len() && outcome.candidates.is_empty() {
            let summary = outcome
                .provider_errors
                .iter()
                .map(|(name, err)| format!("{name}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SearchError::AllProvidersFailed(summary));
        }

        tracing::debug!(
            candidates = outcome.candidates.len(),
            duplicates = merged.duplicates,
            rejected = outcome.rejected_urls,
            "search merged"
        );
        Ok(outcome)
    }

    /// Query one provider under the configured timeout and retry policy.
    async fn query_provider(
        &self,
        provider: &dyn ProviderClient,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProviderHit>, SearchError> {
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let result = retry_with_policy(
            &self.config.retry,
            cancel,
            SearchError::is_retryable,
            move |_attempt| async move {
                match tokio::time::timeout(timeout, provider.query(query, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(SearchError::Timeout(format!(
                        "{} did not answer within {}s",
                        provider.provider(),
                        timeout.as_secs()
                    ))),
                }
            },
        )
        .await;

        match result {
            Ok(hits) => Ok(hits),
            Err(RetryError::Cancelled) => Err(SearchError::Cancelled(format!(
                "{} query abandoned",
                provider.provider()
            ))),
            Err(RetryError::Failed { error, .. }) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProvider {
        id: &'static str,
        urls: Vec<&'static str>,
        fail: bool,
        delay: Duration,
        calls: AtomicU32,
    }

    impl FakeProvider {
        fn ok(id: &'static str, urls: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                id,
                urls,
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            })
        }

        fn failing(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                urls: vec![],
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            })
        }

        fn slow(id: &'static str, urls: Vec<&'static str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                urls,
                fail: false,
                delay,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        fn provider(&self) -> SearchProvider {
            SearchProvider::Custom(self.id)
        }

        async fn query(&self, _query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SearchError::Http(format!("{} unreachable", self.id)));
            }
            Ok(self.urls.iter().take(limit).map(|u| ProviderHit::new(*u)).collect())
        }
    }

    fn test_config() -> SearchConfig {
        SearchConfig {
            timeout_seconds: 1,
            request_delay_ms: (0, 0),
            retry: RetryPolicy::new()
                .with_max_retries(1)
                .with_base_delay_ms(1)
                .with_max_delay_ms(2),
            ..Default::default()
        }
    }

    fn orchestrator(providers: Vec<Arc<dyn ProviderClient>>) -> SearchOrchestrator {
        SearchOrchestrator::new(providers, test_config()).expect("valid orchestrator")
    }

    #[test]
    fn empty_provider_list_rejected() {
        let err = SearchOrchestrator::new(vec![], test_config()).err().expect("should fail");
        assert!(err.to_string().contains("provider"));
    }

    #[tokio::test]
    async fn one_failing_provider_degrades_to_empty() {
        let good = FakeProvider::ok("good", vec!["https://a.com/1", "https://a.com/2"]);
        let bad = FakeProvider::failing("bad");
        let orch = orchestrator(vec![good, bad.clone()]);

        let outcome = orch
            .search("q", 5, 8, &CancellationToken::new())
            .await
            .expect("partial success");
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.provider_counts["good"], 2);
        assert_eq!(outcome.provider_counts["bad"], 0);
        assert!(outcome.provider_errors["bad"].contains("unreachable"));
        // Transport errors are retried once.
        assert_eq!(bad.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_providers_failing_is_an_error() {
        let orch = orchestrator(vec![FakeProvider::failing("x"), FakeProvider::failing("y")]);
        let err = orch
            .search("q", 5, 8, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::AllProvidersFailed(_)));
        assert!(err.to_string().contains("x:"));
        assert!(err.to_string().contains("y:"));
    }

    #[tokio::test]
    async fn providers_answering_empty_is_not_an_error() {
        let orch = orchestrator(vec![FakeProvider::ok("x", vec![]), FakeProvider::failing("y")]);
        let outcome = orch
            .search("q", 5, 8, &CancellationToken::new())
            .await
            .expect("empty is fine");
        assert!(outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn merge_order_ignores_response_latency() {
        let slow = FakeProvider::slow(
            "slow",
            vec!["https://slow.com/1", "https://slow.com/2"],
            Duration::from_millis(50),
        );
        let fast = FakeProvider::ok("fast", vec!["https://fast.com/1", "https://fast.com/2"]);
        let orch = orchestrator(vec![slow, fast]);

        let outcome = orch
            .search("q", 5, 8, &CancellationToken::new())
            .await
            .expect("search");
        let urls: Vec<&str> = outcome.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://slow.com/1",
                "https://fast.com/1",
                "https://slow.com/2",
                "https://fast.com/2"
            ]
        );
    }

    #[tokio::test]
    async fn slow_provider_times_out_without_blocking_others() {
        let stuck = FakeProvider::slow("stuck", vec!["https://stuck.com/"], Duration::from_secs(5));
        let fast = FakeProvider::ok("fast", vec!["https://fast.com/"]);
        let config = SearchConfig {
            retry: RetryPolicy::no_retry(),
            ..test_config()
        };
        let orch = SearchOrchestrator::new(vec![stuck, fast], config).expect("orch");

        let outcome = orch
            .search("q", 5, 8, &CancellationToken::new())
            .await
            .expect("search");
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.provider_errors["stuck"].contains("timed out"));
    }

    #[tokio::test]
    async fn cap_is_respected() {
        let a = FakeProvider::ok("a", vec!["https://1.com/", "https://2.com/", "https://3.com/"]);
        let b = FakeProvider::ok("b", vec!["https://4.com/", "https://5.com/", "https://6.com/"]);
        let outcome = orchestrator(vec![a, b])
            .search("q", 3, 2, &CancellationToken::new())
            .await
            .expect("search");
        assert_eq!(outcome.candidates.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_returns_outcome_flagged() {
        let stuck = FakeProvider::slow("stuck", vec!["https://stuck.com/"], Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let config = SearchConfig {
            timeout_seconds: 30,
            ..test_config()
        };
        let orch = SearchOrchestrator::new(vec![stuck], config).expect("orch");
        let outcome = orch.search("q", 5, 8, &cancel).await.expect("not an error");
        assert!(outcome.cancelled);
        assert!(outcome.candidates.is_empty());
    }
}
