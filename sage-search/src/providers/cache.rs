//! In-memory result cache layered over any provider.
//!
//! A single run never needs this; it exists for callers that issue many
//! runs from one process and want to avoid re-querying a provider for the
//! same question. Uses [`moka`] for async-friendly caching with TTL and
//! automatic eviction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::error::SearchError;
use crate::provider::ProviderClient;
use crate::types::{ProviderHit, SearchProvider};

/// Maximum number of cached hit lists per provider.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Composite cache key: normalised query + requested limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed query string.
    query: String,
    /// Requested result limit.
    limit: usize,
}

impl CacheKey {
    /// Build a deterministic cache key from a query and a limit.
    ///
    /// The query is lowercased and trimmed.
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            limit,
        }
    }
}

/// Caching decorator for a [`ProviderClient`].
///
/// Only successful responses are cached; failures always reach the inner
/// provider again on the next call.
pub struct CachedProvider {
    inner: Arc<dyn ProviderClient>,
    cache: Cache<CacheKey, Vec<ProviderHit>>,
}

impl CachedProvider {
    /// Wrap `inner`, caching results for `ttl`.
    pub fn new(inner: Arc<dyn ProviderClient>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Number of entries currently held (approximate, see [`Cache::entry_count`]).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl ProviderClient for CachedProvider {
    fn provider(&self) -> SearchProvider {
        self.inner.provider()
    }

    async fn query(&self, query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
        let key = CacheKey::new(query, limit);
        if let Some(hits) = self.cache.get(&key).await {
            tracing::trace!(provider = %self.inner.provider(), "provider cache hit");
            return Ok(hits);
        }

        let hits = self.inner.query(query, limit).await?;
        self.cache.insert(key, hits.clone()).await;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl ProviderClient for CountingProvider {
        fn provider(&self) -> SearchProvider {
            SearchProvider::Custom("counting")
        }

        async fn query(&self, _query: &str, _limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SearchError::Http("down".into()));
            }
            Ok(vec![ProviderHit::new("https://cached.example.com")])
        }
    }

    fn counting(fail: bool) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail,
        })
    }

    #[test]
    fn cache_key_normalises_query_case_and_whitespace() {
        assert_eq!(CacheKey::new("  RUST Programming ", 5), CacheKey::new("rust programming", 5));
    }

    #[test]
    fn cache_key_differs_when_limit_differs() {
        assert_ne!(CacheKey::new("rust", 5), CacheKey::new("rust", 10));
    }

    #[tokio::test]
    async fn second_identical_query_is_served_from_cache() {
        let inner = counting(false);
        let cached = CachedProvider::new(inner.clone(), Duration::from_secs(60));

        let first = cached.query("Rust", 5).await.expect("first");
        let second = cached.query("rust ", 5).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.provider(), SearchProvider::Custom("counting"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let inner = counting(true);
        let cached = CachedProvider::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.query("rust", 5).await.is_err());
        assert!(cached.query("rust", 5).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
