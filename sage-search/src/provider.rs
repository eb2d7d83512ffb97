//! Trait definition for pluggable search providers.
//!
//! Each provider (DuckDuckGo, Serper, or one supplied by the embedding
//! application) implements [`ProviderClient`] to provide a uniform
//! interface for querying and parsing results.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{ProviderHit, SearchProvider};

/// A pluggable search provider backend.
///
/// Implementors query one search service and return its hits in the
/// provider's own order. Each provider handles its own:
///
/// - request construction and query encoding
/// - HTTP request with appropriate headers and credentials
/// - response parsing
/// - mapping of rate limiting, bot detection or parse failures to
///   [`SearchError`]
///
/// Timeouts, retries and cancellation are applied by the orchestrator, not
/// by implementations. All implementations must be `Send + Sync` for
/// concurrent provider queries.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns which provider this client represents.
    fn provider(&self) -> SearchProvider;

    /// Query the provider and return at most `limit` hits.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails, the response cannot be
    /// parsed, or the provider is rate-limiting/blocking requests.
    async fn query(&self, query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError>;
}
