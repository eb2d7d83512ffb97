//! # sage-search
//!
//! Multi-provider web search, URL deduplication and page cleaning for sage.
//!
//! ## Design
//!
//! - Providers implement [`ProviderClient`]; DuckDuckGo (HTML scraping) and
//!   Serper (JSON API) ship with the crate
//! - [`SearchOrchestrator`] queries every provider concurrently, each under
//!   its own timeout and [`RetryPolicy`], and merges results round-robin in
//!   priority order with first-seen deduplication by normalised URL
//! - A failing provider degrades to an empty list; only a run where every
//!   provider fails with nothing found is an error
//! - [`content::clean_html`] turns fetched HTML into bounded readable text
//! - [`retry_with_policy`] is the shared retry loop used by every stage of
//!   the pipeline
//!
//! ## Security
//!
//! - API keys are never logged and are hidden from `Debug` output
//! - Search queries are logged only at trace level

pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod types;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use orchestrator::search::{SearchOrchestrator, SearchOutcome};
pub use provider::ProviderClient;
pub use retry::{retry_with_policy, RetryError, RetryPolicy};
pub use types::{CandidateUrl, PageContent, ProviderHit, SearchProvider};
