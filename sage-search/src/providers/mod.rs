//! Search provider implementations.
//!
//! Each module provides a struct implementing [`crate::provider::ProviderClient`]
//! for one search service, plus a caching decorator usable with any of them.

pub mod cache;
pub mod duckduckgo;
pub mod serper;

pub use cache::CachedProvider;
pub use duckduckgo::DuckDuckGoProvider;
pub use serper::SerperProvider;
