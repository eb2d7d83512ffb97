//! Sage: multi-provider web research pipeline.
//!
//! A query fans out to several search providers, the merged and
//! deduplicated URLs are fetched and cleaned, every page is summarized, and
//! the summaries are synthesized into one overall answer:
//!
//! Query → Search (providers) → Fetch (pool) → Summarize (pool) → Synthesize → Result
//!
//! # Architecture
//!
//! - **Search**: [`sage_search::SearchOrchestrator`] queries providers
//!   concurrently and merges hits round-robin in priority order
//! - **Fetch**: [`fetch::FetchCoordinator`] runs a [`fetch::PageFetcher`]
//!   (plain HTTP or Browserless) over the candidates with a bounded pool
//! - **Summarize**: [`summarize::SummarizationStage`] drives a
//!   [`summarize::Summarizer`] (Gemini or an OpenAI-compatible API)
//! - **Aggregate**: [`aggregate::ResultAggregator`] builds the
//!   [`aggregate::RunResult`] and hands it to an optional
//!   [`persist::PersistenceSink`]
//!
//! [`PipelineCoordinator`] wires the stages together. A run always returns
//! a result: per-URL failures are recorded in `failed_sources`, and only
//! fatal conditions produce status `error`.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod persist;
pub mod pipeline;
pub mod pool;
pub mod summarize;

pub use aggregate::{RunResult, RunStatus};
pub use config::{Credentials, RunConfig, RunRequest, SageConfig};
pub use error::{PipelineError, Result};
pub use pipeline::PipelineCoordinator;
