//! The research pipeline.
//!
//! A run moves through four stages:
//!
//! 1. **Search**: every provider is queried concurrently and the hits are
//!    merged into an ordered, deduplicated candidate set
//! 2. **Fetch**: candidates are fetched and cleaned by a bounded pool
//! 3. **Summarize**: each page is summarized by a second bounded pool, then
//!    the successful summaries are synthesized into one overall summary
//! 4. **Aggregate**: stage outputs become a [`RunResult`](crate::aggregate::RunResult),
//!    optionally persisted
//!
//! Per-URL failures never abort a run; only validation errors, every
//! provider failing, and cancellation are fatal.

pub mod coordinator;

pub use coordinator::PipelineCoordinator;
