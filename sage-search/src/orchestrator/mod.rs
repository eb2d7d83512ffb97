//! Search orchestrator: concurrent provider fan-out, round-robin merge, dedup.
//!
//! This module fans out a query to every registered provider concurrently,
//! interleaves their hits in provider priority order, deduplicates by
//! normalised URL, and truncates to the configured candidate cap.

pub mod merge;
pub mod search;
pub mod url_normalize;
