//! Result aggregation: the final, serializable record of a run.
//!
//! [`ResultAggregator`] folds the outputs of every stage into one
//! [`RunResult`], decides the run status and optionally hands the result to
//! a [`PersistenceSink`]. Every path through the pipeline ends here, fatal
//! ones included, so callers always receive a well-formed result.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use sage_search::CandidateUrl;

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::persist::PersistenceSink;

/// Timestamp format of [`RunResult::timestamp`] (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every candidate made it through fetch and summarize, and the overall
    /// summary was produced.
    Success,
    /// At least one page was fetched, but something downstream failed.
    Partial,
    /// Nothing usable: no candidates, no fetched page, a fatal error or a
    /// cancelled run.
    Error,
}

/// Pipeline stage a source failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Search,
    Fetch,
    Summarize,
}

/// Failure reason tag recorded for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidUrl,
    Timeout,
    Transport,
    HttpStatus,
    EmptyContent,
    Quota,
    Transient,
    Summarizer,
    Cancelled,
    Internal,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::EmptyContent => "empty_content",
            Self::Quota => "quota",
            Self::Transient => "transient",
            Self::Summarizer => "summarizer",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source that did not make it through the pipeline.
///
/// Serialized as `{url, scraped: false, stage, error, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSource {
    pub url: String,
    pub stage: Stage,
    pub reason: FailureReason,
    /// Human-readable cause, when one is known.
    pub detail: Option<String>,
    /// Title of the page, kept when fetching succeeded.
    pub title: Option<String>,
    /// Preview of the fetched content, kept when fetching succeeded.
    pub content_preview: Option<String>,
}

impl FailedSource {
    pub fn new(url: impl Into<String>, stage: Stage, reason: FailureReason) -> Self {
        Self {
            url: url.into(),
            stage,
            reason,
            detail: None,
            title: None,
            content_preview: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Keep what was fetched for a page that failed later.
    pub fn with_page(mut self, title: impl Into<String>, content_preview: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self.content_preview = Some(content_preview.into());
        self
    }
}

impl Serialize for FailedSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FailedSource", 7)?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("scraped", &false)?;
        state.serialize_field("stage", &self.stage)?;
        state.serialize_field("error", &self.reason)?;
        if let Some(detail) = &self.detail {
            state.serialize_field("detail", detail)?;
        }
        if let Some(title) = &self.title {
            state.serialize_field("title", title)?;
        }
        if let Some(preview) = &self.content_preview {
            state.serialize_field("content_preview", preview)?;
        }
        state.end()
    }
}

/// Outcome of summarizing one fetched page.
///
/// Only summaries with `succeeded == true` appear in [`RunResult::sources`];
/// the rest become [`FailedSource`]s with stage `summarize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub url: String,
    pub title: String,
    pub content_preview: String,
    pub individual_summary: String,
    #[serde(rename = "scraped")]
    pub succeeded: bool,
    #[serde(skip)]
    pub failure: Option<FailureReason>,
    #[serde(skip)]
    pub detail: Option<String>,
    /// Position of the page in fetch-completion order.
    #[serde(skip)]
    pub fetch_rank: usize,
}

/// Result of the overall synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    Completed(String),
    /// The call failed after retries.
    Failed(String),
    /// No call was made: nothing to synthesize, quota exhausted or the run
    /// was cancelled.
    Skipped(String),
}

impl Synthesis {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Fatal error attached to a result with `status = "error"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

impl From<&PipelineError> for RunError {
    fn from(err: &PipelineError) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.message().to_owned(),
        }
    }
}

/// Run-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetadata {
    /// Raw hits returned by each provider, before deduplication.
    pub provider_counts: BTreeMap<String, usize>,
    pub total_unique_urls: usize,
    /// `successfully_scraped / total_sources_found`, 0 when nothing was found.
    pub success_rate: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_errors: BTreeMap<String, String>,
    /// Non-fatal problems, such as a failed save.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Final result of a run. Built once, never mutated by the pipeline after
/// it is returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub query: String,
    pub timestamp: String,
    pub total_sources_found: usize,
    pub successfully_scraped: usize,
    pub sources: Vec<SourceSummary>,
    pub failed_sources: Vec<FailedSource>,
    pub overall_summary: String,
    pub metadata: RunMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RunResult {
    /// An empty `error` result for a run that ended before producing
    /// anything.
    pub fn failed(query: impl Into<String>, err: &PipelineError) -> Self {
        Self {
            status: RunStatus::Error,
            query: query.into(),
            timestamp: now_timestamp(),
            total_sources_found: 0,
            successfully_scraped: 0,
            sources: Vec::new(),
            failed_sources: Vec::new(),
            overall_summary: String::new(),
            metadata: RunMetadata::default(),
            saved_file: None,
            error: Some(err.into()),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Everything the stages produced, handed to the aggregator in one piece.
#[derive(Debug, Clone)]
pub struct StageResults {
    /// Deduplicated candidates in merge order.
    pub candidates: Vec<CandidateUrl>,
    pub provider_counts: BTreeMap<String, usize>,
    pub provider_errors: BTreeMap<String, String>,
    /// Number of pages the fetch stage delivered.
    pub pages_fetched: usize,
    /// Candidates that failed (or were never attempted) in the fetch stage.
    pub failed_fetches: Vec<FailedSource>,
    /// One entry per fetched page, in completion order.
    pub summaries: Vec<SourceSummary>,
    pub synthesis: Synthesis,
    /// The run was cancelled before finishing.
    pub cancelled: bool,
}

/// Assembles [`RunResult`]s and hands them to the persistence sink.
#[derive(Clone, Default)]
pub struct ResultAggregator {
    sink: Option<Arc<dyn PersistenceSink>>,
}

impl ResultAggregator {
    pub fn new(sink: Option<Arc<dyn PersistenceSink>>) -> Self {
        Self { sink }
    }

    /// Fold stage outputs into a result and decide its status.
    pub fn aggregate(&self, run: &RunConfig, stages: StageResults) -> RunResult {
        let total = stages.candidates.len();

        let mut sources = Vec::with_capacity(stages.summaries.len());
        let mut failed_sources = stages.failed_fetches;
        for summary in stages.summaries {
            if summary.succeeded {
                sources.push(summary);
                continue;
            }
            let reason = summary.failure.unwrap_or(FailureReason::Summarizer);
            let mut failed = FailedSource::new(summary.url, Stage::Summarize, reason)
                .with_page(summary.title, summary.content_preview);
            failed.detail = summary.detail;
            failed_sources.push(failed);
        }

        let (overall_summary, synthesis_ok) = match stages.synthesis {
            Synthesis::Completed(text) => (text, true),
            Synthesis::Failed(_) | Synthesis::Skipped(_) => (String::new(), false),
        };

        let mut notes = Vec::new();
        let (status, error) = if stages.cancelled {
            let err = PipelineError::Cancelled("run cancelled before completion".into());
            (RunStatus::Error, Some(RunError::from(&err)))
        } else if total == 0 {
            notes.push("no candidate URLs were found".to_owned());
            (RunStatus::Error, None)
        } else if stages.pages_fetched == 0 {
            notes.push("no page could be fetched".to_owned());
            (RunStatus::Error, None)
        } else if sources.len() < total || !synthesis_ok {
            (RunStatus::Partial, None)
        } else {
            (RunStatus::Success, None)
        };

        let successfully_scraped = sources.len();
        let success_rate = if total == 0 {
            0.0
        } else {
            successfully_scraped as f64 / total as f64
        };

        tracing::info!(
            status = ?status,
            total,
            succeeded = successfully_scraped,
            failed = failed_sources.len(),
            "run aggregated"
        );

        RunResult {
            status,
            query: run.query().to_owned(),
            timestamp: now_timestamp(),
            total_sources_found: total,
            successfully_scraped,
            sources,
            failed_sources,
            overall_summary,
            metadata: RunMetadata {
                provider_counts: stages.provider_counts,
                total_unique_urls: total,
                success_rate,
                provider_errors: stages.provider_errors,
                notes,
            },
            saved_file: None,
            error,
        }
    }

    /// Store `result` if the run asked for it.
    ///
    /// A failed save is recorded as a metadata note; the status is never
    /// changed.
    pub async fn persist(&self, run: &RunConfig, mut result: RunResult) -> RunResult {
        if !run.persist() {
            return result;
        }
        let Some(sink) = &self.sink else {
            result
                .metadata
                .notes
                .push("persistence requested but no sink is configured".to_owned());
            return result;
        };

        match sink.store(&result).await {
            Ok(saved) => {
                tracing::info!(file = %saved, "run result saved");
                result.saved_file = Some(saved);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save run result");
                result.metadata.notes.push(e.to_string());
            }
        }
        result
    }

    /// [`aggregate`](Self::aggregate) followed by [`persist`](Self::persist).
    pub async fn finish(&self, run: &RunConfig, stages: StageResults) -> RunResult {
        let result = self.aggregate(run, stages);
        self.persist(run, result).await
    }
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
