//! Summarization stage: one summary per fetched page, then one synthesis.
//!
//! Pages are summarized by a bounded pool. Transient failures are retried
//! with backoff; quota exhaustion is not. The first quota signal in a run
//! trips a shared flag: pages not yet summarized are failed with reason
//! `quota` without calling the summarizer, in-flight retries stop, and the
//! synthesis is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sage_search::{retry_with_policy, RetryError};

use super::{SummarizeError, Summarizer};
use crate::aggregate::{FailureReason, SourceSummary, Synthesis};
use crate::config::SummarizeConfig;
use crate::fetch::FetchedPage;
use crate::pool::run_pool;

/// What the per-page pass produced.
#[derive(Debug, Clone, Default)]
pub struct SummaryOutcome {
    /// One entry per page, in summarize-completion order. Each entry keeps
    /// its page's fetch rank.
    pub summaries: Vec<SourceSummary>,
    /// The summarizer signalled quota exhaustion during this run.
    pub quota_exhausted: bool,
    /// The run was cancelled while summarizing.
    pub cancelled: bool,
}

/// Drives a [`Summarizer`] over fetched pages.
pub struct SummarizationStage {
    summarizer: Arc<dyn Summarizer>,
    config: Arc<SummarizeConfig>,
}

impl SummarizationStage {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: SummarizeConfig) -> Self {
        Self {
            summarizer,
            config: Arc::new(config),
        }
    }

    /// Summarize every page independently.
    pub async fn summarize_all(&self, pages: Vec<FetchedPage>, cancel: &CancellationToken) -> SummaryOutcome {
        if pages.is_empty() {
            return SummaryOutcome::default();
        }
        tracing::debug!(
            summarizer = self.summarizer.name(),
            count = pages.len(),
            workers = self.config.workers,
            "summarize stage starting"
        );

        let quota = Arc::new(AtomicBool::new(false));
        let summarizer = Arc::clone(&self.summarizer);
        let config = Arc::clone(&self.config);
        let flag = Arc::clone(&quota);
        let token = cancel.clone();
        let ranked: Vec<(usize, FetchedPage)> = pages.into_iter().enumerate().collect();
        let output = run_pool("summarize", ranked, self.config.workers, cancel, move |page| {
            summarize_one(
                Arc::clone(&summarizer),
                Arc::clone(&config),
                page,
                Arc::clone(&flag),
                token.clone(),
            )
        })
        .await;

        let mut outcome = SummaryOutcome {
            quota_exhausted: quota.load(Ordering::SeqCst),
            ..SummaryOutcome::default()
        };
        for summary in output.completed {
            if summary.failure == Some(FailureReason::Cancelled) {
                outcome.cancelled = true;
            }
            outcome.summaries.push(summary);
        }
        for (rank, page) in output.panicked {
            outcome.summaries.push(failed_summary(
                rank,
                page,
                FailureReason::Internal,
                "summarize worker panicked".into(),
            ));
        }
        if !output.abandoned.is_empty() {
            outcome.cancelled = true;
        }
        for (rank, page) in output.abandoned {
            outcome.summaries.push(failed_summary(
                rank,
                page,
                FailureReason::Cancelled,
                "run cancelled".into(),
            ));
        }

        tracing::info!(
            summarized = outcome.summaries.iter().filter(|s| s.succeeded).count(),
            failed = outcome.summaries.iter().filter(|s| !s.succeeded).count(),
            quota_exhausted = outcome.quota_exhausted,
            "summarize stage finished"
        );
        outcome
    }

    /// Combine the successful summaries into one overall summary.
    ///
    /// Succeeded summaries are ordered by fetch completion, not by when their
    /// summary finished, and the query is passed as context.
    pub async fn synthesize(
        &self,
        query: &str,
        outcome: &SummaryOutcome,
        cancel: &CancellationToken,
    ) -> Synthesis {
        if cancel.is_cancelled() || outcome.cancelled {
            return Synthesis::Skipped("run cancelled".into());
        }
        if outcome.quota_exhausted {
            return Synthesis::Skipped("summarizer quota exhausted".into());
        }
        let mut succeeded: Vec<&SourceSummary> = outcome.summaries.iter().filter(|s| s.succeeded).collect();
        succeeded.sort_by_key(|s| s.fetch_rank);
        if succeeded.is_empty() {
            return Synthesis::Skipped("no individual summaries to combine".into());
        }

        let input = synthesis_input(&succeeded);
        let context = format!("Overall answer to the research query: {query}");
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let summarizer = self.summarizer.as_ref();
        let input = input.as_str();
        let context = context.as_str();

        let result = retry_with_policy(
            &self.config.retry,
            cancel,
            SummarizeError::is_retryable,
            move |attempt| async move {
                if attempt > 0 {
                    tracing::debug!(attempt, "retrying synthesis");
                }
                call_with_timeout(summarizer, input, context, timeout).await
            },
        )
        .await;

        match result {
            Ok(text) => {
                tracing::info!(sources = succeeded.len(), "synthesis complete");
                Synthesis::Completed(text)
            }
            Err(RetryError::Cancelled) => Synthesis::Skipped("run cancelled".into()),
            Err(RetryError::Failed { error, attempts }) => {
                tracing::warn!(attempts, error = %error, "synthesis failed");
                Synthesis::Failed(error.to_string())
            }
        }
    }
}

async fn summarize_one(
    summarizer: Arc<dyn Summarizer>,
    config: Arc<SummarizeConfig>,
    (rank, page): (usize, FetchedPage),
    quota: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> SourceSummary {
    if quota.load(Ordering::SeqCst) {
        return failed_summary(rank, page, FailureReason::Quota, "skipped after quota exhaustion".into());
    }

    let timeout = Duration::from_secs(config.timeout_seconds);
    let summarizer = summarizer.as_ref();
    let text = page.full_content.as_str();
    let title = page.title.as_str();
    let flag = quota.as_ref();

    let result = retry_with_policy(
        &config.retry,
        &cancel,
        SummarizeError::is_retryable,
        move |attempt| async move {
            if flag.load(Ordering::SeqCst) {
                return Err(SummarizeError::Quota("exhausted earlier in this run".into()));
            }
            if attempt > 0 {
                tracing::debug!(attempt, "retrying page summary");
            }
            call_with_timeout(summarizer, text, title, timeout).await
        },
    )
    .await;

    match result {
        Ok(summary) => SourceSummary {
            url: page.url,
            title: page.title,
            content_preview: page.content_preview,
            individual_summary: summary,
            succeeded: true,
            failure: None,
            detail: None,
            fetch_rank: rank,
        },
        Err(RetryError::Cancelled) => failed_summary(rank, page, FailureReason::Cancelled, "run cancelled".into()),
        Err(RetryError::Failed { error, attempts }) => {
            if matches!(error, SummarizeError::Quota(_)) && !quota.swap(true, Ordering::SeqCst) {
                tracing::warn!(error = %error, "summarizer quota exhausted, skipping remaining pages");
            } else {
                tracing::warn!(url = %page.url, attempts, error = %error, "page summary failed");
            }
            failed_summary(rank, page, error.reason(), error.to_string())
        }
    }
}

async fn call_with_timeout(
    summarizer: &dyn Summarizer,
    text: &str,
    context: &str,
    timeout: Duration,
) -> Result<String, SummarizeError> {
    match tokio::time::timeout(timeout, summarizer.summarize(text, Some(context))).await {
        Ok(result) => result,
        Err(_) => Err(SummarizeError::Transient(format!(
            "timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

fn failed_summary(rank: usize, page: FetchedPage, reason: FailureReason, detail: String) -> SourceSummary {
    SourceSummary {
        url: page.url,
        title: page.title,
        content_preview: page.content_preview,
        individual_summary: String::new(),
        succeeded: false,
        failure: Some(reason),
        detail: Some(detail),
        fetch_rank: rank,
    }
}

fn synthesis_input(summaries: &[&SourceSummary]) -> String {
    summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Source {} ({}):\n{}", i + 1, s.title, s.individual_summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}
