//! Fetch stage: bounded, failure-isolated page retrieval.
//!
//! Candidates are fetched by a fixed-size worker pool. Each fetch runs
//! under the per-page timeout and the fetch retry policy; a failure becomes
//! a [`FailedSource`] with stage `fetch` and never affects other pages.
//! Pages come back in completion order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use sage_search::content::truncate_chars;
use sage_search::{retry_with_policy, CandidateUrl, PageContent, RetryError};

use super::{FetchError, FetchedPage, PageFetcher};
use crate::aggregate::{FailedSource, FailureReason, Stage};
use crate::config::FetchConfig;
use crate::pool::run_pool;

/// What the fetch stage produced.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Fetched pages in completion order.
    pub pages: Vec<FetchedPage>,
    /// Candidates that failed or were abandoned.
    pub failed: Vec<FailedSource>,
    /// True if the run was cancelled while fetching.
    pub cancelled: bool,
}

/// Runs a [`PageFetcher`] over the candidate set with a bounded pool.
pub struct FetchCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<FetchConfig>,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: FetchConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
        }
    }

    /// Fetch every candidate, isolating per-URL failures.
    ///
    /// On cancellation, pages already fetched are kept and every candidate
    /// without an outcome is reported with reason `cancelled`.
    pub async fn fetch(&self, candidates: Vec<CandidateUrl>, cancel: &CancellationToken) -> FetchOutcome {
        tracing::debug!(
            fetcher = self.fetcher.name(),
            count = candidates.len(),
            workers = self.config.workers,
            "fetch stage starting"
        );

        let fetcher = Arc::clone(&self.fetcher);
        let config = Arc::clone(&self.config);
        let token = cancel.clone();
        let output = run_pool("fetch", candidates, self.config.workers, cancel, move |candidate| {
            fetch_one(Arc::clone(&fetcher), Arc::clone(&config), candidate, token.clone())
        })
        .await;

        let mut outcome = FetchOutcome::default();
        for result in output.completed {
            match result {
                Ok(page) => outcome.pages.push(page),
                Err(failed) => {
                    if failed.reason == FailureReason::Cancelled {
                        outcome.cancelled = true;
                    }
                    outcome.failed.push(failed);
                }
            }
        }
        for candidate in output.panicked {
            outcome.failed.push(
                FailedSource::new(candidate.url, Stage::Fetch, FailureReason::Internal)
                    .with_detail("fetch worker panicked"),
            );
        }
        if !output.abandoned.is_empty() {
            outcome.cancelled = true;
        }
        for candidate in output.abandoned {
            outcome
                .failed
                .push(FailedSource::new(candidate.url, Stage::Fetch, FailureReason::Cancelled));
        }

        tracing::info!(
            fetched = outcome.pages.len(),
            failed = outcome.failed.len(),
            "fetch stage finished"
        );
        outcome
    }
}

async fn fetch_one(
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<FetchConfig>,
    candidate: CandidateUrl,
    cancel: CancellationToken,
) -> Result<FetchedPage, FailedSource> {
    if let Err(e) = validate_url(&candidate.url) {
        tracing::warn!(url = %candidate.url, error = %e, "skipping invalid URL");
        return Err(FailedSource::new(candidate.url, Stage::Fetch, e.reason()).with_detail(e.to_string()));
    }

    let timeout = Duration::from_secs(config.timeout_seconds);
    let fetcher = fetcher.as_ref();
    let url = candidate.url.as_str();

    let result = retry_with_policy(&config.retry, &cancel, FetchError::is_retryable, move |attempt| async move {
        if attempt > 0 {
            tracing::debug!(url, attempt, "retrying page fetch");
        }
        match tokio::time::timeout(timeout, fetcher.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
        }
    })
    .await;

    match result {
        Ok(content) if content.text.trim().is_empty() => {
            tracing::warn!(url = %candidate.url, fetcher = fetcher.name(), "fetched page has no text");
            Err(FailedSource::new(candidate.url, Stage::Fetch, FailureReason::EmptyContent)
                .with_detail(FetchError::EmptyContent.to_string()))
        }
        Ok(content) => Ok(build_page(&candidate, content, &config)),
        Err(RetryError::Cancelled) => Err(FailedSource::new(
            candidate.url,
            Stage::Fetch,
            FailureReason::Cancelled,
        )),
        Err(RetryError::Failed { error, attempts }) => {
            tracing::warn!(url = %candidate.url, attempts, error = %error, "page fetch failed");
            Err(FailedSource::new(candidate.url, Stage::Fetch, error.reason()).with_detail(error.to_string()))
        }
    }
}

fn validate_url(raw: &str) -> Result<(), FetchError> {
    let parsed = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(FetchError::InvalidUrl(raw.to_owned()));
    }
    Ok(())
}

/// Cap the content, cut the preview and pick a title.
///
/// The title falls back to the provider's title, then to the URL.
fn build_page(candidate: &CandidateUrl, content: PageContent, config: &FetchConfig) -> FetchedPage {
    let full_content = truncate_chars(&content.text, config.max_content_chars).to_owned();
    let content_preview = truncate_chars(&full_content, config.preview_chars).to_owned();

    let title = Some(content.title)
        .filter(|t| !t.is_empty())
        .or_else(|| candidate.provider_title.clone().filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| candidate.url.clone());

    FetchedPage {
        url: candidate.url.clone(),
        title,
        content_preview,
        full_content,
        source_provider: candidate.source_provider,
    }
}
