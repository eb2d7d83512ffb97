//! Pipeline coordinator: search → fetch → summarize → aggregate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use sage_search::providers::{CachedProvider, DuckDuckGoProvider, SerperProvider};
use sage_search::{ProviderClient, SearchOrchestrator};

use crate::aggregate::{FailedSource, FailureReason, ResultAggregator, RunResult, Stage, StageResults, Synthesis};
use crate::config::{Credentials, FetchBackend, FetchConfig, ProviderKind, RunConfig, RunRequest, SageConfig, SearchSection};
use crate::error::{PipelineError, Result};
use crate::fetch::{BrowserlessPageFetcher, FetchCoordinator, HttpPageFetcher, PageFetcher};
use crate::persist::{JsonFileSink, PersistenceSink};
use crate::summarize::{build_summarizer, SummarizationStage};

/// Orchestrates one research run end to end.
///
/// The coordinator owns a cancellation token; every run listens on a child
/// of it, so [`shutdown`](Self::shutdown) cancels in-flight runs and every
/// later one.
pub struct PipelineCoordinator {
    search: SearchOrchestrator,
    fetch: FetchCoordinator,
    summarize: SummarizationStage,
    aggregator: ResultAggregator,
    cancel: CancellationToken,
}

impl PipelineCoordinator {
    /// Create a coordinator from ready-made stages. Results are not
    /// persisted until a sink is attached with [`with_sink`](Self::with_sink).
    pub fn new(search: SearchOrchestrator, fetch: FetchCoordinator, summarize: SummarizationStage) -> Self {
        Self {
            search,
            fetch,
            summarize,
            aggregator: ResultAggregator::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build every stage from configuration and environment credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when the configuration is invalid,
    /// no search provider can be registered, the selected summarizer has no
    /// key, or the Browserless backend is selected without a URL.
    pub fn from_config(config: &SageConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;

        let providers = build_providers(&config.search, credentials)?;
        let search = SearchOrchestrator::new(providers, config.search.settings.clone())?;

        let fetcher = build_fetcher(&config.pipeline.fetch, credentials)?;
        let fetch = FetchCoordinator::new(fetcher, config.pipeline.fetch.clone());

        let summarizer = build_summarizer(&config.pipeline.summarize, credentials)?;
        let summarize = SummarizationStage::new(summarizer, config.pipeline.summarize.clone());

        let sink = JsonFileSink::new(config.pipeline.output.directory.clone());
        Ok(Self::new(search, fetch, summarize).with_sink(Arc::new(sink)))
    }

    /// Persist results of runs that ask for it through `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.aggregator = ResultAggregator::new(Some(sink));
        self
    }

    /// Run the pipeline for one validated query.
    ///
    /// Never fails: fatal conditions produce a result with status `error`
    /// and an `error` object; everything else is recorded per source.
    pub async fn run(&self, run: &RunConfig) -> RunResult {
        let cancel = self.cancel.child_token();
        let started = Instant::now();
        trace!(query = run.query(), "run query");
        info!(
            max_results = run.max_results(),
            max_urls = run.max_urls(),
            persist = run.persist(),
            "run started"
        );

        let search = match self
            .search
            .search(run.query(), run.max_results(), run.max_urls(), &cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = PipelineError::from(e);
                error!(code = err.code(), error = %err, "search stage failed");
                let result = RunResult::failed(run.query(), &err);
                return self.aggregator.persist(run, result).await;
            }
        };
        debug!(
            candidates = search.candidates.len(),
            rejected = search.rejected_urls,
            "search stage finished"
        );

        let mut stages = StageResults {
            candidates: search.candidates.clone(),
            provider_counts: search.provider_counts,
            provider_errors: search.provider_errors,
            pages_fetched: 0,
            failed_fetches: Vec::new(),
            summaries: Vec::new(),
            synthesis: Synthesis::Skipped("run cancelled".into()),
            cancelled: search.cancelled,
        };

        if stages.cancelled || cancel.is_cancelled() {
            warn!("run cancelled during search");
            stages.cancelled = true;
            stages.failed_fetches = search
                .candidates
                .into_iter()
                .map(|c| FailedSource::new(c.url, Stage::Fetch, FailureReason::Cancelled))
                .collect();
            return self.finish(run, stages, started).await;
        }

        let fetched = self.fetch.fetch(search.candidates, &cancel).await;
        stages.pages_fetched = fetched.pages.len();
        stages.failed_fetches = fetched.failed;
        stages.cancelled |= fetched.cancelled;

        let summaries = self.summarize.summarize_all(fetched.pages, &cancel).await;
        stages.synthesis = self.summarize.synthesize(run.query(), &summaries, &cancel).await;
        stages.cancelled |= summaries.cancelled || cancel.is_cancelled();
        stages.summaries = summaries.summaries;

        self.finish(run, stages, started).await
    }

    /// Validate loosely-typed parameters, then [`run`](Self::run).
    ///
    /// An invalid request yields an `error` result without touching any
    /// collaborator.
    pub async fn execute(&self, request: RunRequest) -> RunResult {
        let query = request.query.clone();
        match request.into_config() {
            Ok(run) => self.run(&run).await,
            Err(err) => {
                warn!(code = err.code(), "rejected run request");
                RunResult::failed(query, &err)
            }
        }
    }

    /// Blocking form of [`run`](Self::run) on a private current-thread
    /// runtime.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the runtime cannot be started.
    pub fn run_blocking(&self, run: &RunConfig) -> Result<RunResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to start async runtime: {e}")))?;
        Ok(runtime.block_on(self.run(run)))
    }

    /// Request cancellation of the current and all later runs.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Get a clone of the cancellation token for external use.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn finish(&self, run: &RunConfig, stages: StageResults, started: Instant) -> RunResult {
        let result = self.aggregator.finish(run, stages).await;
        info!(
            status = ?result.status,
            sources = result.successfully_scraped,
            failed = result.failed_sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        result
    }
}

/// Providers in configured order. Serper needs a key and is skipped without
/// one; a kind listed twice is registered once.
fn build_providers(section: &SearchSection, credentials: &Credentials) -> Result<Vec<Arc<dyn ProviderClient>>> {
    let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();
    let mut seen: Vec<ProviderKind> = Vec::new();

    for &kind in &section.providers {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);

        let provider: Arc<dyn ProviderClient> = match kind {
            ProviderKind::DuckDuckGo => Arc::new(DuckDuckGoProvider::new(section.settings.clone())?),
            ProviderKind::Serper => match credentials.serper_api_key.as_deref() {
                Some(key) => Arc::new(SerperProvider::new(&section.settings, key)?),
                None => {
                    info!("SERPER_API_KEY not set, Serper provider disabled");
                    continue;
                }
            },
        };

        let provider = if section.settings.cache_ttl_seconds > 0 {
            let ttl = Duration::from_secs(section.settings.cache_ttl_seconds);
            Arc::new(CachedProvider::new(provider, ttl)) as Arc<dyn ProviderClient>
        } else {
            provider
        };
        providers.push(provider);
    }

    if providers.is_empty() {
        return Err(PipelineError::Config(
            "no search provider could be registered".into(),
        ));
    }
    Ok(providers)
}

fn build_fetcher(config: &FetchConfig, credentials: &Credentials) -> Result<Arc<dyn PageFetcher>> {
    let browserless = credentials.browserless_url.as_deref();
    let token = credentials.browserless_token.as_deref();

    let fetcher: Arc<dyn PageFetcher> = match (config.backend, browserless) {
        (FetchBackend::Browserless, None) => {
            return Err(PipelineError::Config(
                "browserless backend selected but BROWSERLESS_URL is not set".into(),
            ));
        }
        (FetchBackend::Browserless | FetchBackend::Auto, Some(url)) => {
            Arc::new(BrowserlessPageFetcher::new(url, token)?)
        }
        (FetchBackend::Http | FetchBackend::Auto, _) => {
            Arc::new(HttpPageFetcher::new(config.user_agent.as_deref())?)
        }
    };
    debug!(fetcher = fetcher.name(), "page fetcher configured");
    Ok(fetcher)
}
