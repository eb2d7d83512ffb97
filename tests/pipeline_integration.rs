//! End-to-end pipeline behaviour with fake collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sage::aggregate::{RunResult, RunStatus};
use sage::config::{FetchConfig, RunConfig, RunRequest, SummarizeConfig};
use sage::fetch::{FetchCoordinator, FetchError, PageFetcher};
use sage::persist::PersistenceSink;
use sage::summarize::{SummarizationStage, SummarizeError, Summarizer};
use sage::{PipelineCoordinator, PipelineError};
use sage_search::{
    PageContent, ProviderClient, ProviderHit, RetryPolicy, SearchConfig, SearchError, SearchOrchestrator,
    SearchProvider,
};

// ── Fakes ─────────────────────────────────────────────────────

struct FakeProvider {
    name: &'static str,
    urls: Option<Vec<&'static str>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn returning(name: &'static str, urls: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            urls: Some(urls.to_vec()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            urls: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Custom(self.name)
    }

    async fn query(&self, _query: &str, limit: usize) -> Result<Vec<ProviderHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.urls {
            Some(urls) => Ok(urls
                .iter()
                .take(limit)
                .map(|u| ProviderHit::new(*u).with_title(format!("{} hit", self.name)))
                .collect()),
            None => Err(SearchError::Status {
                status: 503,
                message: "service unavailable".into(),
            }),
        }
    }
}

/// Fails URLs containing `/bad`, hangs on URLs containing `/slow`.
#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<PageContent, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("/bad") {
            return Err(FetchError::HttpStatus(404));
        }
        if url.contains("/slow") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(PageContent {
            url: url.to_owned(),
            title: format!("Page at {url}"),
            text: format!("Readable body of {url}."),
            word_count: 4,
        })
    }
}

#[derive(Default)]
struct FakeSummarizer {
    quota: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.quota {
            return Err(SummarizeError::Quota("insufficient_quota".into()));
        }
        Ok(format!("{} :: {} chars", context.unwrap_or_default(), text.len()))
    }
}

#[derive(Default)]
struct MemorySink {
    stored: Mutex<Vec<String>>,
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn store(&self, result: &RunResult) -> Result<String, PipelineError> {
        let mut stored = self.stored.lock().unwrap();
        stored.push(result.query.clone());
        Ok(format!("memory://{}", stored.len()))
    }
}

// ── Harness ───────────────────────────────────────────────────

struct Harness {
    coordinator: PipelineCoordinator,
    providers: Vec<Arc<FakeProvider>>,
    fetcher: Arc<FakeFetcher>,
    summarizer: Arc<FakeSummarizer>,
}

fn harness(providers: Vec<Arc<FakeProvider>>, summarizer: FakeSummarizer, summarize_workers: usize) -> Harness {
    let search_config = SearchConfig {
        timeout_seconds: 5,
        retry: RetryPolicy::no_retry(),
        ..SearchConfig::default()
    };
    let clients: Vec<Arc<dyn ProviderClient>> = providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn ProviderClient>)
        .collect();
    let search = SearchOrchestrator::new(clients, search_config).unwrap();

    let fetcher = Arc::new(FakeFetcher::default());
    let fetch = FetchCoordinator::new(
        fetcher.clone(),
        FetchConfig {
            timeout_seconds: 5,
            retry: RetryPolicy::no_retry(),
            ..FetchConfig::default()
        },
    );

    let summarizer = Arc::new(summarizer);
    let summarize = SummarizationStage::new(
        summarizer.clone(),
        SummarizeConfig {
            workers: summarize_workers,
            timeout_seconds: 5,
            retry: RetryPolicy::new().with_max_retries(2).with_base_delay_ms(1).with_max_delay_ms(2),
            ..SummarizeConfig::default()
        },
    );

    Harness {
        coordinator: PipelineCoordinator::new(search, fetch, summarize),
        providers,
        fetcher,
        summarizer,
    }
}

fn two_providers_sharing_one_url() -> Vec<Arc<FakeProvider>> {
    vec![
        FakeProvider::returning(
            "alpha",
            &["https://a.example.com/1", "https://a.example.com/2", "https://shared.example.com/"],
        ),
        FakeProvider::returning(
            "beta",
            &["https://shared.example.com/", "https://b.example.com/1", "https://b.example.com/2"],
        ),
    ]
}

/// Every candidate appears exactly once across sources and failures.
fn assert_accounted(result: &RunResult) {
    let mut seen = BTreeSet::new();
    for url in result
        .sources
        .iter()
        .map(|s| &s.url)
        .chain(result.failed_sources.iter().map(|f| &f.url))
    {
        assert!(seen.insert(url.clone()), "{url} reported twice");
    }
    assert_eq!(seen.len(), result.total_sources_found);
    assert_eq!(result.successfully_scraped, result.sources.len());
}

// ── Tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn shared_url_is_fetched_once_and_run_succeeds() {
    let h = harness(two_providers_sharing_one_url(), FakeSummarizer::default(), 3);
    let run = RunConfig::new("rust async runtimes").unwrap().with_max_results(3);

    let result = h.coordinator.run(&run).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.query, "rust async runtimes");
    assert_eq!(result.total_sources_found, 5);
    assert_eq!(result.successfully_scraped, 5);
    assert!(result.failed_sources.is_empty());
    assert!(!result.overall_summary.is_empty());
    assert!(result.error.is_none());
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 5);
    // Five page summaries plus one synthesis.
    assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 6);
    assert_eq!(result.metadata.provider_counts.get("alpha"), Some(&3));
    assert_eq!(result.metadata.provider_counts.get("beta"), Some(&3));
    assert_eq!(result.metadata.total_unique_urls, 5);
    assert_accounted(&result);
}

#[tokio::test]
async fn empty_query_fails_validation_without_calls() {
    let h = harness(two_providers_sharing_one_url(), FakeSummarizer::default(), 3);

    let result = h.coordinator.execute(RunRequest::new("   ")).await;

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_ref().unwrap().code, "VALIDATION_ERROR");
    assert!(result.sources.is_empty());
    assert!(result.failed_sources.is_empty());
    assert!(h.providers.iter().all(|p| p.calls.load(Ordering::SeqCst) == 0));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_providers_failing_is_fatal() {
    let h = harness(
        vec![FakeProvider::failing("alpha"), FakeProvider::failing("beta")],
        FakeSummarizer::default(),
        3,
    );

    let result = h.coordinator.run(&RunConfig::new("anything").unwrap()).await;

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_ref().unwrap().code, "ALL_PROVIDERS_FAILED");
    assert!(result.sources.is_empty());
    assert!(result.failed_sources.is_empty());
    assert_eq!(result.overall_summary, "");
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_provider_down_still_succeeds() {
    let h = harness(
        vec![
            FakeProvider::failing("alpha"),
            FakeProvider::returning("beta", &["https://b.example.com/1", "https://b.example.com/2"]),
        ],
        FakeSummarizer::default(),
        3,
    );

    let result = h.coordinator.run(&RunConfig::new("anything").unwrap()).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.total_sources_found, 2);
    assert!(result.metadata.provider_errors.contains_key("alpha"));
    assert_eq!(result.metadata.provider_counts.get("alpha"), Some(&0));
}

#[tokio::test]
async fn fetch_failure_is_isolated_and_run_is_partial() {
    let h = harness(
        vec![FakeProvider::returning(
            "alpha",
            &["https://a.example.com/1", "https://a.example.com/bad", "https://a.example.com/3"],
        )],
        FakeSummarizer::default(),
        3,
    );

    let result = h.coordinator.run(&RunConfig::new("isolation").unwrap()).await;

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.successfully_scraped, 2);
    assert_eq!(result.failed_sources.len(), 1);
    let failed = &result.failed_sources[0];
    assert!(failed.url.ends_with("/bad"));
    assert_eq!(failed.reason.as_str(), "http_status");
    assert!(!result.overall_summary.is_empty());
    assert_accounted(&result);
}

#[tokio::test]
async fn quota_exhaustion_stops_further_summarizer_calls() {
    let h = harness(
        two_providers_sharing_one_url(),
        FakeSummarizer {
            quota: true,
            ..FakeSummarizer::default()
        },
        1,
    );

    let result = h.coordinator.run(&RunConfig::new("quota").unwrap()).await;

    assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.overall_summary, "");
    assert_eq!(result.successfully_scraped, 0);
    assert_eq!(result.failed_sources.len(), 5);
    assert!(result.failed_sources.iter().all(|f| f.reason.as_str() == "quota"));
    // Fetched pages keep their title and preview even though summarizing failed.
    assert!(result.failed_sources.iter().all(|f| f.title.is_some()));
    assert_accounted(&result);
}

#[tokio::test]
async fn max_urls_caps_candidates() {
    let h = harness(two_providers_sharing_one_url(), FakeSummarizer::default(), 3);
    let run = RunConfig::new("cap").unwrap().with_max_urls(2);

    let result = h.coordinator.run(&run).await;

    assert_eq!(result.total_sources_found, 2);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 2);
    assert_accounted(&result);
}

#[tokio::test]
async fn cancellation_keeps_finished_work_and_marks_the_rest() {
    let h = harness(
        vec![FakeProvider::returning(
            "alpha",
            &["https://a.example.com/1", "https://a.example.com/slow", "https://a.example.com/slow2"],
        )],
        FakeSummarizer::default(),
        3,
    );
    let cancel = h.coordinator.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        h.coordinator.run(&RunConfig::new("cancel me").unwrap()),
    )
    .await
    .expect("cancelled run should return promptly");

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_ref().unwrap().code, "CANCELLED");
    assert_eq!(result.total_sources_found, 3);
    assert!(result
        .failed_sources
        .iter()
        .filter(|f| f.url.contains("/slow"))
        .all(|f| f.reason.as_str() == "cancelled"));
    assert_accounted(&result);
}

#[tokio::test]
async fn persisted_only_when_requested() {
    let sink = Arc::new(MemorySink::default());
    let h = harness(two_providers_sharing_one_url(), FakeSummarizer::default(), 3);
    let coordinator = h.coordinator.with_sink(sink.clone());

    let result = coordinator.run(&RunConfig::new("no save").unwrap()).await;
    assert!(result.saved_file.is_none());
    assert!(sink.stored.lock().unwrap().is_empty());

    let result = coordinator
        .run(&RunConfig::new("save").unwrap().with_persist(true))
        .await;
    assert_eq!(result.saved_file.as_deref(), Some("memory://1"));
    assert_eq!(sink.stored.lock().unwrap().as_slice(), ["save".to_owned()]);
}

#[tokio::test]
async fn serialized_result_has_expected_shape() {
    let h = harness(
        vec![FakeProvider::returning(
            "alpha",
            &["https://a.example.com/1", "https://a.example.com/bad"],
        )],
        FakeSummarizer::default(),
        3,
    );

    let result = h.coordinator.run(&RunConfig::new("shape").unwrap()).await;
    let json: serde_json::Value = serde_json::from_str(&result.to_json_pretty().unwrap()).unwrap();

    assert_eq!(json["status"], "partial");
    assert_eq!(json["total_sources_found"], 2);
    assert_eq!(json["successfully_scraped"], 1);
    assert_eq!(json["sources"][0]["scraped"], true);
    assert!(json["sources"][0]["individual_summary"].as_str().unwrap().contains("Page at"));
    assert_eq!(json["failed_sources"][0]["scraped"], false);
    assert_eq!(json["failed_sources"][0]["stage"], "fetch");
    assert_eq!(json["failed_sources"][0]["error"], "http_status");
    assert!(json.get("error").is_none());
    assert!(json.get("saved_file").is_none());
    assert!(json["metadata"]["success_rate"].as_f64().unwrap() > 0.4);
}

#[test]
fn run_blocking_drives_the_pipeline() {
    let h = harness(two_providers_sharing_one_url(), FakeSummarizer::default(), 3);

    let result = h
        .coordinator
        .run_blocking(&RunConfig::new("blocking").unwrap())
        .unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.total_sources_found, 5);
}
