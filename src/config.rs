//! Configuration: per-run input, stage tuning and file/environment loading.
//!
//! - [`RunConfig`] is the validated input of one run.
//! - [`PipelineConfig`] sizes the worker pools and sets timeouts, retry
//!   policies and content limits.
//! - [`SageConfig`] is what lives in `config.toml`: search settings plus the
//!   pipeline sections. Secrets never live in the file; they come from the
//!   environment through [`Credentials`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sage_search::{RetryPolicy, SearchConfig};

use crate::error::{PipelineError, Result};

/// Default number of results requested from each provider.
pub const DEFAULT_MAX_RESULTS: usize = 5;
/// Upper bound for `max_results`.
pub const MAX_MAX_RESULTS: usize = 20;
/// Default cap on distinct URLs carried into fetching.
pub const DEFAULT_MAX_URLS: usize = 8;
/// Upper bound for `max_urls`.
pub const MAX_MAX_URLS: usize = 50;

// ── Run input ─────────────────────────────────────────────────

/// Input of a single run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    query: String,
    max_results: usize,
    max_urls: usize,
    persist: bool,
}

impl RunConfig {
    /// Create a run for `query` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if the query is empty or only
    /// whitespace.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation("query must not be empty".into()));
        }
        Ok(Self {
            query: trimmed.to_owned(),
            max_results: DEFAULT_MAX_RESULTS,
            max_urls: DEFAULT_MAX_URLS,
            persist: false,
        })
    }

    /// Results requested per provider, clamped into `1..=20`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_MAX_RESULTS);
        self
    }

    /// Cap on distinct candidate URLs, clamped into `1..=50`.
    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls.clamp(1, MAX_MAX_URLS);
        self
    }

    /// Whether the finished result is handed to the persistence sink.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }

    pub fn persist(&self) -> bool {
        self.persist
    }
}

/// Unvalidated run parameters, as they arrive from JSON or a caller's
/// dictionary of options.
///
/// `save_to_file` is accepted as an alias of `persist`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub query: String,
    pub max_results: Option<usize>,
    pub max_urls: Option<usize>,
    #[serde(alias = "save_to_file")]
    pub persist: bool,
}

impl RunRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Validate into a [`RunConfig`], applying defaults and clamps.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for an empty query.
    pub fn into_config(self) -> Result<RunConfig> {
        Ok(RunConfig::new(self.query)?
            .with_max_results(self.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
            .with_max_urls(self.max_urls.unwrap_or(DEFAULT_MAX_URLS))
            .with_persist(self.persist))
    }
}

// ── Stage configuration ───────────────────────────────────────

/// How pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Browserless when `BROWSERLESS_URL` is set, plain HTTP otherwise.
    #[default]
    Auto,
    /// Plain HTTP GET; no JavaScript rendering.
    Http,
    /// Browserless `/content` rendering; requires `BROWSERLESS_URL`.
    Browserless,
}

/// Fetch stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of concurrent page fetches.
    pub workers: usize,
    /// Per-page timeout in seconds.
    pub timeout_seconds: u64,
    /// Cleaned text is silently cut to this many characters.
    pub max_content_chars: usize,
    /// Length of `content_preview`, in characters.
    pub preview_chars: usize,
    pub backend: FetchBackend,
    /// Custom User-Agent; rotates through built-in browser strings if unset.
    pub user_agent: Option<String>,
    /// Retries on timeouts, transport errors and 429/5xx responses.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_seconds: 30,
            max_content_chars: sage_search::content::DEFAULT_MAX_CHARS,
            preview_chars: 200,
            backend: FetchBackend::Auto,
            user_agent: None,
            retry: RetryPolicy::default().with_max_retries(1),
        }
    }
}

/// Which AI service writes the summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerKind {
    #[default]
    Gemini,
    OpenAi,
    OpenRouter,
    DeepSeek,
}

impl SummarizerKind {
    /// Model used when the config does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::DeepSeek => "deepseek-chat",
        }
    }

    /// API root used when the config does not override it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
        }
    }
}

/// Summarization stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    pub provider: SummarizerKind,
    /// Model override; see [`SummarizerKind::default_model`].
    pub model: Option<String>,
    /// API root override (proxies, tests).
    pub base_url: Option<String>,
    /// Number of concurrent individual summary calls.
    pub workers: usize,
    /// Per-call timeout in seconds.
    pub timeout_seconds: u64,
    /// Retries on transient failures. Quota errors are never retried.
    pub retry: RetryPolicy,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            provider: SummarizerKind::default(),
            model: None,
            base_url: None,
            workers: 3,
            timeout_seconds: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl SummarizeConfig {
    /// Configured model, or the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Configured API root, or the provider default.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Where persisted results go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Settings for the fetch, summarize and persistence stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub summarize: SummarizeConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Validates pool sizes, timeouts and retry jitter.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.workers == 0 || self.summarize.workers == 0 {
            return Err(PipelineError::Config("worker pools need at least one worker".into()));
        }
        if self.fetch.timeout_seconds == 0 || self.summarize.timeout_seconds == 0 {
            return Err(PipelineError::Config("timeouts must be greater than 0".into()));
        }
        if self.fetch.max_content_chars == 0 {
            return Err(PipelineError::Config("max_content_chars must be greater than 0".into()));
        }
        for retry in [&self.fetch.retry, &self.summarize.retry] {
            if !(0.0..=1.0).contains(&retry.jitter) {
                return Err(PipelineError::Config(
                    "retry jitter must be between 0.0 and 1.0".into(),
                ));
            }
        }
        Ok(())
    }
}

// ── Config file ───────────────────────────────────────────────

/// Search providers that can be enabled from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    DuckDuckGo,
    /// Registered only when `SERPER_API_KEY` is set.
    Serper,
}

/// The `[search]` section: provider priority order plus search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Providers in priority order for the round-robin merge.
    pub providers: Vec<ProviderKind>,
    #[serde(flatten)]
    pub settings: SearchConfig,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            providers: vec![ProviderKind::DuckDuckGo, ProviderKind::Serper],
            settings: SearchConfig::default(),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SageConfig {
    pub search: SearchSection,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl SageConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid {}: {e}", path.display())))
    }

    /// Load `path` if given, else the default config file if it exists,
    /// else built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if an explicit path is missing or
    /// any file that is read fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default = Self::default_config_path();
        if default.is_file() {
            tracing::debug!(path = %default.display(), "loading config");
            Self::from_file(&default)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path: `~/.config/sage/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("sage").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("sage").join("config.toml")
        } else {
            PathBuf::from("/tmp/sage-config/config.toml")
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        if self.search.providers.is_empty() {
            return Err(PipelineError::Config("[search] providers must not be empty".into()));
        }
        self.search.settings.validate()?;
        self.pipeline.validate()
    }
}

// ── Credentials ───────────────────────────────────────────────

/// API keys and endpoints read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub serper_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            serper_api_key: get("SERPER_API_KEY"),
            gemini_api_key: get("GEMINI_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
            browserless_url: get("BROWSERLESS_URL"),
            browserless_token: get("BROWSERLESS_TOKEN"),
        }
    }

    /// API key for the given summarizer, if set.
    pub fn summarizer_key(&self, kind: SummarizerKind) -> Option<&str> {
        match kind {
            SummarizerKind::Gemini => self.gemini_api_key.as_deref(),
            SummarizerKind::OpenAi => self.openai_api_key.as_deref(),
            SummarizerKind::OpenRouter => self.openrouter_api_key.as_deref(),
            SummarizerKind::DeepSeek => self.deepseek_api_key.as_deref(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("serper_api_key", &self.serper_api_key.is_some())
            .field("gemini_api_key", &self.gemini_api_key.is_some())
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("openrouter_api_key", &self.openrouter_api_key.is_some())
            .field("deepseek_api_key", &self.deepseek_api_key.is_some())
            .field("browserless_url", &self.browserless_url)
            .field("browserless_token", &self.browserless_token.is_some())
            .finish()
    }
}
