//! HTTP client construction shared by providers and page fetchers.
//!
//! Clients keep cookies (consent interstitials), follow a bounded number of
//! redirects and present a browser User-Agent picked per client.

use crate::config::SearchConfig;
use crate::error::SearchError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a client with `timeout` as its overall request ceiling.
///
/// `user_agent` overrides the rotated browser User-Agent.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, SearchError> {
    let ua = match user_agent {
        Some(ua) => ua,
        None => random_user_agent(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Client for provider requests, using the search timeout and User-Agent.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_search_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    build_client(
        Duration::from_secs(config.timeout_seconds),
        config.user_agent.as_deref(),
    )
}

/// One of the built-in browser User-Agents, chosen at random.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Sleep for a random duration inside `config.request_delay_ms`.
pub async fn polite_delay(config: &SearchConfig) {
    let (min, max) = config.request_delay_ms;
    if max == 0 {
        return;
    }
    let millis = rand::thread_rng().gen_range(min..=max);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
