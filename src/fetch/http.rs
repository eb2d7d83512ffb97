//! Plain HTTP page fetcher. No JavaScript rendering.

use std::time::Duration;

use async_trait::async_trait;

use sage_search::PageContent;

use super::{page_from_html, read_capped_body, FetchError, PageFetcher, MAX_BODY_BYTES};
use crate::error::PipelineError;

/// Ceiling on the client-wide timeout; each request sets its own.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches pages with a GET request and cleans the returned HTML.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpPageFetcher {
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the HTTP client cannot be built.
    pub fn new(user_agent: Option<&str>) -> Result<Self, PipelineError> {
        let client = sage_search::http::build_client(CLIENT_TIMEOUT, user_agent)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self {
            client,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Read at most `bytes` of each response body.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageContent, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let html = read_capped_body(response, self.max_body_bytes, timeout).await?;
        page_from_html(&html, url)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn fetches_and_cleans_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Doc</title></head><body><nav>menu</nav><article>Body text</article></body></html>",
            ))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(None).unwrap();
        let url = format!("{}/article", server.uri());
        let page = fetcher.fetch(&url, TIMEOUT).await.unwrap();
        assert_eq!(page.title, "Doc");
        assert_eq!(page.text, "Body text");
        assert_eq!(page.url, url);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(Some("sage-test")).unwrap();
        let err = fetcher.fetch(&server.uri(), TIMEOUT).await.unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(404));
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>late</p>")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(None).unwrap();
        let err = fetcher
            .fetch(&server.uri(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_cut_at_the_byte_cap() {
        let server = MockServer::start().await;
        let html = format!("<html><body><p>{}</p></body></html>", "word ".repeat(20_000));
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(None).unwrap().with_max_body_bytes(1024);
        let page = fetcher.fetch(&server.uri(), TIMEOUT).await.unwrap();
        assert!(page.text.starts_with("word word"));
        assert!(page.text.len() < 1024, "text was {} bytes", page.text.len());
    }

    #[tokio::test]
    async fn empty_page_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(None).unwrap();
        let err = fetcher.fetch(&server.uri(), TIMEOUT).await.unwrap_err();
        assert_eq!(err, FetchError::EmptyContent);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let fetcher = HttpPageFetcher::new(None).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let err = fetcher.fetch("http://127.0.0.1:9/", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout(_)));
    }
}
