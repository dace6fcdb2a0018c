//! Discogs API connector implementation
//!
//! Implements [`CollectionSource`] over the bridge `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::DiscogsApiConfig;
use core_runtime::logging::redact_url_token;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{DiscogsError, Result};
use crate::rate_limit::RateLimitTracker;
use crate::retry::RetryPolicy;
use crate::source::{CollectionSource, Credentials};
use crate::types::{CollectionPage, FolderResource, FoldersResponse, Identity, ReleaseDetails};

/// Characters of an error body kept for diagnostics
const ERROR_BODY_EXCERPT: usize = 512;

/// Discogs API connector
///
/// # Features
///
/// - Token authentication through the `token` query parameter
/// - Descriptive User-Agent on every request
/// - Light (folders, identity) and heavy (pages, details) timeouts
/// - Every response feeds the shared [`RateLimitTracker`]
/// - 429 responses wait for `Retry-After` and retry within a [`RetryPolicy`]
///
/// # Example
///
/// ```ignore
/// use provider_discogs::{CollectionSource, Credentials, DiscogsConnector, RateLimitTracker};
///
/// let tracker = Arc::new(RateLimitTracker::new());
/// let connector = DiscogsConnector::new(http_client, DiscogsApiConfig::new(), tracker);
/// let page = connector.fetch_page(&credentials, 0, 1, 100).await?;
/// ```
pub struct DiscogsConnector {
    http_client: Arc<dyn HttpClient>,
    config: DiscogsApiConfig,
    rate_limits: Arc<RateLimitTracker>,
    retry: RetryPolicy,
}

impl DiscogsConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        config: DiscogsApiConfig,
        rate_limits: Arc<RateLimitTracker>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            http_client,
            config,
            rate_limits,
            retry,
        }
    }

    /// Replace the retry policy derived from the config
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limits
    }

    fn user_url(&self, credentials: &Credentials, path: &str) -> String {
        format!(
            "{}/users/{}/{}?token={}",
            self.config.base_url,
            urlencoding::encode(&credentials.username),
            path,
            urlencoding::encode(&credentials.token)
        )
    }

    fn with_token(url: &str, token: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", url, separator, urlencoding::encode(token))
    }

    fn build_request(&self, url: &str, timeout: Duration) -> HttpRequest {
        HttpRequest::get(url)
            .header("User-Agent", self.config.user_agent.clone())
            .header("Accept", "application/json")
            .timeout(timeout)
    }

    /// Execute a GET, retrying 429 responses within the policy
    ///
    /// Non-200, non-429 responses are returned as [`DiscogsError::Api`] and
    /// never retried.
    #[instrument(skip(self, url), fields(url = %redact_url_token(url)))]
    async fn execute_with_retry(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        let mut retries = 0;

        loop {
            let response = self
                .http_client
                .execute(self.build_request(url, timeout))
                .await
                .map_err(|e| {
                    warn!(error = %e, "Request failed");
                    DiscogsError::from(e)
                })?;

            self.rate_limits.update(&response.headers).await;

            match response.status {
                200 => {
                    debug!(status = 200, "Request succeeded");
                    return Ok(response);
                }
                429 => {
                    let wait = self.retry.retry_after(response.header("Retry-After"));
                    if !self.retry.allows_retry(retries) {
                        warn!(retries, "Rate limited after exhausting retries");
                        return Err(DiscogsError::RateLimited {
                            retry_after_seconds: wait.as_secs(),
                        });
                    }

                    retries += 1;
                    warn!(
                        retry = retries,
                        max_retries = self.retry.max_retries,
                        wait_secs = wait.as_secs(),
                        "Rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                status => {
                    let body = response.body_excerpt(ERROR_BODY_EXCERPT);
                    warn!(status, body = %body, "Request returned an error status");
                    return Err(DiscogsError::Api {
                        status_code: status,
                        body,
                    });
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let response = self.execute_with_retry(url, timeout).await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            let excerpt = response.body_excerpt(ERROR_BODY_EXCERPT);
            warn!(error = %e, body = %excerpt, "Malformed response body");
            DiscogsError::Parse(format!("{}: {}", e, excerpt))
        })
    }
}

#[async_trait]
impl CollectionSource for DiscogsConnector {
    #[instrument(skip(self, token))]
    async fn fetch_identity(&self, token: &str) -> Result<Identity> {
        let url = Self::with_token(&format!("{}/oauth/identity", self.config.base_url), token);
        self.get_json(&url, self.config.light_timeout).await
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn fetch_folders(&self, credentials: &Credentials) -> Result<Vec<FolderResource>> {
        let url = self.user_url(credentials, "collection/folders");
        let response: FoldersResponse = self.get_json(&url, self.config.light_timeout).await?;

        debug!(count = response.folders.len(), "Fetched folders");
        Ok(response.folders)
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn fetch_page(
        &self,
        credentials: &Credentials,
        folder_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<CollectionPage> {
        let url = format!(
            "{}&page={}&per_page={}",
            self.user_url(
                credentials,
                &format!("collection/folders/{}/releases", folder_id)
            ),
            page,
            per_page
        );
        let page: CollectionPage = self.get_json(&url, self.config.heavy_timeout).await?;

        debug!(
            page = page.pagination.page,
            pages = page.pagination.pages,
            releases = page.releases.len(),
            "Fetched collection page"
        );
        Ok(page)
    }

    #[instrument(skip(self, credentials))]
    async fn fetch_release_details(
        &self,
        credentials: &Credentials,
        resource_url: &str,
    ) -> Result<ReleaseDetails> {
        if resource_url.trim().is_empty() {
            return Err(DiscogsError::InvalidRequest(
                "release has no resource url".to_string(),
            ));
        }

        let url = Self::with_token(resource_url, &credentials.token);
        self.get_json(&url, self.config.heavy_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{LIMIT_HEADER, REMAINING_HEADER, USED_HEADER};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    const PAGE_BODY: &str = r#"{
        "pagination": {"page": 2, "pages": 3, "per_page": 1, "items": 3},
        "releases": [{
            "id": 1867708,
            "instance_id": 1,
            "folder_id": 1,
            "rating": 4,
            "basic_information": {"title": "Harvest", "year": 1972}
        }]
    }"#;

    fn credentials() -> Credentials {
        Credentials::new("crate digger", "s3cret")
    }

    fn connector(mock: MockHttpClient) -> DiscogsConnector {
        DiscogsConnector::new(
            Arc::new(mock),
            DiscogsApiConfig::new()
                .with_base_url("https://api.test")
                .with_user_agent("CollectionMirrorTest/1.0"),
            Arc::new(RateLimitTracker::new()),
        )
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body.to_string())
            .with_header(LIMIT_HEADER, "60")
            .with_header(USED_HEADER, "5")
            .with_header(REMAINING_HEADER, "55")
    }

    fn too_many(retry_after: &str) -> HttpResponse {
        HttpResponse::new(429, "{\"message\": \"You are making requests too quickly.\"}")
            .with_header("Retry-After", retry_after)
            .with_header(LIMIT_HEADER, "60")
            .with_header(USED_HEADER, "60")
            .with_header(REMAINING_HEADER, "0")
    }

    #[tokio::test]
    async fn test_fetch_page_builds_authenticated_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url
                    == "https://api.test/users/crate%20digger/collection/folders/1/releases?token=s3cret&page=2&per_page=1"
                    && request.headers.get("User-Agent").map(String::as_str)
                        == Some("CollectionMirrorTest/1.0")
                    && request.timeout == Some(Duration::from_secs(30))
            })
            .times(1)
            .returning(|_| Ok(ok(PAGE_BODY)));

        let connector = connector(mock_http);
        let page = connector.fetch_page(&credentials(), 1, 2, 1).await.unwrap();

        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.releases[0].basic_information.title, "Harvest");
        assert_eq!(connector.rate_limits().current().await.remaining, 55);
    }

    #[tokio::test]
    async fn test_fetch_folders_uses_light_timeout() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url.ends_with("/collection/folders?token=s3cret")
                    && request.timeout == Some(Duration::from_secs(10))
            })
            .times(1)
            .returning(|_| {
                Ok(ok(
                    r#"{"folders": [{"id": 0, "name": "All", "count": 3}, {"id": 1, "name": "Uncategorized", "count": 3}]}"#,
                ))
            });

        let folders = connector(mock_http)
            .fetch_folders(&credentials())
            .await
            .unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[1].name, "Uncategorized");
    }

    #[tokio::test]
    async fn test_non_200_is_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(404, "{\"message\": \"Folder not found.\"}")));

        let result = connector(mock_http)
            .fetch_page(&credentials(), 9, 1, 100)
            .await;

        match result {
            Err(DiscogsError::Api { status_code, body }) => {
                assert_eq!(status_code, 404);
                assert!(body.contains("Folder not found"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok("<html>gateway</html>")));

        let result = connector(mock_http)
            .fetch_page(&credentials(), 1, 1, 100)
            .await;
        assert!(matches!(result, Err(DiscogsError::Parse(ref msg)) if msg.contains("gateway")));
    }

    #[tokio::test]
    async fn test_transport_error_is_network_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Err(bridge_traits::error::BridgeError::Timeout(
                "deadline elapsed".to_string(),
            ))
        });

        let result = connector(mock_http).fetch_folders(&credentials()).await;
        assert!(matches!(result, Err(DiscogsError::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_waits_retry_after_then_retries_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(too_many("2"))
            } else {
                Ok(ok(PAGE_BODY))
            }
        });

        let start = tokio::time::Instant::now();
        let page = connector(mock_http)
            .fetch_page(&credentials(), 1, 2, 1)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(page.releases.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_429_surfaces_as_rate_limited() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(2)
            .returning(|_| Ok(too_many("2")));

        let connector = connector(mock_http);
        let result = connector.fetch_page(&credentials(), 1, 1, 100).await;

        assert!(matches!(
            result,
            Err(DiscogsError::RateLimited {
                retry_after_seconds: 2
            })
        ));
        assert!(connector.rate_limits().should_throttle().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_retry_after_uses_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(HttpResponse::new(429, ""))
            } else {
                Ok(ok(r#"{"id": 42, "username": "crate_digger", "resource_url": ""}"#))
            }
        });

        let start = tokio::time::Instant::now();
        let identity = connector(mock_http).fetch_identity("s3cret").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(identity.username, "crate_digger");
    }

    #[tokio::test]
    async fn test_release_details_appends_token() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url == "https://api.test/releases/1867708?token=s3cret")
            .times(1)
            .returning(|_| {
                Ok(ok(
                    r#"{"id": 1867708, "tracklist": [{"type_": "track", "position": "A1", "title": "Out on the Weekend", "duration": "4:35"}]}"#,
                ))
            });

        let details = connector(mock_http)
            .fetch_release_details(&credentials(), "https://api.test/releases/1867708")
            .await
            .unwrap();
        assert_eq!(details.tracklist[0].duration, "4:35");
    }

    #[tokio::test]
    async fn test_release_details_requires_url() {
        let mock_http = MockHttpClient::new();
        let result = connector(mock_http)
            .fetch_release_details(&credentials(), "")
            .await;
        assert!(matches!(result, Err(DiscogsError::InvalidRequest(_))));
    }
}
