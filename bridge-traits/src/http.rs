//! HTTP Client Abstraction
//!
//! Single-attempt async HTTP `GET` execution. The upstream catalog is only
//! ever read. Retry and rate-limit policy belong to the caller, which knows
//! what the upstream status codes mean.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// A `GET` request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Look up a header value, ignoring ASCII case.
    ///
    /// Adapters are free to normalise header names (reqwest lowercases them),
    /// so lookups must not depend on the casing the server used.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Lossy, length-capped body text for diagnostics
    pub fn body_excerpt(&self, max_chars: usize) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(max_chars)
            .collect()
    }
}

/// Async HTTP client trait
///
/// Implementations perform exactly one attempt per call and report transport
/// failures as [`BridgeError::Timeout`] or [`BridgeError::Connection`]. Any
/// HTTP status, including 429 and 5xx, comes back as an `Ok` response.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch(client: &dyn HttpClient) -> Result<u16> {
///     let request = HttpRequest::get("https://api.example.com/data")
///         .header("User-Agent", "ExampleApp/1.0");
///
///     let response = client.execute(request).await?;
///     Ok(response.status)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - TLS validation fails
    /// - Request times out
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::get("https://example.com")
            .header("User-Agent", "test")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = HttpResponse::new(200, "ok")
            .with_header("x-discogs-ratelimit-remaining", "42");

        assert_eq!(response.header("X-Discogs-Ratelimit-Remaining"), Some("42"));
        assert_eq!(response.header("Retry-After"), None);
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let response = HttpResponse::new(500, "abcdefghij");
        assert_eq!(response.body_excerpt(4), "abcd");
        assert_eq!(response.body_excerpt(100), "abcdefghij");
    }
}
