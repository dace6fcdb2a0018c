//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("collection-mirror/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Performs a single attempt per request. Rate-limit handling lives with the
/// upstream connector, which understands the status codes it gets back.
pub struct ReqwestHttpClient {
    client: Client,
}

/// Builder for [`ReqwestHttpClient`]
#[derive(Debug, Clone)]
pub struct ReqwestHttpClientBuilder {
    user_agent: String,
    timeout: Duration,
    connect_timeout: Duration,
}

impl Default for ReqwestHttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReqwestHttpClientBuilder {
    /// User-Agent sent on every request
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound for a whole request; per-request timeouts may shorten it
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build(self) -> Result<ReqwestHttpClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(4)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestHttpClient { client })
    }
}

impl ReqwestHttpClient {
    pub fn builder() -> ReqwestHttpClientBuilder {
        ReqwestHttpClientBuilder::default()
    }

    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self.client.get(&request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Request URLs carry the user token, so the URL is dropped from the message
    fn classify_error(error: reqwest::Error) -> BridgeError {
        let error = error.without_url();
        if error.is_timeout() {
            BridgeError::Timeout(error.to_string())
        } else if error.is_connect() {
            BridgeError::Connection(error.to_string())
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(headers = request.headers.len(), "Executing HTTP request");

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| {
                let error = Self::classify_error(e);
                warn!(error = %error, "HTTP request failed");
                error
            })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(Self::classify_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
