//! # Core Configuration Module
//!
//! Provides configuration management for the collection mirror.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all dependencies and settings the engine needs. It
//! enforces fail-fast validation so a misconfigured host finds out at startup,
//! not halfway through a sync.
//!
//! ## Required Settings
//!
//! - `database_path` - Location of the SQLite mirror
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, a `ReqwestHttpClient` is
//! injected automatically if none is provided, configured with the upstream
//! User-Agent and the longest upstream timeout.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DiscogsApiConfig, SyncSettings};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/collection.db")
//!     .discogs_api_config(
//!         DiscogsApiConfig::new().with_user_agent("MyRecordShelf/1.0 +https://example.com"),
//!     )
//!     .sync_settings(SyncSettings::default().with_staleness_threshold(Duration::from_secs(6 * 3600)))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default upstream API root
pub const DEFAULT_API_BASE_URL: &str = "https://api.discogs.com";

/// Largest page the upstream collection endpoint will serve
pub const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound on automatic 429 retries per request
pub const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Core configuration for the collection mirror.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// HTTP client used for every upstream call
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for sync timestamps and staleness checks
    pub clock: Arc<dyn Clock>,

    /// Upstream API settings
    pub discogs: DiscogsApiConfig,

    /// Sync engine pacing and freshness settings
    pub sync: SyncSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("http_client", &"Arc<dyn HttpClient>")
            .field("clock", &"Arc<dyn Clock>")
            .field("discogs", &self.discogs)
            .field("sync", &self.sync)
            .finish()
    }
}

/// Upstream catalog API configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscogsApiConfig {
    /// API root, without trailing slash
    pub base_url: String,

    /// Descriptive User-Agent, required by the upstream on every call
    ///
    /// Format: "ApplicationName/Version +ContactUrl"
    pub user_agent: String,

    /// Timeout for lightweight endpoints (folder list, identity)
    pub light_timeout: Duration,

    /// Timeout for paginated collection pages and release details
    pub heavy_timeout: Duration,

    /// How many times a 429 response is retried before surfacing
    pub max_rate_limit_retries: u32,

    /// Backoff used when a 429 carries no usable `Retry-After`
    pub default_retry_after: Duration,
}

impl Default for DiscogsApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscogsApiConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: concat!("CollectionMirror/", env!("CARGO_PKG_VERSION")).to_string(),
            light_timeout: Duration::from_secs(10),
            heavy_timeout: Duration::from_secs(30),
            max_rate_limit_retries: 1,
            default_retry_after: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeouts(mut self, light: Duration, heavy: Duration) -> Self {
        self.light_timeout = light;
        self.heavy_timeout = heavy;
        self
    }

    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    pub fn with_default_retry_after(mut self, delay: Duration) -> Self {
        self.default_retry_after = delay;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        if !self.user_agent.contains('/') {
            return Err(Error::Config(
                "User agent must follow format: 'AppName/Version +ContactUrl'".to_string(),
            ));
        }

        if self.light_timeout.is_zero() || self.heavy_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeouts must be greater than zero".to_string(),
            ));
        }

        if self.max_rate_limit_retries > MAX_RATE_LIMIT_RETRIES {
            return Err(Error::Config(format!(
                "Rate limit retries exceed maximum of {}",
                MAX_RATE_LIMIT_RETRIES
            )));
        }

        Ok(())
    }
}

/// Sync engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Releases requested per collection page
    pub page_size: u32,

    /// Courtesy delay between successful page fetches
    pub page_delay: Duration,

    /// Pause applied during the duration backfill when the rate limit runs low
    pub throttle_pause: Duration,

    /// Age of the last sync after which a read triggers a background resync
    pub staleness_threshold: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_secs(1),
            throttle_pause: Duration::from_secs(15),
            staleness_threshold: Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl SyncSettings {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_throttle_pause(mut self, pause: Duration) -> Self {
        self.throttle_pause = pause;
        self
    }

    pub fn with_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    /// Settings with every pacing delay removed, for tests and replays
    pub fn without_delays(self) -> Self {
        self.with_page_delay(Duration::ZERO)
            .with_throttle_pause(Duration::ZERO)
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size exceeds upstream maximum of {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.staleness_threshold.is_zero() {
            return Err(Error::Config(
                "Staleness threshold must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.discogs.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(api: &DiscogsApiConfig) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::builder()
        .user_agent(api.user_agent.clone())
        .timeout(api.heavy_timeout)
        .build()
        .map_err(|e| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: e.to_string(),
        })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_api: &DiscogsApiConfig) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject a platform-native adapter."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    discogs: Option<DiscogsApiConfig>,
    sync: Option<SyncSettings>,
}

impl CoreConfigBuilder {
    /// Sets the database file path (required)
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the upstream API configuration
    pub fn discogs_api_config(mut self, config: DiscogsApiConfig) -> Self {
        self.discogs = Some(config);
        self
    }

    /// Sets the sync engine settings
    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database path is missing
    /// - No HTTP client was given and no platform default is available
    /// - Any setting fails validation
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let discogs = self.discogs.unwrap_or_default();
        discogs.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&discogs)?,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            discogs,
            sync: self.sync.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
