//! Bounded retry policy for 429 responses

use core_runtime::config::DiscogsApiConfig;
use std::time::Duration;

/// How many times a rate-limited request is retried, and how long to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 1 means at most two requests
    pub max_retries: u32,
    /// Wait used when `Retry-After` is absent or malformed
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            default_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, default_retry_after: Duration) -> Self {
        Self {
            max_retries,
            default_retry_after,
        }
    }

    pub fn from_config(config: &DiscogsApiConfig) -> Self {
        Self::new(config.max_rate_limit_retries, config.default_retry_after)
    }

    /// Whether another attempt is allowed after `retries_so_far` retries
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// Wait requested by a `Retry-After` header given in whole seconds
    pub fn retry_after(&self, header: Option<&str>) -> Duration {
        header
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}
