//! Process-wide view of the upstream request budget
//!
//! Every upstream response carries the current budget in three headers. The
//! tracker keeps the latest values behind a reader/writer lock so the sync
//! task can update them while read paths inspect them.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const LIMIT_HEADER: &str = "X-Discogs-Ratelimit";
pub const USED_HEADER: &str = "X-Discogs-Ratelimit-Used";
pub const REMAINING_HEADER: &str = "X-Discogs-Ratelimit-Remaining";

/// Remaining requests at or below which callers should pause
pub const THROTTLE_THRESHOLD: u32 = 10;

/// Point-in-time copy of the request budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
}

impl RateLimitSnapshot {
    pub fn should_throttle(&self) -> bool {
        self.remaining <= THROTTLE_THRESHOLD
    }
}

/// Shared tracker, constructed once and handed to every connector
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    snapshot: RwLock<RateLimitSnapshot>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot from response headers
    ///
    /// Missing or malformed values are logged and recorded as zero; a
    /// degraded signal only makes callers throttle sooner.
    pub async fn update(&self, headers: &HashMap<String, String>) {
        let next = RateLimitSnapshot {
            limit: parse_header(headers, LIMIT_HEADER),
            used: parse_header(headers, USED_HEADER),
            remaining: parse_header(headers, REMAINING_HEADER),
        };

        *self.snapshot.write().await = next;
        debug!(
            limit = next.limit,
            used = next.used,
            remaining = next.remaining,
            "Rate limit updated"
        );
    }

    pub async fn should_throttle(&self) -> bool {
        self.snapshot.read().await.should_throttle()
    }

    pub async fn current(&self) -> RateLimitSnapshot {
        *self.snapshot.read().await
    }
}

fn parse_header(headers: &HashMap<String, String>, name: &str) -> u32 {
    let value = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim());

    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(header = name, value = raw, "Unparseable rate limit header");
            0
        }),
        None => {
            warn!(header = name, "Missing rate limit header");
            0
        }
    }
}
