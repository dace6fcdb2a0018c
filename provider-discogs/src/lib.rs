//! # Discogs Provider
//!
//! Client for the upstream catalog API that the collection mirror follows.
//!
//! ## Overview
//!
//! This module provides:
//! - Wire types for folders, collection pages, release details and identity
//! - The [`CollectionSource`] seam the sync engine fetches through
//! - [`DiscogsConnector`], which authenticates every call, feeds the shared
//!   [`RateLimitTracker`] and retries 429 responses under a [`RetryPolicy`]
//!
//! Pagination walking is left to the caller; the connector fetches one page
//! per call.

pub mod connector;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod source;
pub mod types;

pub use connector::DiscogsConnector;
pub use error::{DiscogsError, Result};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker, THROTTLE_THRESHOLD};
pub use retry::RetryPolicy;
pub use source::{CollectionSource, Credentials};
