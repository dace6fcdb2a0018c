//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//!
//! The clock bridge needs no desktop adapter; `bridge_traits::SystemClock`
//! already reads the OS clock.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::builder()
//!     .user_agent("CollectionMirror/0.1 +https://example.com")
//!     .timeout(Duration::from_secs(30))
//!     .build()?;
//! ```

mod http;

pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
