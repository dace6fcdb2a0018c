//! # Host Bridge Traits
//!
//! Capability seams between the collection engine and the host it runs on.
//!
//! ## Overview
//!
//! The engine never talks to the network or the wall clock directly. It goes
//! through the traits defined here so that desktop builds can plug in real
//! adapters (see `bridge-desktop`) while tests inject scripted ones.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP request execution
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep the original message so the
//! caller can log something actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; adapters are shared behind `Arc`
//! between the read path and the background sync task.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use time::{Clock, ManualClock, SystemClock};
