//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the collection mirror:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the validated configuration
//! that the upstream connector and the sync engine are built from.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
