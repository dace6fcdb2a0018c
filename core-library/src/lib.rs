//! # Collection Library Module
//!
//! Owns the local mirror database and provides repository patterns for data
//! access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and embedded migrations
//! - Repositories for the local user, folders, releases and tracks
//! - Transaction-scoped collection writers used when reconciling upstream pages
//!
//! The sync engine decides *what* to write and in which order; this crate
//! only knows *how* each row is written.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
