//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations for the collection
//! mirror. Each trait is `Send + Sync` so it can be shared behind an `Arc`
//! between the read path and the background sync task.
//!
//! ## Available Repositories
//!
//! - `UserRepository` - The single local user and its access token
//! - `FolderRepository` - Upstream folders and when they were last listed
//! - `ReleaseRepository` - Releases, their formats and tracks, and duration backfill
//!
//! Writes that must land atomically with a whole collection page live in
//! [`collection`] as free functions over a borrowed connection, so the caller
//! owns the transaction.

pub mod collection;
pub mod folder;
pub mod pagination;
pub mod release;
pub mod user;

pub use collection::TagKind;
pub use folder::{FolderRepository, SqliteFolderRepository};
pub use pagination::{Page, PageRequest};
pub use release::{ReleaseRepository, SqliteReleaseRepository};
pub use user::{SqliteUserRepository, UserRepository};
