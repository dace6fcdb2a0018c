//! # Collection Sync Module
//!
//! Keeps the local mirror of a Discogs collection up to date.
//!
//! ## Overview
//!
//! This module manages the lifecycle of sync runs, including:
//! - Guarding the single in-progress sync record
//! - Walking folder pages upstream and reconciling each page in one transaction
//! - Backfilling track lists and playback durations for releases missing them
//! - Deciding on the read path whether the mirror is stale
//!
//! ## Components
//!
//! - **Sync Record State Machine** (`job`): Status values and validated transitions
//! - **Repository** (`repository`): Persistence for sync records and crash recovery
//! - **Reconciler** (`reconciler`): Idempotent per-page upserts of releases and their sub-entities
//! - **Duration Resolver** (`duration`): Exact track sums with a format-based estimate fallback
//! - **Outcomes** (`outcome`): Per-folder and per-item accumulators with the fatal verdict
//! - **Staleness Policy** (`staleness`): Freshness decision for the latest sync record
//! - **Sync Coordinator** (`coordinator`): Runs syncs on a background task

pub mod coordinator;
pub mod duration;
pub mod error;
pub mod job;
pub mod outcome;
pub mod reconciler;
pub mod repository;
pub mod staleness;

pub use coordinator::{FreshnessReport, SyncCoordinator, SyncHandle, SyncReport};
pub use duration::{
    estimate_by_format, parse_duration, resolve_item_duration, tracks_from_details,
    DurationResolution,
};
pub use error::{Result, SyncError};
pub use job::{SyncId, SyncRecord, SyncStatus};
pub use outcome::{BackfillOutcome, SyncOutcome};
pub use reconciler::Reconciler;
pub use repository::{SqliteSyncRecordRepository, SyncRecordRepository};
pub use staleness::{Freshness, StalenessPolicy};
