//! # Sync Record State Machine
//!
//! A sync record is created `in_progress` when a run starts and mutated
//! exactly once when it ends.
//!
//! ```text
//! (idle) → InProgress → Complete
//!              ↓
//!            Failed
//! ```
//!
//! Records are never deleted except by abandoned-sync cleanup.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// ID Types
// ============================================================================

/// Identifier of a sync record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(pub i64);

impl SyncId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SyncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SyncId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a sync record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Complete,
    Failed,
}

impl SyncStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Complete | SyncStatus::Failed)
    }

    /// Only an in-progress record may move, and only to a terminal state
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        matches!(self, SyncStatus::InProgress) && next.is_terminal()
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Complete => "complete",
            SyncStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(SyncStatus::InProgress),
            "complete" => Ok(SyncStatus::Complete),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync Record
// ============================================================================

/// One sync run as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: SyncId,
    /// Unix timestamp when the run started
    pub sync_start: i64,
    /// Unix timestamp when the run ended, unset while in progress
    pub sync_end: Option<i64>,
    pub status: SyncStatus,
}

impl SyncRecord {
    pub fn is_in_progress(&self) -> bool {
        self.status == SyncStatus::InProgress
    }

    /// Seconds between the start of this run and `now`
    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.sync_start)
    }

    /// Validate a transition to `next`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the record is in progress and
    /// `next` is terminal.
    pub fn check_transition(&self, next: SyncStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(SyncError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
                reason: format!("sync {} has already finished", self.id),
            })
        }
    }
}
