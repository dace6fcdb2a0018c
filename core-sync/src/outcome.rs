//! Accumulators for partial-failure phases of a sync run
//!
//! A run keeps going when a single folder or release fails. These types
//! count what happened so the verdict is a pure function of the totals.

use serde::Serialize;

/// Result of the folder/page phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub folders_attempted: usize,
    pub folders_succeeded: usize,
    pub folders_failed: usize,
    pub releases_saved: usize,
    pub last_error: Option<String>,
}

impl SyncOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_folder_success(&mut self, releases_saved: usize) {
        self.folders_attempted += 1;
        self.folders_succeeded += 1;
        self.releases_saved += releases_saved;
    }

    /// A folder that failed part way still keeps the pages it committed
    pub fn record_folder_failure(&mut self, releases_saved: usize, error: impl ToString) {
        self.folders_attempted += 1;
        self.folders_failed += 1;
        self.releases_saved += releases_saved;
        self.last_error = Some(error.to_string());
    }

    /// Every attempted folder failed and nothing was saved
    ///
    /// Zero folders attempted is an empty, successful run.
    pub fn is_fatal(&self) -> bool {
        self.folders_attempted > 0
            && self.folders_failed == self.folders_attempted
            && self.releases_saved == 0
    }
}

/// Result of the duration backfill phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub last_error: Option<String>,
}

impl BackfillOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, error: impl ToString) {
        self.attempted += 1;
        self.failed += 1;
        self.last_error = Some(error.to_string());
    }

    /// At least one release failed and none succeeded
    pub fn is_fatal(&self) -> bool {
        self.failed > 0 && self.succeeded == 0
    }
}
