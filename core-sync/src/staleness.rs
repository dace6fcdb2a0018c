//! # Staleness Policy
//!
//! Decides on the read path whether the mirror needs a background resync.

use crate::{SyncId, SyncRecord, SyncStatus};
use std::time::Duration;

/// Freshness of the mirror as seen from the latest sync record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Latest sync completed within the threshold
    Fresh,
    /// Latest sync completed, but started longer ago than the threshold
    Stale,
    /// No sync has ever been recorded
    Missing,
    /// Latest sync failed
    Failed,
    /// A sync is running in this process
    Syncing,
    /// Latest record is in progress but nothing here is running it
    Abandoned(SyncId),
}

impl Freshness {
    pub fn needs_resync(&self) -> bool {
        !matches!(self, Freshness::Fresh | Freshness::Syncing)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    threshold: Duration,
}

impl StalenessPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Classify the latest record
    ///
    /// `active` is the sync this process is currently running, if any.
    pub fn evaluate(
        &self,
        latest: Option<&SyncRecord>,
        active: Option<SyncId>,
        now: i64,
    ) -> Freshness {
        if active.is_some() {
            return Freshness::Syncing;
        }

        let Some(record) = latest else {
            return Freshness::Missing;
        };

        match record.status {
            SyncStatus::InProgress => Freshness::Abandoned(record.id),
            SyncStatus::Failed => Freshness::Failed,
            SyncStatus::Complete => {
                let threshold = i64::try_from(self.threshold.as_secs()).unwrap_or(i64::MAX);
                if record.age_secs(now) > threshold {
                    Freshness::Stale
                } else {
                    Freshness::Fresh
                }
            }
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(12 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;

    fn record(status: SyncStatus, sync_start: i64) -> SyncRecord {
        SyncRecord {
            id: SyncId(1),
            sync_start,
            sync_end: None,
            status,
        }
    }

    #[test]
    fn test_complete_within_threshold_is_fresh() {
        let policy = StalenessPolicy::default();
        let latest = record(SyncStatus::Complete, 0);

        assert_eq!(policy.evaluate(Some(&latest), None, 12 * HOUR), Freshness::Fresh);
        assert_eq!(policy.evaluate(Some(&latest), None, 12 * HOUR + 1), Freshness::Stale);
        assert!(Freshness::Stale.needs_resync());
        assert!(!Freshness::Fresh.needs_resync());
    }

    #[test]
    fn test_missing_and_failed_need_resync() {
        let policy = StalenessPolicy::default();

        assert_eq!(policy.evaluate(None, None, 0), Freshness::Missing);
        let failed = record(SyncStatus::Failed, 0);
        assert_eq!(policy.evaluate(Some(&failed), None, 1), Freshness::Failed);
        assert!(Freshness::Missing.needs_resync());
    }

    #[test]
    fn test_in_progress_depends_on_live_task() {
        let policy = StalenessPolicy::default();
        let running = record(SyncStatus::InProgress, 0);

        assert_eq!(
            policy.evaluate(Some(&running), Some(SyncId(1)), 10),
            Freshness::Syncing
        );
        assert_eq!(
            policy.evaluate(Some(&running), None, 10),
            Freshness::Abandoned(SyncId(1))
        );
        assert!(!Freshness::Syncing.needs_resync());
    }
}
