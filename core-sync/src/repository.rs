//! # Sync Record Repository
//!
//! Persistence for sync records, including the start-of-run critical section
//! and crash recovery.

use crate::{Result, SyncError, SyncId, SyncRecord, SyncStatus};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for sync record persistence
#[async_trait]
pub trait SyncRecordRepository: Send + Sync {
    /// Insert a new in-progress record unless one already exists
    ///
    /// The check and the insert happen in one statement, so concurrent
    /// callers on any connection cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` carrying the running record's id when a
    /// sync is already in progress.
    async fn start_sync(&self, now: i64) -> Result<SyncRecord>;

    /// Finish an in-progress record as complete or failed
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidStateTransition` if
    /// the record already finished.
    async fn complete_sync(&self, id: SyncId, success: bool, now: i64) -> Result<SyncRecord>;

    /// The most recent record, if any
    async fn latest(&self) -> Result<Option<SyncRecord>>;

    async fn find_by_id(&self, id: SyncId) -> Result<Option<SyncRecord>>;

    /// Most recent records first
    async fn history(&self, limit: u32) -> Result<Vec<SyncRecord>>;

    /// Mark every in-progress record failed, deleting them if that fails
    ///
    /// Returns how many records were cleaned up.
    async fn cleanup_abandoned(&self, now: i64) -> Result<u64>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SyncRecordRepository
pub struct SqliteSyncRecordRepository {
    pool: SqlitePool,
}

impl SqliteSyncRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn in_progress_id(&self) -> Result<Option<i64>> {
        let id = sqlx::query_scalar(
            "SELECT id FROM syncs WHERE status = 'in_progress' ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Database row representation of a sync record
#[derive(Debug, FromRow)]
struct SyncRecordRow {
    id: i64,
    sync_start: i64,
    sync_end: Option<i64>,
    status: String,
}

impl TryFrom<SyncRecordRow> for SyncRecord {
    type Error = SyncError;

    fn try_from(row: SyncRecordRow) -> Result<Self> {
        Ok(SyncRecord {
            id: SyncId(row.id),
            sync_start: row.sync_start,
            sync_end: row.sync_end,
            status: row.status.parse()?,
        })
    }
}

#[async_trait]
impl SyncRecordRepository for SqliteSyncRecordRepository {
    async fn start_sync(&self, now: i64) -> Result<SyncRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO syncs (sync_start, status)
            SELECT ?, 'in_progress'
            WHERE NOT EXISTS (SELECT 1 FROM syncs WHERE status = 'in_progress')
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let sync_id = self.in_progress_id().await?.unwrap_or_default();
            return Err(SyncError::SyncInProgress { sync_id });
        }

        Ok(SyncRecord {
            id: SyncId(result.last_insert_rowid()),
            sync_start: now,
            sync_end: None,
            status: SyncStatus::InProgress,
        })
    }

    async fn complete_sync(&self, id: SyncId, success: bool, now: i64) -> Result<SyncRecord> {
        let next = if success {
            SyncStatus::Complete
        } else {
            SyncStatus::Failed
        };

        let result = sqlx::query(
            "UPDATE syncs SET status = ?, sync_end = ? WHERE id = ? AND status = 'in_progress'",
        )
        .bind(next.as_str())
        .bind(now)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        let record = self
            .find_by_id(id)
            .await?
            .ok_or(SyncError::NotFound { sync_id: id.0 })?;

        if result.rows_affected() == 0 {
            record.check_transition(next)?;
        }

        Ok(record)
    }

    async fn latest(&self) -> Result<Option<SyncRecord>> {
        let row = sqlx::query_as::<_, SyncRecordRow>(
            "SELECT id, sync_start, sync_end, status FROM syncs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: SyncId) -> Result<Option<SyncRecord>> {
        let row = sqlx::query_as::<_, SyncRecordRow>(
            "SELECT id, sync_start, sync_end, status FROM syncs WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncRecord::try_from).transpose()
    }

    async fn history(&self, limit: u32) -> Result<Vec<SyncRecord>> {
        let rows = sqlx::query_as::<_, SyncRecordRow>(
            "SELECT id, sync_start, sync_end, status FROM syncs ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncRecord::try_from).collect()
    }

    async fn cleanup_abandoned(&self, now: i64) -> Result<u64> {
        let updated = sqlx::query(
            "UPDATE syncs SET status = 'failed', sync_end = ? WHERE status = 'in_progress'",
        )
        .bind(now)
        .execute(&self.pool)
        .await;

        let cleaned = match updated {
            Ok(result) => result.rows_affected(),
            Err(e) => {
                warn!(error = %e, "Failed to mark abandoned syncs failed, deleting them");
                sqlx::query("DELETE FROM syncs WHERE status = 'in_progress'")
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
        };

        if cleaned > 0 {
            info!(cleaned, "Cleaned up abandoned syncs");
        }
        Ok(cleaned)
    }
}
