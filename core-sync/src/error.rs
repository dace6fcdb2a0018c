use core_library::LibraryError;
use provider_discogs::DiscogsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync {sync_id} already in progress")]
    SyncInProgress { sync_id: i64 },

    #[error("Sync record {sync_id} not found")]
    NotFound { sync_id: i64 },

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Upstream error: {0}")]
    Provider(#[from] DiscogsError),

    #[error("No user registered")]
    MissingUser,

    #[error("Invalid upstream record: {0}")]
    InvalidRecord(String),

    #[error("All {failed} folders failed, last error: {last_error}")]
    AllFoldersFailed { failed: usize, last_error: String },

    #[error("Duration backfill failed for all {failed} attempted releases, last error: {last_error}")]
    BackfillFailed { failed: usize, last_error: String },

    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Whether the error must end the whole sync run
    ///
    /// Storage failures are fatal because a half-written mirror cannot be
    /// trusted; upstream and data-validation failures only cost the current
    /// folder or release.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Database(_)
            | SyncError::AllFoldersFailed { .. }
            | SyncError::BackfillFailed { .. } => true,
            SyncError::Library(e) => {
                matches!(e, LibraryError::Database(_) | LibraryError::Migration(_))
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(error: sqlx::Error) -> Self {
        SyncError::Database(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
