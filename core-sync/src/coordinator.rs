//! # Sync Coordinator
//!
//! Runs collection syncs against the upstream catalog on a background task.
//!
//! ## Workflow
//!
//! 1. Insert an `in_progress` sync record (rejected if one already exists)
//! 2. Load the local user and its token
//! 3. List folders upstream and upsert them, falling back to stored folders
//! 4. Walk every folder's pages, reconciling each page in one transaction
//! 5. Backfill tracks and durations for releases that have none, pausing
//!    whenever the rate limit runs low
//! 6. Mark the record `complete` or `failed`
//!
//! Folders and pages are processed strictly in sequence. A folder that fails
//! is counted and skipped; storage failures end the run.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//!
//! let handle = coordinator.start_sync().await?;
//! println!("Started sync {}", handle.sync_id());
//!
//! let report = handle.wait().await?;
//! println!("Saved {} releases", report.releases.releases_saved);
//! ```

use crate::{
    duration::{resolve_item_duration, tracks_from_details, DurationResolution},
    outcome::{BackfillOutcome, SyncOutcome},
    reconciler::Reconciler,
    repository::{SqliteSyncRecordRepository, SyncRecordRepository},
    staleness::{Freshness, StalenessPolicy},
    Result, SyncError, SyncId, SyncRecord, SyncStatus,
};
use bridge_traits::time::Clock;
use core_library::models::{Folder, Release};
use core_library::repositories::{
    FolderRepository, ReleaseRepository, SqliteFolderRepository, SqliteReleaseRepository,
    SqliteUserRepository, UserRepository,
};
use core_library::LibraryError;
use core_runtime::config::SyncSettings;
use provider_discogs::{CollectionSource, Credentials, RateLimitTracker};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// The folder upstream uses to list every release of a collection
const ALL_FOLDER_ID: i64 = 0;

/// Summary of a finished sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub sync_id: SyncId,
    pub status: SyncStatus,
    pub releases: SyncOutcome,
    pub backfill: BackfillOutcome,
}

/// What the read path learned about the mirror
#[derive(Debug)]
pub struct FreshnessReport {
    /// Latest sync record as it was before any resync was triggered
    pub last_sync: Option<SyncRecord>,
    pub freshness: Freshness,
    /// True when a sync is running, including one triggered by this check
    pub syncing: bool,
    /// The resync this check started, if any
    pub resync: Option<SyncHandle>,
}

/// Handle to a running sync
///
/// Dropping the handle detaches the task; the run still completes and
/// records its outcome.
#[derive(Debug)]
pub struct SyncHandle {
    sync_id: SyncId,
    task: JoinHandle<Result<SyncReport>>,
}

impl SyncHandle {
    pub fn sync_id(&self) -> SyncId {
        self.sync_id
    }

    /// Wait for the run to finish
    pub async fn wait(self) -> Result<SyncReport> {
        self.task
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))?
    }
}

/// Sync lifecycle controller
#[derive(Clone)]
pub struct SyncCoordinator {
    source: Arc<dyn CollectionSource>,
    rate_limits: Arc<RateLimitTracker>,
    records: Arc<dyn SyncRecordRepository>,
    users: Arc<dyn UserRepository>,
    folders: Arc<dyn FolderRepository>,
    releases: Arc<dyn ReleaseRepository>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    policy: StalenessPolicy,

    /// Sync run by this process, if any. Held across the start decision.
    active: Arc<Mutex<Option<SyncId>>>,
    /// True while no sync runs in this process
    idle: Arc<watch::Sender<bool>>,
}

impl SyncCoordinator {
    /// Create a coordinator over the given database and upstream source
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool (migrations applied)
    /// * `source` - Upstream collection source
    /// * `rate_limits` - Tracker shared with the source's connector
    /// * `clock` - Time source for record timestamps
    /// * `settings` - Page size, delays and staleness threshold
    pub fn new(
        pool: SqlitePool,
        source: Arc<dyn CollectionSource>,
        rate_limits: Arc<RateLimitTracker>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            rate_limits,
            records: Arc::new(SqliteSyncRecordRepository::new(pool.clone())),
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            folders: Arc::new(SqliteFolderRepository::new(pool.clone())),
            releases: Arc::new(SqliteReleaseRepository::new(pool.clone())),
            reconciler: Arc::new(Reconciler::new(pool, clock.clone())),
            policy: StalenessPolicy::new(settings.staleness_threshold),
            clock,
            settings,
            active: Arc::new(Mutex::new(None)),
            idle: Arc::new(watch::channel(true).0),
        }
    }

    /// Start a sync on a background task
    ///
    /// Returns as soon as the sync record exists.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` if this process is running a sync or the
    /// latest stored record is still in progress.
    #[instrument(skip(self))]
    pub async fn start_sync(&self) -> Result<SyncHandle> {
        let mut active = self.active.lock().await;
        self.start_locked(&mut active).await
    }

    async fn start_locked(&self, active: &mut Option<SyncId>) -> Result<SyncHandle> {
        if let Some(sync_id) = *active {
            return Err(SyncError::SyncInProgress { sync_id: sync_id.0 });
        }

        let record = self.records.start_sync(self.clock.unix_timestamp()).await?;
        let sync_id = record.id;
        *active = Some(sync_id);
        self.idle.send_replace(false);

        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.supervise(sync_id).await });

        info!(%sync_id, "Started sync");
        Ok(SyncHandle { sync_id, task })
    }

    /// Run the sync in its own task so a panic cannot leave the record
    /// dangling or the active slot taken
    async fn supervise(self, sync_id: SyncId) -> Result<SyncReport> {
        let worker = self.clone();
        let joined = tokio::spawn(async move { worker.run_sync(sync_id).await }).await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                error!(%sync_id, error = %e, "Sync task aborted");
                if let Err(cleanup) = self
                    .records
                    .cleanup_abandoned(self.clock.unix_timestamp())
                    .await
                {
                    error!(%sync_id, error = %cleanup, "Failed to clean up aborted sync");
                }
                Err(SyncError::TaskFailed(e.to_string()))
            }
        };

        let mut active = self.active.lock().await;
        if *active == Some(sync_id) {
            *active = None;
            self.idle.send_replace(true);
        }

        result
    }

    #[instrument(skip(self, sync_id), fields(sync_id = %sync_id))]
    async fn run_sync(&self, sync_id: SyncId) -> Result<SyncReport> {
        let result = self.execute_sync().await;

        let completed = self
            .records
            .complete_sync(sync_id, result.is_ok(), self.clock.unix_timestamp())
            .await;
        if let Err(e) = &completed {
            error!(error = %e, "Failed to record sync outcome");
            if let Err(cleanup) = self
                .records
                .cleanup_abandoned(self.clock.unix_timestamp())
                .await
            {
                error!(error = %cleanup, "Failed to clean up unrecorded sync");
            }
        }

        let (releases, backfill) = match result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "Sync failed");
                return Err(e);
            }
        };
        let record = completed?;

        info!(
            folders_succeeded = releases.folders_succeeded,
            folders_failed = releases.folders_failed,
            releases_saved = releases.releases_saved,
            backfilled = backfill.succeeded,
            backfill_failed = backfill.failed,
            "Sync completed"
        );

        Ok(SyncReport {
            sync_id,
            status: record.status,
            releases,
            backfill,
        })
    }

    async fn execute_sync(&self) -> Result<(SyncOutcome, BackfillOutcome)> {
        let user = self.users.get_user().await?.ok_or(SyncError::MissingUser)?;
        let credentials = Credentials::new(user.username, user.token);

        let folders = self.sync_folders(&credentials).await?;

        let releases = self.sync_releases(&credentials, &folders).await?;
        if releases.is_fatal() {
            return Err(SyncError::AllFoldersFailed {
                failed: releases.folders_failed,
                last_error: releases.last_error.clone().unwrap_or_default(),
            });
        }

        let backfill = self.backfill_durations(&credentials).await?;
        if backfill.is_fatal() {
            return Err(SyncError::BackfillFailed {
                failed: backfill.failed,
                last_error: backfill.last_error.clone().unwrap_or_default(),
            });
        }

        Ok((releases, backfill))
    }

    /// List folders upstream and store them
    ///
    /// Falls back to the stored folders when the listing fails.
    #[instrument(skip(self, credentials))]
    async fn sync_folders(&self, credentials: &Credentials) -> Result<Vec<Folder>> {
        let resources = match self.source.fetch_folders(credentials).await {
            Ok(resources) => resources,
            Err(e) => {
                let stored = self.folders.get_folders().await?;
                if stored.is_empty() {
                    return Err(SyncError::Provider(e));
                }
                warn!(error = %e, stored = stored.len(), "Folder listing failed, using stored folders");
                return Ok(stored);
            }
        };

        let now = self.clock.unix_timestamp();
        let mut folders = Vec::with_capacity(resources.len());
        for resource in resources {
            let folder = Folder {
                id: resource.id,
                name: resource.name,
                item_count: resource.count,
                resource_url: resource.resource_url,
                last_synced: Some(now),
            };

            match self.folders.upsert_folder(&folder, now).await {
                Ok(()) => folders.push(folder),
                Err(LibraryError::InvalidInput { message, .. }) => {
                    warn!(folder_id = folder.id, %message, "Skipping invalid folder");
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(count = folders.len(), "Folders stored");
        Ok(folders)
    }

    async fn sync_releases(
        &self,
        credentials: &Credentials,
        folders: &[Folder],
    ) -> Result<SyncOutcome> {
        let has_user_folders = folders.iter().any(|f| f.id != ALL_FOLDER_ID);
        let mut outcome = SyncOutcome::new();

        for folder in folders {
            if has_user_folders && folder.id == ALL_FOLDER_ID {
                debug!(folder_id = folder.id, "Skipping aggregate folder");
                continue;
            }

            let mut saved = 0;
            match self.sync_folder(credentials, folder.id, &mut saved).await {
                Ok(()) => outcome.record_folder_success(saved),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(folder_id = folder.id, saved, error = %e, "Folder sync failed");
                    outcome.record_folder_failure(saved, &e);
                }
            }
        }

        Ok(outcome)
    }

    /// Walk a folder's pages until one comes back empty or the last is done
    #[instrument(skip(self, credentials, saved))]
    async fn sync_folder(
        &self,
        credentials: &Credentials,
        folder_id: i64,
        saved: &mut usize,
    ) -> Result<()> {
        let mut page = 1;

        loop {
            let result = self
                .source
                .fetch_page(credentials, folder_id, page, self.settings.page_size)
                .await?;

            if result.releases.is_empty() {
                break;
            }

            *saved += self.reconciler.save_page(&result).await?;
            debug!(page, pages = result.pagination.pages, "Page reconciled");

            if page >= result.pagination.pages {
                break;
            }
            page += 1;
            pause(self.settings.page_delay).await;
        }

        Ok(())
    }

    #[instrument(skip(self, credentials))]
    async fn backfill_durations(&self, credentials: &Credentials) -> Result<BackfillOutcome> {
        let pending = self.releases.get_missing_duration().await?;
        let mut outcome = BackfillOutcome::new();
        info!(pending = pending.len(), "Backfilling durations");

        for release in pending {
            match self.backfill_release(credentials, &release).await {
                Ok(resolution) => {
                    debug!(
                        release_id = release.id,
                        seconds = resolution.seconds,
                        estimated = resolution.estimated,
                        "Duration stored"
                    );
                    outcome.record_success();
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(release_id = release.id, error = %e, "Duration backfill failed");
                    outcome.record_failure(&e);
                }
            }

            if self.rate_limits.should_throttle().await {
                let snapshot = self.rate_limits.current().await;
                info!(
                    remaining = snapshot.remaining,
                    pause_secs = self.settings.throttle_pause.as_secs(),
                    "Rate limit low, pausing"
                );
                pause(self.settings.throttle_pause).await;
            }
        }

        Ok(outcome)
    }

    async fn backfill_release(
        &self,
        credentials: &Credentials,
        release: &Release,
    ) -> Result<DurationResolution> {
        let details = self
            .source
            .fetch_release_details(credentials, &release.resource_url)
            .await?;

        let tracks = tracks_from_details(release.id, &details);
        let formats = self.releases.get_formats(release.id).await?;
        let resolution = resolve_item_duration(release.id, &tracks, &formats);

        self.releases.replace_tracks(release.id, &tracks).await?;
        self.releases
            .update_duration(
                release.id,
                resolution.seconds,
                resolution.estimated,
                self.clock.unix_timestamp(),
            )
            .await?;

        Ok(resolution)
    }

    /// Check the mirror's freshness and trigger a background resync if needed
    ///
    /// Never waits on upstream I/O and never fails: problems reading or
    /// recovering the latest record are logged and answered with a resync.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self) -> FreshnessReport {
        let mut active = self.active.lock().await;
        let now = self.clock.unix_timestamp();

        let last_sync = match self.records.latest().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "Failed to read latest sync");
                None
            }
        };

        let freshness = self.policy.evaluate(last_sync.as_ref(), *active, now);
        let mut syncing = freshness == Freshness::Syncing;
        let mut resync = None;

        if let Freshness::Abandoned(sync_id) = freshness {
            warn!(%sync_id, "Latest sync has no running task, marking it failed");
            if let Err(e) = self.records.cleanup_abandoned(now).await {
                warn!(error = %e, "Failed to clean up abandoned sync");
            }
        }

        if freshness.needs_resync() {
            match self.start_locked(&mut active).await {
                Ok(handle) => {
                    info!(sync_id = %handle.sync_id(), ?freshness, "Triggered background resync");
                    syncing = true;
                    resync = Some(handle);
                }
                Err(e) => warn!(error = %e, ?freshness, "Could not trigger resync"),
            }
        }

        FreshnessReport {
            last_sync,
            freshness,
            syncing,
            resync,
        }
    }

    /// Mark every in-progress record failed so a new sync can start
    ///
    /// Does nothing while this process is running a sync, since that sync
    /// owns the only in-progress record.
    pub async fn cleanup_abandoned_syncs(&self) -> Result<u64> {
        let active = self.active.lock().await;
        if let Some(sync_id) = *active {
            debug!(%sync_id, "Sync running, nothing abandoned");
            return Ok(0);
        }
        self.records.cleanup_abandoned(self.clock.unix_timestamp()).await
    }

    pub async fn latest_sync(&self) -> Result<Option<SyncRecord>> {
        self.records.latest().await
    }

    pub async fn sync_history(&self, limit: u32) -> Result<Vec<SyncRecord>> {
        self.records.history(limit).await
    }

    pub async fn active_sync(&self) -> Option<SyncId> {
        *self.active.lock().await
    }

    pub async fn is_sync_active(&self) -> bool {
        self.active_sync().await.is_some()
    }

    /// Wait until no sync runs in this process
    ///
    /// Returns at once when idle. Covers runs started by any caller,
    /// including the read path.
    pub async fn wait_until_idle(&self) {
        let mut idle = self.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limits
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::time::SystemClock;
    use core_library::create_test_pool;
    use core_library::models::User;
    use provider_discogs::types::{
        CollectionPage, FolderResource, Identity, Pagination, ReleaseDetails,
    };
    use provider_discogs::DiscogsError;

    /// Upstream that is down; folders stored locally read as empty
    struct Unreachable;

    #[async_trait]
    impl CollectionSource for Unreachable {
        async fn fetch_identity(&self, _token: &str) -> provider_discogs::Result<Identity> {
            Err(DiscogsError::Network("unreachable".to_string()))
        }

        async fn fetch_folders(
            &self,
            _credentials: &Credentials,
        ) -> provider_discogs::Result<Vec<FolderResource>> {
            Err(DiscogsError::Network("unreachable".to_string()))
        }

        async fn fetch_page(
            &self,
            _credentials: &Credentials,
            _folder_id: i64,
            page: u32,
            _per_page: u32,
        ) -> provider_discogs::Result<CollectionPage> {
            Ok(CollectionPage {
                pagination: Pagination {
                    page,
                    pages: 0,
                    per_page: 0,
                    items: 0,
                },
                releases: Vec::new(),
            })
        }

        async fn fetch_release_details(
            &self,
            _credentials: &Credentials,
            _resource_url: &str,
        ) -> provider_discogs::Result<ReleaseDetails> {
            Err(DiscogsError::Network("unreachable".to_string()))
        }
    }

    async fn coordinator(pool: SqlitePool) -> SyncCoordinator {
        SyncCoordinator::new(
            pool,
            Arc::new(Unreachable),
            Arc::new(RateLimitTracker::new()),
            Arc::new(SystemClock),
            SyncSettings::default().without_delays(),
        )
    }

    #[tokio::test]
    async fn test_sync_without_user_fails() {
        let coordinator = coordinator(create_test_pool().await.unwrap()).await;

        let handle = coordinator.start_sync().await.unwrap();
        let sync_id = handle.sync_id();
        assert!(matches!(handle.wait().await, Err(SyncError::MissingUser)));

        let latest = coordinator.latest_sync().await.unwrap().unwrap();
        assert_eq!(latest.id, sync_id);
        assert_eq!(latest.status, SyncStatus::Failed);
        assert!(!coordinator.is_sync_active().await);
    }

    #[tokio::test]
    async fn test_folder_listing_failure_without_stored_folders() {
        let pool = create_test_pool().await.unwrap();
        SqliteUserRepository::new(pool.clone())
            .save_user(&User::new("digger", "s3cret"), 1)
            .await
            .unwrap();
        let coordinator = coordinator(pool).await;

        let result = coordinator.start_sync().await.unwrap().wait().await;
        assert!(matches!(result, Err(SyncError::Provider(_))));
        assert_eq!(
            coordinator.latest_sync().await.unwrap().unwrap().status,
            SyncStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_stored_folders_used_when_listing_fails() {
        let pool = create_test_pool().await.unwrap();
        SqliteUserRepository::new(pool.clone())
            .save_user(&User::new("digger", "s3cret"), 1)
            .await
            .unwrap();
        SqliteFolderRepository::new(pool.clone())
            .upsert_folder(&Folder::new(1, "Uncategorized"), 1)
            .await
            .unwrap();
        let coordinator = coordinator(pool).await;

        let report = coordinator.start_sync().await.unwrap().wait().await.unwrap();
        assert_eq!(report.status, SyncStatus::Complete);
        assert_eq!(report.releases.folders_succeeded, 1);
        assert_eq!(report.releases.releases_saved, 0);
    }

    #[tokio::test]
    async fn test_cleanup_skipped_while_running() {
        let pool = create_test_pool().await.unwrap();
        let coordinator = coordinator(pool).await;

        let mut active = coordinator.active.lock().await;
        *active = Some(SyncId(42));
        drop(active);

        assert_eq!(coordinator.cleanup_abandoned_syncs().await.unwrap(), 0);
        assert!(matches!(
            coordinator.start_sync().await,
            Err(SyncError::SyncInProgress { sync_id: 42 })
        ));
    }
}
