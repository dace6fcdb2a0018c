//! Core service façade and bootstrap helpers.
//!
//! This crate wires the configured bridges (HTTP client, clock) into the
//! collection mirror: the SQLite store, the Discogs connector and the sync
//! coordinator. Desktop hosts typically enable the `desktop-shims` feature,
//! which lets [`CoreConfig`] fall back to `bridge-desktop`'s reqwest client.
//!
//! Reads never wait on the network. [`CoreService::get_collection`] returns
//! what is stored and, when the mirror is stale, starts a sync in the
//! background and reports `syncing = true`.

pub mod error;

pub use core_library::repositories::{Page, PageRequest};
pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestHttpClient;

use bridge_traits::time::Clock;
use core_library::models::{Folder, Release, User};
use core_library::repositories::{
    FolderRepository, ReleaseRepository, SqliteFolderRepository, SqliteReleaseRepository,
    SqliteUserRepository, UserRepository,
};
use core_library::{create_pool, DatabaseConfig};
use core_runtime::config::{CoreConfig, SyncSettings};
use core_sync::{SyncCoordinator, SyncHandle, SyncRecord};
use provider_discogs::{CollectionSource, DiscogsConnector, RateLimitSnapshot, RateLimitTracker};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What a collection read returns
#[derive(Debug, Clone, Serialize)]
pub struct CollectionView {
    pub releases: Page<Release>,
    pub folders: Vec<Folder>,
    /// Latest sync record before any resync this read triggered
    pub last_sync: Option<SyncRecord>,
    /// The data is being refreshed in the background
    pub syncing: bool,
}

/// Answer to the sync-status query
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusView {
    pub latest: Option<SyncRecord>,
    pub syncing: bool,
    /// Releases held in the mirror
    pub releases: i64,
    pub rate_limit: RateLimitSnapshot,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    pool: SqlitePool,
    source: Arc<dyn CollectionSource>,
    coordinator: SyncCoordinator,
    users: Arc<dyn UserRepository>,
    folders: Arc<dyn FolderRepository>,
    releases: Arc<dyn ReleaseRepository>,
    clock: Arc<dyn Clock>,
}

impl CoreService {
    /// Open the database and wire the service from a validated config
    ///
    /// Any sync left `in_progress` by a previous process is marked failed.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path))
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let rate_limits = Arc::new(RateLimitTracker::new());
        let connector = DiscogsConnector::new(
            config.http_client.clone(),
            config.discogs.clone(),
            rate_limits.clone(),
        );

        Self::with_dependencies(
            pool,
            Arc::new(connector),
            rate_limits,
            config.clock.clone(),
            config.sync.clone(),
        )
        .await
    }

    /// Wire the service over an existing pool and upstream source
    pub async fn with_dependencies(
        pool: SqlitePool,
        source: Arc<dyn CollectionSource>,
        rate_limits: Arc<RateLimitTracker>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Result<Self> {
        let coordinator = SyncCoordinator::new(
            pool.clone(),
            source.clone(),
            rate_limits,
            clock.clone(),
            settings,
        );

        let recovered = coordinator.cleanup_abandoned_syncs().await?;
        if recovered > 0 {
            warn!(recovered, "Marked syncs from a previous run as failed");
        }

        info!("Core service ready");
        Ok(Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            folders: Arc::new(SqliteFolderRepository::new(pool.clone())),
            releases: Arc::new(SqliteReleaseRepository::new(pool.clone())),
            pool,
            source,
            coordinator,
            clock,
        })
    }

    /// Stored releases and folders, triggering a background resync if stale
    ///
    /// Sync problems are never returned here; they show up in
    /// [`sync_status`](Self::sync_status).
    pub async fn get_collection(
        &self,
        folder_id: Option<i64>,
        page: PageRequest,
    ) -> Result<CollectionView> {
        let freshness = self.coordinator.ensure_fresh().await;
        self.collection_view(folder_id, page, freshness.last_sync, freshness.syncing).await
    }

    /// Stored releases and folders as they are, never starting a sync
    pub async fn stored_collection(
        &self,
        folder_id: Option<i64>,
        page: PageRequest,
    ) -> Result<CollectionView> {
        let last_sync = self.coordinator.latest_sync().await?;
        let syncing = self.coordinator.is_sync_active().await;
        self.collection_view(folder_id, page, last_sync, syncing).await
    }

    async fn collection_view(
        &self,
        folder_id: Option<i64>,
        page: PageRequest,
        last_sync: Option<SyncRecord>,
        syncing: bool,
    ) -> Result<CollectionView> {
        Ok(CollectionView {
            releases: self.releases.list_releases(folder_id, page).await?,
            folders: self.folders.get_folders().await?,
            last_sync,
            syncing,
        })
    }

    /// Wait for any sync running in this process, including one a read started
    pub async fn wait_for_sync(&self) {
        self.coordinator.wait_until_idle().await;
    }

    pub async fn sync_status(&self) -> Result<SyncStatusView> {
        Ok(SyncStatusView {
            latest: self.coordinator.latest_sync().await?,
            syncing: self.coordinator.is_sync_active().await,
            releases: self.releases.count().await?,
            rate_limit: self.rate_limit().await,
        })
    }

    /// Start a sync now regardless of staleness
    pub async fn resync(&self) -> Result<SyncHandle> {
        Ok(self.coordinator.start_sync().await?)
    }

    /// Resolve the token's username upstream and store it as the local user
    #[instrument(skip(self, token))]
    pub async fn register_token(&self, token: &str) -> Result<User> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CoreError::InvalidInput("token must not be empty".to_string()));
        }

        let identity = self.source.fetch_identity(token).await?;
        let user = User::new(identity.username, token);
        self.users
            .save_user(&user, self.clock.unix_timestamp())
            .await?;

        info!(username = %user.username, "Registered user");
        Ok(user)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.users.get_user().await?)
    }

    pub async fn rate_limit(&self) -> RateLimitSnapshot {
        self.coordinator.rate_limits().current().await
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
