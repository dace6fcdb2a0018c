//! # Mirror Store
//!
//! Opens the SQLite database that holds the collection mirror.
//!
//! The sync task writes while the read path queries, so file databases run
//! in WAL mode with a busy timeout long enough to cover one page commit.
//! Foreign keys are enforced so child rows follow their release. Migrations
//! are embedded at compile time and applied on every open.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("data/collection.db")).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tables every migrated mirror must contain
const MIRROR_TABLES: &[&str] = &[
    "users",
    "folders",
    "releases",
    "artists",
    "labels",
    "release_artists",
    "release_labels",
    "formats",
    "format_descriptions",
    "genres",
    "styles",
    "release_genres",
    "release_styles",
    "release_notes",
    "tracks",
    "syncs",
];

/// Where the mirror lives and how the pool behaves
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file, `None` for a private in-memory database
    pub path: Option<PathBuf>,

    pub max_connections: u32,

    /// How long a statement waits on a lock held by another connection
    pub busy_timeout: Duration,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            max_connections: 5,
            busy_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// A private in-memory database
    ///
    /// Uses a single connection, since each in-memory connection would
    /// otherwise see its own empty database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_connections: 1,
            busy_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            None => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };

        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the mirror, creating the file and its directory if needed
///
/// # Errors
///
/// Fails if the directory cannot be created, the database cannot be opened,
/// a migration fails, or the migrated schema is missing a mirror table.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    if let Some(path) = &config.path {
        ensure_parent_dir(path)?;
    }

    info!(
        path = ?config.path,
        max_connections = config.max_connections,
        "Opening collection mirror"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    verify_schema(&pool).await?;

    Ok(pool)
}

/// In-memory mirror with migrations applied
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            debug!(dir = %dir.display(), "Creating database directory");
            std::fs::create_dir_all(dir).map_err(|e| LibraryError::InvalidInput {
                field: "database_path".to_string(),
                message: format!("cannot create {}: {}", dir.display(), e),
            })
        }
        _ => Ok(()),
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    debug!("Migrations applied");
    Ok(())
}

/// Check that the mirror tables exist
pub async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<&str> = MIRROR_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|name| name == table))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LibraryError::Migration(format!(
            "missing tables: {}",
            missing.join(", ")
        )))
    }
}
