//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Local Store Handle                                 │
//! │                                                                         │
//! │  AppContext::build                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool settings, recreate policy                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool + migrations (+ recreate)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐   ┌──────────────────────────────┐       │
//! │  │       SqlitePool         │   │         ChangeFeed           │       │
//! │  │  WAL, NORMAL sync,       │   │  write lock + per-table      │       │
//! │  │  busy timeout            │   │  version counters            │       │
//! │  └────────────┬─────────────┘   └──────────────┬───────────────┘       │
//! │               └──────────────┬─────────────────┘                        │
//! │                              ▼                                          │
//! │      products() / pending_uploads() / notifications()                  │
//! │                                                                         │
//! │  Foreground adds and the background drain both write through here;    │
//! │  the store owns the locking discipline, not the engine.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::live::ChangeFeed;
use crate::migrations;
use crate::repository::notification::NotificationRepository;
use crate::repository::pending::PendingUploadRepository;
use crate::repository::product::ProductRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/stockline.db")
///     .max_connections(4)
///     .recreate_on_incompatible(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long a connection waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps them forever.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Delete and recreate the database when its schema is incompatible.
    /// Default: true
    pub recreate_on_incompatible: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            recreate_on_incompatible: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets whether an incompatible database is recreated or reported.
    pub fn recreate_on_incompatible(mut self, recreate: bool) -> Self {
        self.recreate_on_incompatible = recreate;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A plain `:memory:` database lives and dies with its connection, so
    /// the pool holds exactly one connection and never lets it idle out.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
            recreate_on_incompatible: false,
        }
    }

    /// True for `:memory:` configurations.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Clones share the pool and the change feed.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::in_memory()).await?;
/// let queued = db.pending_uploads().count().await?;
/// let mut unread = db.notifications().watch_unviewed_count();
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Write lock and live-query versions.
    feed: ChangeFeed,

    /// Where the data lives, `:memory:` for test databases.
    path: PathBuf,
}

impl Database {
    /// Opens (or creates) the local store.
    ///
    /// ## What This Does
    /// 1. Creates the database file and its parent directory if missing
    /// 2. Configures WAL, NORMAL synchronous and the busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    /// 5. On an incompatible schema, deletes the file and starts over
    ///    (if `recreate_on_incompatible`)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        if !config.is_in_memory() {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let pool = connect(&config).await?;

        if !config.run_migrations {
            return Ok(Database::from_pool(pool, config.database_path));
        }

        match migrations::run_migrations(&pool).await {
            Ok(()) => Ok(Database::from_pool(pool, config.database_path)),

            Err(err)
                if err.is_incompatible_schema()
                    && config.recreate_on_incompatible
                    && !config.is_in_memory() =>
            {
                warn!(
                    error = %err,
                    path = %config.database_path.display(),
                    "Local schema is incompatible, recreating database"
                );

                pool.close().await;
                remove_database_files(&config.database_path)?;

                let pool = connect(&config).await?;
                migrations::run_migrations(&pool).await?;
                Ok(Database::from_pool(pool, config.database_path))
            }

            Err(err) => {
                pool.close().await;
                Err(err)
            }
        }
    }

    fn from_pool(pool: SqlitePool, path: PathBuf) -> Self {
        Database {
            pool,
            feed: ChangeFeed::new(),
            path,
        }
    }

    /// Runs database migrations.
    ///
    /// Called by `new()` unless `run_migrations` is false.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the change feed backing live queries.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the product cache repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.feed.clone())
    }

    /// Returns the pending upload (write queue) repository.
    pub fn pending_uploads(&self) -> PendingUploadRepository {
        PendingUploadRepository::new(self.pool.clone(), self.feed.clone())
    }

    /// Returns the notification repository.
    pub fn notifications(&self) -> NotificationRepository {
        NotificationRepository::new(self.pool.clone(), self.feed.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn connect(config: &DbConfig) -> DbResult<SqlitePool> {
    let connect_options = if config.is_in_memory() {
        SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.database_path)
            // WAL: the background drain can write while the UI reads
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true)
    };
    let connect_options = connect_options.busy_timeout(config.busy_timeout);

    debug!("Connection options configured");

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout);

    if config.is_in_memory() {
        pool_options = pool_options.max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

    info!(max_connections = config.max_connections, "Database pool created");
    Ok(pool)
}

/// Deletes the database file and its WAL side files.
fn remove_database_files(path: &Path) -> DbResult<()> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        candidates.push(PathBuf::from(side));
    }

    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => debug!(path = %candidate.display(), "Removed database file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/stockline-test.db")
            .max_connections(10)
            .min_connections(2)
            .recreate_on_incompatible(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.recreate_on_incompatible);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    async fn plant_unknown_migration(path: &Path) {
        let db = Database::new(DbConfig::new(path)).await.unwrap();
        db.pending_uploads()
            .enqueue(&stockline_core::NewProduct::new("Pen", "Stationery", 10.0, 5.0), None)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time) \
             VALUES (9999, 'from the future', 1, x'00', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_incompatible_schema_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockline.db");
        plant_unknown_migration(&path).await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.pending_uploads().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_incompatible_schema_reported_when_recreate_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockline.db");
        plant_unknown_migration(&path).await;

        let result = Database::new(DbConfig::new(&path).recreate_on_incompatible(false)).await;

        assert!(matches!(result, Err(DbError::IncompatibleSchema(_))));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stockline.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();

        assert!(db.health_check().await);
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
