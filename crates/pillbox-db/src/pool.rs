//! # Database Pool Management
//!
//! Connection pool creation and the [`Database`] handle every repository
//! hangs off.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  App Startup (inside the tokio runtime)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool and worker sizes                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                            │
//! │  │            SqlitePool                   │  (max_connections)         │
//! │  ├─────────────────────────────────────────┤                            │
//! │  │            ChangeFeed                   │  (broadcast of tables)     │
//! │  ├─────────────────────────────────────────┤                            │
//! │  │  WorkerPool  medications        (4)     │                            │
//! │  │  WorkerPool  intake records     (2)     │                            │
//! │  │  WorkerPool  health diary       (2)     │                            │
//! │  │  WorkerPool  users              (2)     │                            │
//! │  └─────────────────────────────────────────┘                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.medications() / db.intake_records() / db.health_diary() / db.users()│
//! │  (cheap handles; clones share the pool, feed and workers)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so live queries can
//! read while a worker writes.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::changes::ChangeFeed;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    HealthDiaryRepository, IntakeRecordRepository, MedicationRepository, RepoContext,
    UserRepository,
};
use crate::worker::WorkerPool;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/pillbox.db")
///     .max_connections(5)
///     .medication_workers(4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Concurrent medication requests.
    /// Default: 4
    pub medication_workers: usize,

    /// Concurrent requests for each of intake records, the health diary
    /// and users.
    /// Default: 2
    pub record_workers: usize,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            medication_workers: 4,
            record_workers: 2,
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

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn medication_workers(mut self, workers: usize) -> Self {
        self.medication_workers = workers;
        self
    }

    pub fn record_workers(mut self, workers: usize) -> Self {
        self.record_workers = workers;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Isolated database, gone when `db` is dropped
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Must be created inside a tokio runtime; worker pools and live queries
/// run on that runtime.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./pillbox.db")).await?;
///
/// let mut list = db.medications().all();
/// while let Some(medications) = list.next().await {
///     render(&medications);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
    feed: ChangeFeed,
    handle: Handle,
    medication_workers: WorkerPool,
    intake_workers: WorkerPool,
    diary_workers: WorkerPool,
    user_workers: WorkerPool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys on
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    /// 5. Starts one worker pool per entity type
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Needed for the diary cascade
            .foreign_keys(true)
            .busy_timeout(config.connect_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let handle = Handle::current();
        let db = Database {
            pool,
            feed: ChangeFeed::new(),
            medication_workers: WorkerPool::new(
                "medications",
                config.medication_workers,
                handle.clone(),
            ),
            intake_workers: WorkerPool::new("intake_records", config.record_workers, handle.clone()),
            diary_workers: WorkerPool::new("health_diary", config.record_workers, handle.clone()),
            user_workers: WorkerPool::new("users", config.record_workers, handle.clone()),
            handle,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent; called by `new()` when `run_migrations` is set.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns `(total, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    ///
    /// For queries not covered by repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change feed repositories notify after each write.
    pub fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    fn context(&self, workers: &WorkerPool) -> RepoContext {
        RepoContext {
            pool: self.pool.clone(),
            feed: self.feed.clone(),
            workers: workers.clone(),
            handle: self.handle.clone(),
        }
    }

    /// Returns the medication repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let outcome = db.medications().insert(record, false).await;
    /// ```
    pub fn medications(&self) -> MedicationRepository {
        MedicationRepository::new(self.context(&self.medication_workers))
    }

    /// Returns the intake record repository.
    pub fn intake_records(&self) -> IntakeRecordRepository {
        IntakeRecordRepository::new(self.context(&self.intake_workers))
    }

    /// Returns the health diary repository.
    pub fn health_diary(&self) -> HealthDiaryRepository {
        HealthDiaryRepository::new(self.context(&self.diary_workers))
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.context(&self.user_workers))
    }

    /// Shuts down every worker pool, then closes the connection pool.
    ///
    /// ## Note
    /// After calling close, every repository request resolves with
    /// `RepositoryError::ShutDown`.
    pub async fn close(&self) {
        info!("Closing database");
        self.medication_workers.cleanup();
        self.intake_workers.cleanup();
        self.diary_workers.cleanup();
        self.user_workers.cleanup();
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    ///
    /// ## Returns
    /// * `true` - Database is responsive
    /// * `false` - Database is unavailable
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.migration_status().await.unwrap(), (3, 3));
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .medication_workers(8)
            .record_workers(3);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.medication_workers, 8);
        assert_eq!(config.record_workers, 3);

        let memory = DbConfig::in_memory();
        assert_eq!(memory.max_connections, 1);
        assert_eq!(memory.medication_workers, 4);
    }

    #[tokio::test]
    async fn test_close_shuts_down_every_repository() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
        assert!(matches!(
            db.intake_records().delete_by_id(1).await,
            Err(RepositoryError::ShutDown)
        ));
        assert!(matches!(db.users().get(1).await, Err(RepositoryError::ShutDown)));
    }

    #[tokio::test]
    async fn test_each_entity_type_shuts_down_alone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.health_diary().cleanup();

        let id = db.users().create("carol", None).await.unwrap();
        assert!(matches!(
            db.health_diary().add(id, "too late").await,
            Err(RepositoryError::ShutDown)
        ));

        db.users().cleanup();
        assert!(matches!(db.users().get(id).await, Err(RepositoryError::ShutDown)));
        assert!(db.intake_records().get(1).await.is_ok());
    }
}
