//! # pillbox-db: Database Layer for Pillbox
//!
//! Local persistence for the medication tracker: SQLite through sqlx,
//! asynchronous repositories, and live queries the screens subscribe to.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pillbox Data Flow                                │
//! │                                                                         │
//! │  Screen (medication list, add form, diary)                              │
//! │       │ writes: Ticket<T>            ▲ reads: LiveQuery<T>              │
//! │       ▼                              │                                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     pillbox-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │ Repositories  │───►│     DAOs      │    │  Migrations  │    │    │
//! │  │   │ + WorkerPools │    │  (SQL only)   │    │  (embedded)  │    │    │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘    │    │
//! │  │           │ notify             │                                │    │
//! │  │           ▼                    ▼                                │    │
//! │  │   ┌───────────────┐    ┌───────────────┐                        │    │
//! │  │   │  ChangeFeed   │───►│  LiveQuery    │ re-fetch on change     │    │
//! │  │   └───────────────┘    └───────────────┘                        │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (pillbox.db)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the [`Database`] handle
//! - [`config`] - TOML / environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`dao`] - SQL per table
//! - [`repository`] - Asynchronous repositories
//! - [`worker`] - Bounded worker pools and tickets
//! - [`changes`] / [`live`] - Change feed and live queries
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pillbox_db::{Database, DbConfig, InsertOutcome};
//!
//! let db = Database::new(DbConfig::new("path/to/pillbox.db")).await?;
//!
//! let mut medications = db.medications().all();
//! match db.medications().insert(record, false).await {
//!     InsertOutcome::Success(id) => println!("saved {id}"),
//!     InsertOutcome::DuplicateFound(name) => ask_user(&name),
//!     InsertOutcome::Error(err) => println!("{err}"),
//! }
//! let list = medications.next().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod changes;
pub mod config;
pub mod dao;
pub mod error;
pub mod live;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod worker;

// =============================================================================
// Re-exports
// =============================================================================

pub use changes::{ChangeFeed, Table};
pub use config::AppConfig;
pub use error::{ConfigError, DbError, DbResult, RepositoryError, StoreOp};
pub use live::LiveQuery;
pub use pool::{Database, DbConfig};
pub use worker::{Terminal, Ticket};

// Repository re-exports for convenience
pub use repository::{
    DoseTaken, HealthDiaryRepository, InsertOutcome, IntakeRecordRepository,
    MedicationRepository, UserRepository,
};
