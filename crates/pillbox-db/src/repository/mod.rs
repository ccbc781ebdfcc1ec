//! # Repository Module
//!
//! The asynchronous API the presentation layer talks to.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How a Repository Request Runs                        │
//! │                                                                         │
//! │  Screen                                                                 │
//! │       │  db.medications().insert(record, false)                         │
//! │       ▼                                                                 │
//! │  MedicationRepository ── returns Ticket immediately                     │
//! │       │                                                                 │
//! │       │  worker pool slot                                               │
//! │       ▼                                                                 │
//! │  validate ──► duplicate check ──► DAO write ──► ChangeFeed::notify      │
//! │       │                                               │                 │
//! │       ▼                                               ▼                 │
//! │  Ticket resolves (exactly once)            LiveQuery snapshots refresh  │
//! │                                                                         │
//! │  Reads for lists and detail screens are LiveQuery handles instead;     │
//! │  they re-run by themselves after every committed write.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`MedicationRepository`] - Medications, duplicate-name policy, stock
//! - [`IntakeRecordRepository`] - Intake history
//! - [`HealthDiaryRepository`] - Per-user diary with ownership checks
//! - [`UserRepository`] - Accounts and their health profiles

pub mod diary;
pub mod intake;
pub mod medication;
pub mod user;

pub use diary::HealthDiaryRepository;
pub use intake::IntakeRecordRepository;
pub use medication::{DoseTaken, InsertOutcome, MedicationRepository};
pub use user::UserRepository;

use std::future::Future;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::runtime::Handle;

use crate::changes::{ChangeFeed, Table};
use crate::error::DbResult;
use crate::live::LiveQuery;
use crate::worker::WorkerPool;

/// Handles every repository of one entity type shares.
#[derive(Debug, Clone)]
pub(crate) struct RepoContext {
    pub(crate) pool: SqlitePool,
    pub(crate) feed: ChangeFeed,
    pub(crate) workers: WorkerPool,
    pub(crate) handle: Handle,
}

impl RepoContext {
    /// Starts a live query on this context's runtime and change feed.
    pub(crate) fn live<T, F, Fut>(
        &self,
        tables: &'static [Table],
        label: &'static str,
        fetch: F,
    ) -> LiveQuery<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        LiveQuery::spawn(&self.handle, &self.feed, tables, label, fetch)
    }
}

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
