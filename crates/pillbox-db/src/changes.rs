//! # Change Feed
//!
//! Table-level change notifications that drive live queries.
//!
//! ```text
//! Repository write commits ──► ChangeFeed::notify(Table::Medications)
//!                                     │ broadcast
//!                 ┌───────────────────┼───────────────────┐
//!                 ▼                   ▼                   ▼
//!           LiveQuery(all)   LiveQuery(search "asp")  LiveQuery(count)
//!           re-fetch          re-fetch                 re-fetch
//! ```
//!
//! Notifications carry only the table name. Subscribers re-run their query
//! and decide for themselves whether anything they show changed.

use tokio::sync::broadcast;
use tracing::trace;

/// Buffered notifications per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// A table whose rows live queries can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Medications,
    IntakeRecords,
    HealthDiary,
    Users,
}

impl Table {
    /// The SQL table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Table::Medications => "medications",
            Table::IntakeRecords => "medication_intake_record",
            Table::HealthDiary => "health_diary",
            Table::Users => "users",
        }
    }
}

/// Broadcast of committed writes, shared by every repository of one
/// [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Table>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        ChangeFeed { tx }
    }

    /// Starts receiving notifications sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.tx.subscribe()
    }

    /// Announces that rows of `table` changed.
    pub fn notify(&self, table: Table) {
        // No subscribers is the common case on startup
        let receivers = self.tx.send(table).unwrap_or(0);
        trace!(table = table.name(), receivers, "Change notified");
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
