//! # Live Queries
//!
//! Continuously refreshed query results for list and detail screens.
//!
//! ## How a Live Query Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Live Query Task                                    │
//! │                                                                         │
//! │  spawn                                                                  │
//! │    │                                                                    │
//! │    ├── 1. subscribe to ChangeFeed   (so no write slips past step 2)     │
//! │    ├── 2. fetch ──► publish snapshot                                    │
//! │    │                                                                    │
//! │    └── 3. loop ───────────────────────────────────────────┐             │
//! │           │ watched table changed / feed lagged            │             │
//! │           ▼                                                │             │
//! │         fetch ── same as last snapshot? ── yes ── skip ────┤             │
//! │           │                                                │             │
//! │           no ──► publish snapshot ─────────────────────────┘             │
//! │                                                                         │
//! │  Stops when the LiveQuery handle is dropped or cancelled.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed fetch is logged and the previous snapshot stays in place;
//! subscribers never see an error.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::changes::{ChangeFeed, Table};
use crate::error::DbResult;

/// A subscription to a query that re-runs whenever its tables change.
///
/// ## Usage
/// ```rust,ignore
/// let mut meds = db.medications().all();
/// while let Some(list) = meds.next().await {
///     render(&list);
/// }
/// ```
pub struct LiveQuery<T> {
    rx: watch::Receiver<Option<T>>,
    task: AbortHandle,
}

impl<T> LiveQuery<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts the background task for a query.
    ///
    /// ## Arguments
    /// * `handle` - Runtime the task runs on
    /// * `feed` - Change notifications to listen to
    /// * `tables` - Tables whose changes trigger a re-fetch
    /// * `label` - Used in log lines
    /// * `fetch` - Runs the query once
    pub(crate) fn spawn<F, Fut>(
        handle: &Handle,
        feed: &ChangeFeed,
        tables: &'static [Table],
        label: &'static str,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        let mut changes = feed.subscribe();
        let (tx, rx) = watch::channel(None);

        let task = handle.spawn(async move {
            refresh(&tx, fetch(), label).await;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(table) if tables.contains(&table) => refresh(&tx, fetch(), label).await,
                        Ok(_) => {}
                        Err(RecvError::Lagged(missed)) => {
                            debug!(query = label, missed, "Change feed lagged, re-fetching");
                            refresh(&tx, fetch(), label).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            debug!(query = label, "Live query stopped");
        });

        LiveQuery {
            rx,
            task: task.abort_handle(),
        }
    }

    /// Waits for a snapshot this handle has not seen yet.
    ///
    /// ## Returns
    /// * `Some(snapshot)` - The first result, or a changed one
    /// * `None` - The query task has stopped
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// The latest snapshot, or `None` before the first fetch completes.
    pub fn current(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Waits until a snapshot satisfies `predicate`, checking the current
    /// one first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let snapshot = self
            .rx
            .wait_for(|value| value.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        snapshot.clone()
    }

    /// Stops the query task. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh<T, Fut>(tx: &watch::Sender<Option<T>>, fetch: Fut, label: &'static str)
where
    T: PartialEq,
    Fut: Future<Output = DbResult<T>>,
{
    match fetch.await {
        Ok(snapshot) => {
            let published = tx.send_if_modified(|current| {
                if current.as_ref() == Some(&snapshot) {
                    false
                } else {
                    *current = Some(snapshot);
                    true
                }
            });
            if published {
                debug!(query = label, "Live query published snapshot");
            }
        }
        Err(e) => warn!(query = label, error = %e, "Live query fetch failed, keeping last snapshot"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
