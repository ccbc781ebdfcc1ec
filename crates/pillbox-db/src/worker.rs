//! # Worker Pool
//!
//! Bounded background execution for repository requests.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Request Lifecycle                                   │
//! │                                                                         │
//! │  caller ── submit(op, work) ──► Ticket<T>      (returns immediately)   │
//! │                 │                                                       │
//! │                 ▼ spawned on the runtime captured at construction       │
//! │         ┌───────────────┐                                               │
//! │         │ wait a permit │──── semaphore closed by cleanup() ──► ShutDown│
//! │         └───────┬───────┘                                               │
//! │                 ▼                                                       │
//! │         ┌───────────────┐                                               │
//! │         │  run `work`   │──── panics / runtime drops task ───► Aborted  │
//! │         └───────┬───────┘                                               │
//! │                 ▼                                                       │
//! │        oneshot::send(outcome) ──► Ticket resolves exactly once          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool never runs store calls on the caller. Async callers `.await`
//! the ticket; synchronous callers use [`Ticket::blocking_wait`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, info, warn};

use crate::error::RepositoryError;

// =============================================================================
// Terminal Outcome
// =============================================================================

/// A value a ticket can resolve with, including the failures the pool
/// itself produces.
pub trait Terminal: Send + 'static {
    /// Builds the outcome for a request that never produced one.
    fn from_failure(err: RepositoryError) -> Self;
}

impl<T: Send + 'static> Terminal for Result<T, RepositoryError> {
    fn from_failure(err: RepositoryError) -> Self {
        Err(err)
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// The pending outcome of one repository request.
///
/// Work is already scheduled when a ticket is returned; dropping the ticket
/// does not cancel it.
#[must_use = "the request runs regardless, but its outcome is lost if the ticket is dropped"]
pub struct Ticket<T> {
    state: TicketState<T>,
}

enum TicketState<T> {
    Ready(Option<T>),
    Pending(oneshot::Receiver<T>),
}

impl<T: Terminal> Ticket<T> {
    pub(crate) fn ready(value: T) -> Self {
        Ticket {
            state: TicketState::Ready(Some(value)),
        }
    }

    fn pending(rx: oneshot::Receiver<T>) -> Self {
        Ticket {
            state: TicketState::Pending(rx),
        }
    }

    /// Blocks the current thread until the outcome is available.
    ///
    /// For callers outside the runtime. Panics if called from within an
    /// async context, like [`oneshot::Receiver::blocking_recv`].
    pub fn blocking_wait(self) -> T {
        match self.state {
            TicketState::Ready(Some(value)) => value,
            TicketState::Ready(None) => T::from_failure(RepositoryError::Aborted),
            TicketState::Pending(rx) => rx.blocking_recv().unwrap_or_else(|_| {
                warn!("Worker dropped request without an outcome");
                T::from_failure(RepositoryError::Aborted)
            }),
        }
    }
}

// The only field that needs pinning is the receiver, which is Unpin.
impl<T> Unpin for Ticket<T> {}

impl<T: Terminal> Future for Ticket<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match &mut self.state {
            TicketState::Ready(value) => Poll::Ready(
                value
                    .take()
                    .unwrap_or_else(|| T::from_failure(RepositoryError::Aborted)),
            ),
            TicketState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(value)) => Poll::Ready(value),
                Poll::Ready(Err(_)) => {
                    warn!("Worker dropped request without an outcome");
                    Poll::Ready(T::from_failure(RepositoryError::Aborted))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

// =============================================================================
// Worker Pool
// =============================================================================

/// A bounded pool of background slots shared by every repository of one
/// entity type.
///
/// Cloning is cheap; clones share the same slots and shutdown state.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    name: &'static str,
    size: usize,
    handle: Handle,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool running on the given runtime.
    ///
    /// ## Arguments
    /// * `name` - Used in log lines
    /// * `size` - Maximum requests running at once (at least 1)
    pub fn new(name: &'static str, size: usize, handle: Handle) -> Self {
        let size = size.max(1);
        debug!(pool = name, size, "Starting worker pool");
        WorkerPool {
            inner: Arc::new(PoolInner {
                name,
                size,
                handle,
                permits: Arc::new(Semaphore::new(size)),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Schedules `work` and returns the ticket for its outcome.
    ///
    /// ## Arguments
    /// * `op` - Short operation name for log lines
    /// * `work` - The store interaction; runs only once a slot is free
    pub fn submit<T, F>(&self, op: &'static str, work: F) -> Ticket<T>
    where
        T: Terminal,
        F: Future<Output = T> + Send + 'static,
    {
        if self.is_shut_down() {
            debug!(pool = self.inner.name, op, "Rejected request after shutdown");
            return Ticket::ready(T::from_failure(RepositoryError::ShutDown));
        }

        let (tx, rx) = oneshot::channel();
        let permits = self.inner.permits.clone();
        let pool = self.inner.name;

        // If `work` panics, `tx` is dropped during unwinding and the ticket
        // resolves as Aborted.
        self.inner.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!(pool, op, "Dropped queued request at shutdown");
                let _ = tx.send(T::from_failure(RepositoryError::ShutDown));
                return;
            };
            let outcome = work.await;
            if tx.send(outcome).is_err() {
                debug!(pool, op, "Request finished after its ticket was dropped");
            }
        });

        Ticket::pending(rx)
    }

    /// Stops accepting work. Terminal.
    ///
    /// Requests already running complete normally; requests still waiting
    /// for a slot resolve with [`RepositoryError::ShutDown`].
    pub fn cleanup(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.permits.close();
            info!(pool = self.inner.name, "Worker pool shut down");
        }
    }

    /// Returns true once [`cleanup`](Self::cleanup) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Maximum requests running at once.
    pub fn size(&self) -> usize {
        self.inner.size
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("size", &self.inner.size)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::new("test", size, Handle::current())
    }

    #[tokio::test]
    async fn test_ticket_resolves_with_work_result() {
        let pool = pool(2);
        let ticket: Ticket<Result<i64, RepositoryError>> = pool.submit("answer", async { Ok(42) });
        assert_eq!(ticket.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_panicking_work_resolves_as_aborted() {
        let pool = pool(1);
        let ticket: Ticket<Result<(), RepositoryError>> =
            pool.submit("boom", async {
                if true {
                    panic!("store exploded");
                }
                Ok(())
            });
        assert!(matches!(ticket.await, Err(RepositoryError::Aborted)));

        // The slot is released and the pool keeps working
        let ticket: Ticket<Result<u8, RepositoryError>> = pool.submit("after", async { Ok(1) });
        assert_eq!(ticket.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_cleanup_is_shut_down() {
        let pool = pool(1);
        pool.cleanup();
        pool.cleanup();
        assert!(pool.is_shut_down());

        let ticket: Ticket<Result<(), RepositoryError>> = pool.submit("late", async { Ok(()) });
        assert!(matches!(ticket.await, Err(RepositoryError::ShutDown)));
    }

    #[tokio::test]
    async fn test_cleanup_lets_running_work_finish_and_drops_queued_work() {
        let pool = pool(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let running: Ticket<Result<&str, RepositoryError>> = pool.submit("running", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok("finished")
        });
        started_rx.await.unwrap();

        let queued: Ticket<Result<&str, RepositoryError>> =
            pool.submit("queued", async { Ok("should not run") });
        tokio::task::yield_now().await;

        pool.cleanup();
        release_tx.send(()).unwrap();

        assert_eq!(running.await.unwrap(), "finished");
        assert!(matches!(queued.await, Err(RepositoryError::ShutDown)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let pool = pool(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tickets: Vec<Ticket<Result<(), RepositoryError>>> = (0..8)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                pool.submit("count", async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        for ticket in tickets {
            ticket.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_blocking_wait_from_plain_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pool = WorkerPool::new("blocking", 1, runtime.handle().clone());

        let ticket: Ticket<Result<i32, RepositoryError>> = pool.submit("sum", async { Ok(1 + 2) });
        assert_eq!(ticket.blocking_wait().unwrap(), 3);
    }
}
