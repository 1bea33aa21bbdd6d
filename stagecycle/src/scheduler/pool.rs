//! Bounded worker pool that runs dispatched jobs.

use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

/// A task-execution pool the scheduler hands work to.
///
/// `submit` must not block the caller; it only enqueues.
pub trait TaskExecutor: Send + Sync + Debug {
    /// Enqueues a task. `name` is used for logging.
    fn submit(&self, name: &str, task: BoxFuture<'static, ()>);

    /// Returns the number of submitted tasks that have not finished.
    fn in_flight(&self) -> usize;

    /// Returns true if no submitted task is pending or running.
    fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}

/// A tokio-backed pool that runs at most `max_concurrency` tasks at once.
///
/// Tasks beyond the cap wait for a permit inside their own spawned task, so
/// submission never blocks.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

/// Decrements the in-flight counter even if the task panics.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl WorkerPool {
    /// Creates a pool with the given concurrency cap (at least one).
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Returns the concurrency cap.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Returns the number of tasks currently holding a permit.
    #[must_use]
    pub fn running(&self) -> usize {
        self.max_concurrency - self.permits.available_permits()
    }

    /// Waits until every submitted task has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl TaskExecutor for WorkerPool {
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    fn submit(&self, name: &str, task: BoxFuture<'static, ()>) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            idle: self.idle.clone(),
        };
        let permits = self.permits.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(task = %name, "Worker pool closed, dropping task");
                return;
            };
            debug!(task = %name, "Worker task started");
            task.await;
        });
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrency", &self.max_concurrency)
            .field("in_flight", &self.in_flight())
            .field("running", &self.running())
            .finish()
    }
}
