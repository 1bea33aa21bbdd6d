//! The interval job scheduler.

use super::task::JobTask;
use super::{
    AsyncFnJob, FnJob, Job, JobAction, JobOptions, JobReturn, NoOpDelegate, SchedulerConfig,
    SchedulerDelegate, TaskExecutor, Timeline, WorkerPool,
};
use crate::errors::SchedulerError;
use crate::events::{get_event_sink, EventSink};
use crate::utils::{duration_until, generate_job_id, now_utc, Timestamp};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What happened to a job when its dispatch finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Completion {
    Rescheduled(Timestamp),
    Finished,
    Removed,
}

#[derive(Debug, Default)]
struct SchedulerState {
    timeline: Timeline,
    /// Outstanding dispatches, keyed by dispatch token.
    in_flight: HashMap<u64, String>,
    next_token: u64,
}

/// State shared between scheduler handles, the loop and running tasks.
pub(super) struct Shared {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    executor: Arc<dyn TaskExecutor>,
    delegate: RwLock<Arc<dyn SchedulerDelegate>>,
    events: RwLock<Arc<dyn EventSink>>,
    wake: Notify,
    stopped: AtomicBool,
    running: AtomicBool,
}

impl Shared {
    pub(super) const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub(super) fn delegate(&self) -> Arc<dyn SchedulerDelegate> {
        self.delegate.read().clone()
    }

    pub(super) fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let sink = self.events.read().clone();
        sink.emit(event_type, data);
    }

    /// Settles a dispatch. A job whose dispatch was cancelled by `remove`
    /// is never re-inserted.
    pub(super) fn complete(&self, token: u64, job: &Job, next: Option<Timestamp>) -> Completion {
        let completion = {
            let mut state = self.state.lock();
            if state.in_flight.remove(&token).is_none() {
                Completion::Removed
            } else if let Some(next_run) = next {
                state.timeline.push(job.rescheduled(next_run));
                Completion::Rescheduled(next_run)
            } else {
                Completion::Finished
            }
        };
        self.wake.notify_one();
        completion
    }

    fn is_drained(&self) -> bool {
        let drained = {
            let state = self.state.lock();
            state.timeline.is_empty() && state.in_flight.is_empty()
        };
        drained && self.executor.is_idle()
    }
}

/// Clears the running flag when the loop exits, however it exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs jobs at their scheduled times on a bounded worker pool.
///
/// `Scheduler` is a cheap handle; clones share the same timeline and
/// executor. Jobs are dispatched in non-decreasing order of their next run
/// time. Their completion order is up to the executor.
///
/// # Example
///
/// ```rust,no_run
/// use stagecycle::prelude::*;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), SchedulerError> {
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// scheduler.add_fn(|| Ok(JobReturn::Continue), JobOptions::every(Duration::from_secs(5)));
///
/// let handle = scheduler.start()?;
/// tokio::time::sleep(Duration::from_secs(30)).await;
/// scheduler.stop();
/// let _ = handle.await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler backed by a [`WorkerPool`] sized from the config.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the config does not validate.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let pool = Arc::new(WorkerPool::new(config.max_concurrency));
        Self::with_executor(config, pool)
    }

    /// Creates a scheduler that submits work to the given executor.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the config does not validate.
    pub fn with_executor(
        config: SchedulerConfig,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SchedulerState::default()),
                executor,
                delegate: RwLock::new(Arc::new(NoOpDelegate)),
                events: RwLock::new(get_event_sink()),
                wake: Notify::new(),
                stopped: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
        })
    }

    /// Sets the observer notified when jobs end or fail.
    #[must_use]
    pub fn with_delegate(self, delegate: Arc<dyn SchedulerDelegate>) -> Self {
        *self.shared.delegate.write() = delegate;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        *self.shared.events.write() = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Registers a job and returns its id.
    ///
    /// The first run is `options.t0`, or now plus the interval plus jitter.
    pub fn add<A>(&self, action: A, options: JobOptions) -> String
    where
        A: JobAction + 'static,
    {
        self.add_shared(Arc::new(action), options)
    }

    /// Registers a job whose action is already shared.
    pub fn add_shared(&self, action: Arc<dyn JobAction>, options: JobOptions) -> String {
        let id = options.id.clone().unwrap_or_else(generate_job_id);
        let next_run = options.first_run(now_utc());
        let job = Job::new(id.clone(), action, options.interval, options.jitter, next_run);

        self.shared.state.lock().timeline.push(job);
        self.shared.wake.notify_one();
        debug!(job_id = %id, next_run = %next_run, interval = ?options.interval, "Job added");
        id
    }

    /// Registers a synchronous closure as a job.
    pub fn add_fn<F>(&self, func: F, options: JobOptions) -> String
    where
        F: Fn() -> anyhow::Result<JobReturn> + Send + Sync + 'static,
    {
        self.add(FnJob::new(func), options)
    }

    /// Registers a closure returning a future as a job.
    pub fn add_async<F, Fut>(&self, func: F, options: JobOptions) -> String
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<JobReturn>> + Send + 'static,
    {
        self.add(AsyncFnJob::new(func), options)
    }

    /// Removes every pending entry with this id.
    ///
    /// A dispatch of the job that is already running is not interrupted, but
    /// the job will not be rescheduled when it finishes. Returns true if
    /// anything was removed or cancelled.
    pub fn remove(&self, id: &str) -> bool {
        let (removed, cancelled) = {
            let mut state = self.shared.state.lock();
            let removed = state.timeline.remove(id);
            let before = state.in_flight.len();
            state.in_flight.retain(|_, job_id| job_id.as_str() != id);
            (removed, before - state.in_flight.len())
        };
        self.shared.wake.notify_one();

        if removed + cancelled > 0 {
            debug!(job_id = %id, removed, cancelled, "Job removed");
            true
        } else {
            false
        }
    }

    /// Dispatches every job that is due and returns how many were dispatched.
    ///
    /// # Panics
    ///
    /// With the default [`WorkerPool`] executor, panics if a job is due and
    /// this is called outside a Tokio runtime.
    pub fn tick(&self) -> usize {
        let now = now_utc();
        let dispatched: Vec<(u64, Job)> = {
            let mut state = self.shared.state.lock();
            let due = state.timeline.pop_due(now);
            let mut dispatched = Vec::with_capacity(due.len());
            for job in due {
                let token = state.next_token;
                state.next_token += 1;
                state.in_flight.insert(token, job.id().to_string());
                dispatched.push((token, job));
            }
            dispatched
        };

        let count = dispatched.len();
        for (token, job) in dispatched {
            let id = job.id().to_string();
            self.shared.emit(
                "scheduler.job.dispatched",
                Some(json!({
                    "job_id": id,
                    "scheduled_for": job.next_run().to_rfc3339(),
                })),
            );
            debug!(job_id = %id, scheduled_for = %job.next_run(), "Dispatching job");
            let task = JobTask::new(self.shared.clone(), token, job);
            self.shared.executor.submit(&id, task.run().boxed());
        }
        count
    }

    /// Runs the scheduling loop until [`Scheduler::stop`] is called, or
    /// until there is nothing left to do when `stop_when_empty` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a loop is already running.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        self.claim()?;
        self.run_loop().await;
        Ok(())
    }

    /// Spawns the scheduling loop on the Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a loop is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>, SchedulerError> {
        self.claim()?;
        let scheduler = self.clone();
        Ok(tokio::spawn(async move { scheduler.run_loop().await }))
    }

    /// Asks the loop to exit. Jobs already dispatched keep running.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
        info!("Scheduler stop requested");
    }

    /// Waits until no job is pending or running, checking every `poll`.
    pub async fn wait_until_empty(&self, poll: Duration) {
        while !self.shared.is_drained() {
            tokio::time::sleep(poll).await;
        }
    }

    /// Returns the number of pending timeline entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().timeline.len()
    }

    /// Returns true if no job is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().timeline.is_empty()
    }

    /// Returns the ids of pending jobs, earliest first.
    #[must_use]
    pub fn job_ids(&self) -> Vec<String> {
        self.shared.state.lock().timeline.ids()
    }

    /// Returns when the job with this id runs next, if it is pending.
    #[must_use]
    pub fn next_run_of(&self, id: &str) -> Option<Timestamp> {
        self.shared.state.lock().timeline.next_run_of(id)
    }

    /// Returns the number of dispatched jobs that have not finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.executor.in_flight()
    }

    /// Returns true while the scheduling loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    fn claim(&self) -> Result<(), SchedulerError> {
        self.shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SchedulerError::AlreadyRunning)?;
        self.shared.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn run_loop(&self) {
        let _running = RunningGuard(&self.shared.running);
        info!(
            max_concurrency = self.shared.config.max_concurrency,
            "Scheduler loop started"
        );

        while !self.shared.stopped.load(Ordering::SeqCst) {
            let next_run = self.shared.state.lock().timeline.peek_next_run();
            match next_run {
                Some(next_run) => {
                    let wait = duration_until(&next_run);
                    if !wait.is_zero() {
                        tokio::select! {
                            () = tokio::time::sleep(wait) => {}
                            () = self.shared.wake.notified() => continue,
                        }
                    }
                    self.tick();
                }
                None => {
                    if self.shared.config.stop_when_empty && self.shared.is_drained() {
                        info!("Nothing left to schedule");
                        break;
                    }
                    tokio::select! {
                        () = tokio::time::sleep(self.shared.config.idle_poll_interval()) => {}
                        () = self.shared.wake.notified() => {}
                    }
                }
            }
        }

        info!("Scheduler loop stopped");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("pending", &state.timeline.len())
            .field("dispatched", &state.in_flight.len())
            .field("executor", &self.shared.executor)
            .field("running", &self.is_running())
            .finish()
    }
}
