//! Scripted stages, jobs and observers for tests.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{ActionOutput, Indicator};
use crate::scheduler::{JobAction, JobReturn, SchedulerDelegate, TaskExecutor};
use crate::stages::Stage;

/// Shared, ordered record of stage invocations.
pub type InvocationLog = Arc<Mutex<Vec<String>>>;

/// A stage that fails a fixed number of times, then returns a configured
/// indicator with the context passed through unchanged.
#[derive(Debug)]
pub struct FlakyStage {
    name: String,
    failures: usize,
    allow_failure: bool,
    indicator: Indicator,
    jump_target: Option<String>,
    output: Option<serde_json::Value>,
    calls: Arc<AtomicUsize>,
    log: Option<InvocationLog>,
}

impl FlakyStage {
    /// Creates a stage that fails `failures` times and then returns `Run`.
    ///
    /// Failures are tolerated, so each one repeats the stage.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            failures,
            allow_failure: true,
            indicator: Indicator::Run,
            jump_target: None,
            output: None,
            calls: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }

    /// Creates a stage that never fails and returns `indicator`.
    #[must_use]
    pub fn steady(name: impl Into<String>, indicator: Indicator) -> Self {
        Self::new(name, 0).then(indicator)
    }

    /// Sets the indicator returned once the failures are used up.
    #[must_use]
    pub const fn then(mut self, indicator: Indicator) -> Self {
        self.indicator = indicator;
        self
    }

    /// Makes successful invocations jump to `target`.
    #[must_use]
    pub fn jumping_to(mut self, target: impl Into<String>) -> Self {
        self.jump_target = Some(target.into());
        self
    }

    /// Attaches an output value to successful invocations.
    #[must_use]
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets whether failures are tolerated.
    #[must_use]
    pub const fn allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }

    /// Appends the stage name to `log` on every invocation.
    #[must_use]
    pub fn with_log(mut self, log: InvocationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns a handle to the invocation counter.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Returns the number of invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: Clone> Stage<C> for FlakyStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn allow_failure(&self) -> bool {
        self.allow_failure
    }

    fn action(&self, ctx: &C) -> anyhow::Result<ActionOutput<C>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().push(self.name.clone());
        }
        if call < self.failures {
            anyhow::bail!("{} failed on attempt {}", self.name, call + 1);
        }

        let mut output = ActionOutput::new(ctx.clone(), self.indicator);
        output.jump_target.clone_from(&self.jump_target);
        output.output.clone_from(&self.output);
        Ok(output)
    }
}

/// A job that replays a script of results, then stops.
///
/// Clones share the script and the call counter.
#[derive(Debug, Clone)]
pub struct ScriptedJob {
    script: Arc<Mutex<VecDeque<Result<JobReturn, String>>>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedJob {
    /// Creates a job returning each scripted result in turn. `Err` entries
    /// become action errors with that message.
    #[must_use]
    pub fn new(script: Vec<Result<JobReturn, String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Makes every call sleep before returning.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the number of scripted results not yet returned.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl JobAction for ScriptedJob {
    async fn call(&self) -> anyhow::Result<JobReturn> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(ret)) => Ok(ret),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(JobReturn::Stop),
        }
    }
}

/// A delegate that records every notification.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    ended: Mutex<Vec<String>>,
    failed: Mutex<Vec<(String, String)>>,
}

impl RecordingDelegate {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids passed to `job_ended`, in order.
    #[must_use]
    pub fn ended(&self) -> Vec<String> {
        self.ended.lock().clone()
    }

    /// Returns the ids and error messages passed to `job_failed`, in order.
    #[must_use]
    pub fn failed(&self) -> Vec<(String, String)> {
        self.failed.lock().clone()
    }
}

impl SchedulerDelegate for RecordingDelegate {
    fn job_ended(&self, job_id: &str) {
        self.ended.lock().push(job_id.to_string());
    }

    fn job_failed(&self, job_id: &str, error: &anyhow::Error) {
        self.failed
            .lock()
            .push((job_id.to_string(), format!("{error:#}")));
    }
}

/// An executor that queues submitted tasks until the test runs them.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<BoxFuture<'static, ()>>>,
    names: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
}

impl ManualExecutor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of every task submitted so far, in order.
    #[must_use]
    pub fn submitted_names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs queued tasks one at a time, in submission order, until the
    /// queue is empty. Returns how many ran.
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(task) = next else {
                break;
            };
            task.await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ran += 1;
        }
        ran
    }
}

impl TaskExecutor for ManualExecutor {
    fn submit(&self, name: &str, task: BoxFuture<'static, ()>) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.names.lock().push(name.to_string());
        self.queue.lock().push_back(task);
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualExecutor")
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
