//! Jobs, job actions and the rules that turn a job's return value into its
//! next run time.

use crate::utils::{
    add_duration, add_seconds, from_unix_seconds, now_utc, random_jitter, Timestamp,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Numeric job returns at or above this many Unix seconds are absolute
/// times; smaller values are offsets in seconds.
///
/// 315 532 800 is 1980-01-01T00:00:00Z.
pub const ABSOLUTE_TIME_THRESHOLD_SECS: f64 = 315_532_800.0;

/// What a job action asks the scheduler to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum JobReturn {
    /// Run again after the configured interval, or finish if there is none.
    Continue,
    /// Finish, regardless of the interval.
    Stop,
    /// A bare number of seconds, relative or absolute depending on
    /// [`ABSOLUTE_TIME_THRESHOLD_SECS`].
    Numeric(f64),
    /// Run again after this delay.
    After(Duration),
    /// Run again at this time.
    At(Timestamp),
}

impl From<f64> for JobReturn {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<Duration> for JobReturn {
    fn from(value: Duration) -> Self {
        Self::After(value)
    }
}

impl From<Timestamp> for JobReturn {
    fn from(value: Timestamp) -> Self {
        Self::At(value)
    }
}

impl JobReturn {
    /// Interprets a loosely typed JSON return value.
    ///
    /// `null` continues, the string `"stop"` stops, numbers are numeric.
    /// Anything else is treated as `null`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) if s == "stop" => Self::Stop,
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Continue, Self::Numeric),
            _ => Self::Continue,
        }
    }
}

/// The work a job performs.
#[async_trait]
pub trait JobAction: Send + Sync {
    /// Runs the job once.
    async fn call(&self) -> anyhow::Result<JobReturn>;
}

/// A job backed by a synchronous closure.
pub struct FnJob<F> {
    func: F,
}

impl<F> FnJob<F>
where
    F: Fn() -> anyhow::Result<JobReturn> + Send + Sync,
{
    /// Creates a new function-based job.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> JobAction for FnJob<F>
where
    F: Fn() -> anyhow::Result<JobReturn> + Send + Sync,
{
    async fn call(&self) -> anyhow::Result<JobReturn> {
        (self.func)()
    }
}

/// A job backed by a closure that returns a future.
pub struct AsyncFnJob<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<JobReturn>> + Send,
{
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnJob<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<JobReturn>> + Send,
{
    /// Creates a new async function-based job.
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> JobAction for AsyncFnJob<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<JobReturn>> + Send,
{
    async fn call(&self) -> anyhow::Result<JobReturn> {
        (self.func)().await
    }
}

/// Options for registering a job.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Fixed repeat interval.
    pub interval: Option<Duration>,
    /// First run time. Defaults to now plus interval plus jitter.
    pub t0: Option<Timestamp>,
    /// Job id. Generated when absent.
    pub id: Option<String>,
    /// Upper bound of the random delay added to computed run times.
    pub jitter: Duration,
}

impl JobOptions {
    /// Creates empty options: run once, as soon as possible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for a job repeating every `interval`.
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self::new().with_interval(interval)
    }

    /// Sets the repeat interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the first run time.
    #[must_use]
    pub const fn with_t0(mut self, t0: Timestamp) -> Self {
        self.t0 = Some(t0);
        self
    }

    /// Sets the job id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the jitter bound.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the first run time relative to `now`.
    #[must_use]
    pub fn first_run(&self, now: Timestamp) -> Timestamp {
        self.t0.unwrap_or_else(|| {
            add_duration(
                now,
                self.interval
                    .unwrap_or(Duration::ZERO)
                    .saturating_add(random_jitter(self.jitter)),
            )
        })
    }
}

/// A scheduled job.
///
/// Cloning is cheap; clones share the action.
#[derive(Clone)]
pub struct Job {
    id: String,
    action: Arc<dyn JobAction>,
    interval: Option<Duration>,
    jitter: Duration,
    next_run: Timestamp,
}

impl Job {
    /// Creates a job.
    pub fn new(
        id: impl Into<String>,
        action: Arc<dyn JobAction>,
        interval: Option<Duration>,
        jitter: Duration,
        next_run: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            action,
            interval,
            jitter,
            next_run,
        }
    }

    /// Returns the job id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the repeat interval.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Returns the jitter bound.
    #[must_use]
    pub const fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Returns the next run time.
    #[must_use]
    pub const fn next_run(&self) -> Timestamp {
        self.next_run
    }

    /// Runs the action once and returns when it should run next.
    ///
    /// `Ok(None)` means the job is finished.
    ///
    /// # Errors
    ///
    /// Propagates the action's error; a failed run yields no next time.
    /// A non-finite numeric return is also an error.
    pub async fn execute(&self) -> anyhow::Result<Option<Timestamp>> {
        let start = now_utc();
        let ret = self.action.call().await?;
        self.next_run_after(start, &ret)
    }

    /// Interprets a return value for a run that started at `start`.
    ///
    /// Absolute times beyond the representable range saturate to
    /// [`DateTime::<Utc>::MAX_UTC`].
    ///
    /// # Errors
    ///
    /// Returns an error for a `NaN` or infinite numeric return.
    pub fn next_run_after(
        &self,
        start: Timestamp,
        ret: &JobReturn,
    ) -> anyhow::Result<Option<Timestamp>> {
        let next = match ret {
            JobReturn::Continue => self.after_interval(start),
            JobReturn::Stop => None,
            JobReturn::Numeric(secs) if !secs.is_finite() => {
                anyhow::bail!("job {} returned a non-finite time: {secs}", self.id)
            }
            JobReturn::Numeric(secs) if *secs >= ABSOLUTE_TIME_THRESHOLD_SECS => {
                Some(from_unix_seconds(*secs).unwrap_or(DateTime::<Utc>::MAX_UTC))
            }
            JobReturn::Numeric(secs) => Some(add_seconds(
                add_duration(start, random_jitter(self.jitter)),
                *secs,
            )),
            JobReturn::After(delay) => Some(add_duration(
                start,
                delay.saturating_add(random_jitter(self.jitter)),
            )),
            JobReturn::At(at) => Some(*at),
        };
        Ok(next)
    }

    /// Returns `start + interval + jitter`, or `None` without an interval.
    #[must_use]
    pub fn after_interval(&self, start: Timestamp) -> Option<Timestamp> {
        self.interval.map(|interval| {
            add_duration(start, interval.saturating_add(random_jitter(self.jitter)))
        })
    }

    pub(crate) fn rescheduled(&self, next_run: Timestamp) -> Self {
        Self {
            next_run,
            ..self.clone()
        }
    }
}

impl Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("jitter", &self.jitter)
            .field("next_run", &self.next_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::unix_seconds;

    fn job(interval: Option<Duration>, jitter: Duration) -> Job {
        let action = Arc::new(FnJob::new(|| Ok(JobReturn::Continue)));
        Job::new("job", action, interval, jitter, now_utc())
    }

    fn start() -> Timestamp {
        from_unix_seconds(1_700_000_000.0).unwrap()
    }

    #[test]
    fn test_continue_uses_interval() {
        let job = job(Some(Duration::from_secs(2)), Duration::ZERO);
        let next = job.next_run_after(start(), &JobReturn::Continue).unwrap().unwrap();
        assert_eq!(unix_seconds(&next), 1_700_000_002.0);
    }

    #[test]
    fn test_continue_without_interval_finishes() {
        let job = job(None, Duration::from_secs(5));
        assert!(job.next_run_after(start(), &JobReturn::Continue).unwrap().is_none());
    }

    #[test]
    fn test_stop_ignores_interval() {
        let job = job(Some(Duration::from_secs(2)), Duration::ZERO);
        assert!(job.next_run_after(start(), &JobReturn::Stop).unwrap().is_none());
    }

    #[test]
    fn test_numeric_below_threshold_is_relative() {
        let job = job(None, Duration::ZERO);
        let next = job.next_run_after(start(), &JobReturn::Numeric(30.0)).unwrap().unwrap();
        assert_eq!(unix_seconds(&next), 1_700_000_030.0);
    }

    #[test]
    fn test_numeric_at_threshold_is_absolute() {
        let job = job(None, Duration::from_secs(100));
        let next = job
            .next_run_after(start(), &JobReturn::Numeric(ABSOLUTE_TIME_THRESHOLD_SECS))
            .unwrap()
            .unwrap();
        assert_eq!(unix_seconds(&next), ABSOLUTE_TIME_THRESHOLD_SECS);

        let next = job
            .next_run_after(start(), &JobReturn::Numeric(1_800_000_000.0))
            .unwrap()
            .unwrap();
        assert_eq!(unix_seconds(&next), 1_800_000_000.0);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let job = job(Some(Duration::from_secs(2)), Duration::from_secs(1));
        for _ in 0..20 {
            let next = job.next_run_after(start(), &JobReturn::Continue).unwrap().unwrap();
            let offset = unix_seconds(&next) - 1_700_000_000.0;
            assert!((2.0..=3.0).contains(&offset), "offset {offset}");
        }
    }

    #[test]
    fn test_tagged_returns() {
        let job = job(None, Duration::ZERO);
        let next = job
            .next_run_after(start(), &JobReturn::After(Duration::from_millis(1500)))
            .unwrap()
            .unwrap();
        assert_eq!(unix_seconds(&next), 1_700_000_001.5);

        let at = from_unix_seconds(42.0).unwrap();
        assert_eq!(job.next_run_after(start(), &JobReturn::At(at)).unwrap(), Some(at));
    }

    #[test]
    fn test_job_return_from_json() {
        assert_eq!(JobReturn::from_json(&serde_json::json!(null)), JobReturn::Continue);
        assert_eq!(JobReturn::from_json(&serde_json::json!("stop")), JobReturn::Stop);
        assert_eq!(JobReturn::from_json(&serde_json::json!(2.5)), JobReturn::Numeric(2.5));
        assert_eq!(JobReturn::from_json(&serde_json::json!("later")), JobReturn::Continue);
    }

    #[test]
    fn test_first_run_defaults() {
        let now = start();
        assert_eq!(JobOptions::new().first_run(now), now);

        let every = JobOptions::every(Duration::from_secs(10));
        assert_eq!(unix_seconds(&every.first_run(now)), 1_700_000_010.0);

        let t0 = from_unix_seconds(5.0).unwrap();
        assert_eq!(JobOptions::every(Duration::from_secs(10)).with_t0(t0).first_run(now), t0);
    }

    #[test]
    fn test_numeric_beyond_range_saturates() {
        let job = job(None, Duration::ZERO);
        let next = job.next_run_after(start(), &JobReturn::Numeric(1e13)).unwrap();
        assert_eq!(next, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_non_finite_numeric_is_an_error() {
        let job = job(Some(Duration::from_secs(2)), Duration::ZERO);
        for secs in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = job.next_run_after(start(), &JobReturn::Numeric(secs)).unwrap_err();
            assert!(err.to_string().contains("non-finite"), "{err}");
        }
    }

    #[tokio::test]
    async fn test_execute_fails_on_nan_return() {
        let action = Arc::new(FnJob::new(|| Ok(JobReturn::Numeric(f64::NAN))));
        let job = Job::new("nan", action, Some(Duration::from_secs(1)), Duration::ZERO, now_utc());

        assert!(job.execute().await.is_err());
    }

    #[test]
    fn test_huge_durations_saturate() {
        let now = start();
        let options = JobOptions::every(Duration::MAX).with_jitter(Duration::from_secs(1));
        assert_eq!(options.first_run(now), DateTime::<Utc>::MAX_UTC);

        let job = job(Some(Duration::MAX), Duration::from_secs(1));
        assert_eq!(job.after_interval(now), Some(DateTime::<Utc>::MAX_UTC));
        let next = job
            .next_run_after(now, &JobReturn::After(Duration::MAX))
            .unwrap();
        assert_eq!(next, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[tokio::test]
    async fn test_execute_propagates_errors() {
        let action = Arc::new(FnJob::new(|| anyhow::bail!("disk full")));
        let job = Job::new("failing", action, Some(Duration::from_secs(1)), Duration::ZERO, now_utc());

        let err = job.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_async_fn_job() {
        let action = Arc::new(AsyncFnJob::new(|| async { Ok(JobReturn::Numeric(1.0)) }));
        let job = Job::new("async", action, None, Duration::ZERO, now_utc());

        let before = now_utc();
        let next = job.execute().await.unwrap().unwrap();
        assert!(next > before);
    }
}
