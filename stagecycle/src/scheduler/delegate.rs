//! Observer notified when scheduled jobs finish.

/// Receives job completion notifications.
///
/// Callbacks run on the worker that executed the job, outside the
/// scheduler's lock. Both default to doing nothing.
#[cfg_attr(test, mockall::automock)]
pub trait SchedulerDelegate: Send + Sync {
    /// Called after a job ran successfully, whether or not it was rescheduled.
    fn job_ended(&self, _job_id: &str) {}

    /// Called after a job's action returned an error or panicked.
    fn job_failed(&self, _job_id: &str, _error: &anyhow::Error) {}
}

/// A delegate that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpDelegate;

impl SchedulerDelegate for NoOpDelegate {}
