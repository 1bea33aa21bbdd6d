//! Interval job scheduler.
//!
//! Jobs sit on a [`Timeline`] ordered by their next run time. The scheduling
//! loop sleeps until the earliest one is due, hands every due job to a
//! [`TaskExecutor`] and lets the job's [`JobReturn`] decide when, if ever, it
//! runs again:
//!
//! - [`JobReturn::Continue`] repeats after the job's interval, if it has one
//! - [`JobReturn::Stop`] drops the job
//! - [`JobReturn::Numeric`] is a relative delay in seconds, or an absolute
//!   Unix time at or above [`ABSOLUTE_TIME_THRESHOLD_SECS`]

mod config;
mod delegate;
mod engine;
mod job;
mod pool;
mod task;
mod timeline;

pub use config::SchedulerConfig;
#[cfg(test)]
pub use delegate::MockSchedulerDelegate;
pub use delegate::{NoOpDelegate, SchedulerDelegate};
pub use engine::Scheduler;
pub use job::{
    AsyncFnJob, FnJob, Job, JobAction, JobOptions, JobReturn, ABSOLUTE_TIME_THRESHOLD_SECS,
};
pub use pool::{TaskExecutor, WorkerPool};
pub use timeline::Timeline;
