//! # Stagecycle
//!
//! Two small control-flow primitives:
//!
//! - **Stage cycles**: a ring of named stages driven one tick at a time. Each
//!   stage returns the next context plus an [`Indicator`](core::Indicator)
//!   that decides whether the ring advances, repeats the stage, pauses or
//!   finishes.
//! - **Interval scheduling**: a background loop that runs jobs at their next
//!   scheduled time on a bounded worker pool and reschedules them from what
//!   they return.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagecycle::prelude::*;
//!
//! let mut engine = CycleBuilder::new()
//!     .fn_stage("fetch", |n: &u32| Ok(run_next(n + 1)))
//!     .fn_stage("store", |n: &u32| Ok(over(*n, None)))
//!     .build(0)?;
//! engine.run_until_complete(100, Duration::ZERO).await?;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default())?;
//! scheduler.add_fn(|| Ok(JobReturn::Continue), JobOptions::every(Duration::from_secs(60)));
//! let handle = scheduler.start()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod cycle;
pub mod errors;
pub mod events;
pub mod observability;
pub mod scheduler;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        jump_to, over, pass, run_again, run_next, wait, ActionOutput, CycleStatus, Indicator,
    };
    pub use crate::cycle::{CycleBuilder, CycleEngine, RunConfig};
    pub use crate::errors::{CycleError, SchedulerError, StagecycleError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::scheduler::{
        AsyncFnJob, FnJob, JobAction, JobOptions, JobReturn, Scheduler, SchedulerConfig,
        SchedulerDelegate, TaskExecutor, WorkerPool,
    };
    pub use crate::stages::{FnStage, Stage};
    pub use crate::utils::{generate_uuid, Timestamp};
}
