//! Testing utilities for cycles and schedulers.
//!
//! This module provides:
//! - [`FlakyStage`], a stage that fails a set number of times
//! - [`ScriptedJob`], a job that replays scripted returns
//! - [`RecordingDelegate`] and [`ManualExecutor`] for observing the scheduler
//!   deterministically

mod mocks;

pub use mocks::{
    FlakyStage, InvocationLog, ManualExecutor, RecordingDelegate, ScriptedJob,
};
