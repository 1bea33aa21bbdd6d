//! Core control-flow types for the stage-cycle engine.
//!
//! This module contains:
//! - The five-state [`Indicator`]
//! - [`ActionOutput`] and the constructors stage authors use to build it
//! - The [`CycleStatus`] snapshot kept between ticks

mod indicator;
mod output;
mod status;

pub use indicator::Indicator;
pub use output::{jump_to, over, pass, run_again, run_next, wait, ActionOutput};
pub use status::CycleStatus;
