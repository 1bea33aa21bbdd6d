//! The stage-cycle engine.
//!
//! This module provides:
//! - [`CycleBuilder`] for assembling and validating a ring of stages
//! - [`CycleEngine`], the single-threaded tick-driven state machine
//! - [`RunConfig`] for driving a cycle to completion
//!
//! ```rust
//! use stagecycle::prelude::*;
//! use serde_json::json;
//!
//! let mut engine = CycleBuilder::new()
//!     .fn_stage("init", |calls: &u32| Ok(run_next(*calls)))
//!     .fn_stage("work", |calls: &u32| {
//!         if *calls == 0 {
//!             Ok(run_again(calls + 1))
//!         } else {
//!             Ok(over(calls + 1, Some(json!(42))))
//!         }
//!     })
//!     .build(0)
//!     .unwrap();
//!
//! while !engine.is_over() {
//!     engine.run().unwrap();
//! }
//! assert_eq!(engine.get_output(&json!(null)), Some(json!(42)));
//! ```

mod builder;
mod config;
mod engine;

pub use builder::CycleBuilder;
pub use config::RunConfig;
pub use engine::{CycleEngine, Reducer};
