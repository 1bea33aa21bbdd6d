//! Utility functions for identifiers and timestamp arithmetic.

mod panics;
pub mod timestamps;
mod uuid_utils;

pub use timestamps::{
    add_duration, add_seconds, duration_until, from_unix_seconds, now_utc, random_jitter,
    unix_seconds, Timestamp,
};
pub use panics::panic_message;
pub use uuid_utils::{generate_job_id, generate_uuid};
