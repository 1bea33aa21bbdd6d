//! Driver configuration for running a cycle to completion.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`CycleEngine::run_until_complete_with`].
///
/// [`CycleEngine::run_until_complete_with`]: super::CycleEngine::run_until_complete_with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of ticks before giving up with a timeout.
    pub timeout_ticks: usize,
    /// Pause between ticks in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: 1000,
            tick_interval_ms: 0,
        }
    }
}

impl RunConfig {
    /// Creates a new run config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick budget.
    #[must_use]
    pub const fn with_timeout_ticks(mut self, ticks: usize) -> Self {
        self.timeout_ticks = ticks;
        self
    }

    /// Sets the pause between ticks.
    #[must_use]
    pub const fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    /// Returns the pause between ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
