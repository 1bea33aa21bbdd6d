//! Scheduler configuration.

use crate::errors::SchedulerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Scheduler`](super::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of jobs executing at once.
    pub max_concurrency: usize,
    /// How long the loop sleeps when the timeline is empty, in milliseconds.
    pub idle_poll_interval_ms: u64,
    /// Exit the loop once the timeline is empty and the pool is idle.
    pub stop_when_empty: bool,
    /// Reschedule interval jobs whose action failed instead of dropping them.
    pub reschedule_on_failure: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            idle_poll_interval_ms: 1000,
            stop_when_empty: false,
            reschedule_on_failure: false,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new scheduler config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the idle poll interval.
    #[must_use]
    pub const fn with_idle_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.idle_poll_interval_ms = interval_ms;
        self
    }

    /// Sets whether the loop exits when there is nothing left to do.
    #[must_use]
    pub const fn with_stop_when_empty(mut self, stop: bool) -> Self {
        self.stop_when_empty = stop;
        self
    }

    /// Sets whether failed interval jobs are rescheduled.
    #[must_use]
    pub const fn with_reschedule_on_failure(mut self, reschedule: bool) -> Self {
        self.reschedule_on_failure = reschedule;
        self
    }

    /// Returns the idle poll interval.
    #[must_use]
    pub const fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for a zero concurrency cap
    /// or a zero poll interval.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrency must be >= 1".to_string(),
            ));
        }
        if self.idle_poll_interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "idle_poll_interval_ms must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.idle_poll_interval(), Duration::from_secs(1));
        assert!(!config.stop_when_empty);
        assert!(!config.reschedule_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduler_config_builder() {
        let config = SchedulerConfig::new()
            .with_max_concurrency(2)
            .with_idle_poll_interval_ms(50)
            .with_stop_when_empty(true)
            .with_reschedule_on_failure(true);

        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.idle_poll_interval_ms, 50);
        assert!(config.stop_when_empty);
        assert!(config.reschedule_on_failure);
    }

    #[test]
    fn test_scheduler_config_validate() {
        let err = SchedulerConfig::new().with_max_concurrency(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));

        let err = SchedulerConfig::new()
            .with_idle_poll_interval_ms(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("idle_poll_interval_ms"));
    }

    #[test]
    fn test_scheduler_config_partial_deserialize() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"max_concurrency": 8, "stop_when_empty": true}"#).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert!(config.stop_when_empty);
        assert_eq!(config.idle_poll_interval_ms, 1000);
    }
}
