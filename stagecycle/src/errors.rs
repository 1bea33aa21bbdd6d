//! Error types for the stagecycle crate.
//!
//! Each component has its own error enum; [`StagecycleError`] wraps both for
//! callers that drive an engine and a scheduler side by side.

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stagecycle operations.
#[derive(Debug, Error)]
pub enum StagecycleError {
    /// A stage-cycle engine error.
    #[error("{0}")]
    Cycle(#[from] CycleError),

    /// A scheduler error.
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StagecycleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl StagecycleError {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match self {
            Self::Cycle(err) => err.to_dict(),
            Self::Scheduler(err) => err.to_dict(),
            Self::Serialization(msg) => {
                let mut map = HashMap::new();
                map.insert("type".to_string(), serde_json::json!("Serialization"));
                map.insert("message".to_string(), serde_json::json!(msg));
                map
            }
        }
    }
}

/// Errors raised by the stage-cycle engine.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The engine was built without any stage.
    #[error("Stage ring is empty")]
    EmptyRing,

    /// Two stages share a name.
    #[error("Duplicate stage name: {name}")]
    DuplicateStage {
        /// The duplicated name.
        name: String,
    },

    /// A stage asked to jump to a stage that is not in the ring.
    #[error("Stage '{from}' requested a jump to unknown stage '{target}'")]
    UnknownStage {
        /// The stage that returned the jump.
        from: String,
        /// The missing target.
        target: String,
    },

    /// A stage without `allow_failure` returned an error.
    #[error("Stage '{stage}' failed: {source:#}")]
    StageFailed {
        /// The failing stage.
        stage: String,
        /// The original error, with its full cause chain.
        #[source]
        source: anyhow::Error,
    },

    /// A stage without `allow_failure` panicked.
    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked {
        /// The failing stage.
        stage: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The cycle did not reach `Over` within the tick budget.
    #[error("Cycle did not complete within {ticks} ticks")]
    Timeout {
        /// The exhausted tick budget.
        ticks: usize,
    },
}

impl CycleError {
    /// Creates a stage failure error.
    #[must_use]
    pub fn stage_failed(stage: impl Into<String>, source: anyhow::Error) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            source,
        }
    }

    /// Returns the stage involved in the error, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::DuplicateStage { name } => Some(name),
            Self::UnknownStage { from, .. } => Some(from),
            Self::StageFailed { stage, .. } | Self::StagePanicked { stage, .. } => Some(stage),
            Self::EmptyRing | Self::Timeout { .. } => None,
        }
    }

    /// Returns true for the tick-budget timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::EmptyRing => "EmptyRing",
            Self::DuplicateStage { .. } => "DuplicateStage",
            Self::UnknownStage { target, .. } => {
                map.insert("target".to_string(), serde_json::json!(target));
                "UnknownStage"
            }
            Self::StageFailed { source, .. } => {
                let chain: Vec<String> = source.chain().map(ToString::to_string).collect();
                map.insert("causes".to_string(), serde_json::json!(chain));
                "StageFailed"
            }
            Self::StagePanicked { .. } => "StagePanicked",
            Self::Timeout { ticks } => {
                map.insert("ticks".to_string(), serde_json::json!(ticks));
                "Timeout"
            }
        };

        map.insert("type".to_string(), serde_json::json!(kind));
        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Errors raised by the interval job scheduler.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// `start()` was called while the loop is already running.
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// The scheduler configuration is invalid.
    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        let kind = match self {
            Self::AlreadyRunning => "AlreadyRunning",
            Self::InvalidConfig(_) => "InvalidConfig",
        };
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}
