//! The indicator governing the engine's next tick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control signal for the next tick of a cycle engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Select the next stage without invoking it.
    Pass,
    /// Advance to the next stage and invoke it.
    #[default]
    Run,
    /// Invoke the current stage again.
    RunAgain,
    /// Do nothing until resumed.
    Wait,
    /// The cycle is complete. Terminal.
    Over,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Run => write!(f, "run"),
            Self::RunAgain => write!(f, "run_again"),
            Self::Wait => write!(f, "wait"),
            Self::Over => write!(f, "over"),
        }
    }
}

impl Indicator {
    /// Returns true if no further tick can have an effect.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Over)
    }

    /// Returns true if the next tick calls a stage action.
    #[must_use]
    pub const fn invokes_stage(&self) -> bool {
        matches!(self, Self::Run | Self::RunAgain)
    }

    /// Returns true if the next tick moves the cursor forward.
    #[must_use]
    pub const fn advances(&self) -> bool {
        matches!(self, Self::Pass | Self::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_display() {
        assert_eq!(Indicator::Pass.to_string(), "pass");
        assert_eq!(Indicator::RunAgain.to_string(), "run_again");
        assert_eq!(Indicator::Over.to_string(), "over");
    }

    #[test]
    fn test_indicator_predicates() {
        assert!(Indicator::Over.is_terminal());
        assert!(!Indicator::Wait.is_terminal());

        assert!(Indicator::Run.invokes_stage());
        assert!(Indicator::RunAgain.invokes_stage());
        assert!(!Indicator::Pass.invokes_stage());

        assert!(Indicator::Pass.advances());
        assert!(Indicator::Run.advances());
        assert!(!Indicator::RunAgain.advances());
        assert!(!Indicator::Wait.advances());
    }

    #[test]
    fn test_indicator_default_is_run() {
        assert_eq!(Indicator::default(), Indicator::Run);
    }

    #[test]
    fn test_indicator_serialize() {
        let json = serde_json::to_string(&Indicator::RunAgain).unwrap();
        assert_eq!(json, r#""run_again""#);

        let back: Indicator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Indicator::RunAgain);
    }
}
