//! Engine status snapshot.

use super::Indicator;

/// Snapshot of a cycle engine between ticks.
///
/// The stage index stands in for a reference to the stage action, so a
/// `RunAgain` tick can re-invoke the selected stage without re-selecting it.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStatus<C> {
    /// Name of the currently selected stage, if any has been selected.
    pub stage: Option<String>,
    /// Ring position of the currently selected stage.
    pub stage_index: Option<usize>,
    /// The current context.
    pub context: C,
    /// The indicator for the next tick.
    pub indicator: Indicator,
    /// Whether the selected stage tolerates failures.
    pub allow_failure: bool,
    /// Output produced by the last invocation, if any.
    pub output: Option<serde_json::Value>,
    /// Number of ticks that changed state.
    pub ticks: u64,
}

impl<C> CycleStatus<C> {
    pub(crate) const fn initial(context: C) -> Self {
        Self {
            stage: None,
            stage_index: None,
            context,
            indicator: Indicator::Run,
            allow_failure: false,
            output: None,
            ticks: 0,
        }
    }

    /// Returns true once the cycle is over.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.indicator.is_terminal()
    }
}
