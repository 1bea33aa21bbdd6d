//! Stage action output and the constructors stage authors return.

use super::Indicator;

/// The result of one stage invocation.
///
/// Carries the replacement context, the indicator for the next tick, an
/// optional jump target and an optional output payload that the engine
/// appends to its accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput<C> {
    /// The context that replaces the engine's current one.
    pub context: C,
    /// What the engine should do on the next tick.
    pub indicator: Indicator,
    /// Stage to continue from instead of the ring successor.
    pub jump_target: Option<String>,
    /// Payload appended to the output accumulator.
    pub output: Option<serde_json::Value>,
}

impl<C> ActionOutput<C> {
    /// Creates an output with the given indicator and no payload.
    #[must_use]
    pub const fn new(context: C, indicator: Indicator) -> Self {
        Self {
            context,
            indicator,
            jump_target: None,
            output: None,
        }
    }

    /// Attaches an output payload.
    #[must_use]
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets a jump target.
    #[must_use]
    pub fn with_jump(mut self, stage: impl Into<String>) -> Self {
        self.jump_target = Some(stage.into());
        self
    }
}

/// Repeat the current stage on the next tick.
#[must_use]
pub const fn run_again<C>(context: C) -> ActionOutput<C> {
    ActionOutput::new(context, Indicator::RunAgain)
}

/// Advance to the next stage and invoke it on the next tick.
#[must_use]
pub const fn run_next<C>(context: C) -> ActionOutput<C> {
    ActionOutput::new(context, Indicator::Run)
}

/// Select the next stage on the next tick, invoking it on the one after.
#[must_use]
pub const fn pass<C>(context: C) -> ActionOutput<C> {
    ActionOutput::new(context, Indicator::Pass)
}

/// Park the engine until it is resumed.
#[must_use]
pub const fn wait<C>(context: C) -> ActionOutput<C> {
    ActionOutput::new(context, Indicator::Wait)
}

/// Finish the cycle, optionally with a final output.
#[must_use]
pub const fn over<C>(context: C, output: Option<serde_json::Value>) -> ActionOutput<C> {
    ActionOutput {
        context,
        indicator: Indicator::Over,
        jump_target: None,
        output,
    }
}

/// Continue from `stage` on the next tick.
#[must_use]
pub fn jump_to<C>(context: C, stage: impl Into<String>) -> ActionOutput<C> {
    ActionOutput::new(context, Indicator::Run).with_jump(stage)
}
