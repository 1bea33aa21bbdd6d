//! Stage trait and implementations.
//!
//! Stages are the units of work in a cycle engine's ring. A stage receives
//! the current context and returns the next one inside an [`ActionOutput`].

use crate::core::ActionOutput;
use std::fmt::Debug;

/// Trait for cycle stages.
pub trait Stage<C>: Send + Sync + Debug {
    /// Returns the unique name of the stage.
    fn name(&self) -> &str;

    /// Returns true if an error from [`Stage::action`] should repeat the
    /// stage instead of failing the cycle.
    fn allow_failure(&self) -> bool {
        false
    }

    /// Runs the stage against the current context.
    ///
    /// # Errors
    ///
    /// Any error is either retried or propagated, depending on
    /// [`Stage::allow_failure`].
    fn action(&self, ctx: &C) -> anyhow::Result<ActionOutput<C>>;
}

/// A closure-backed stage.
pub struct FnStage<F> {
    name: String,
    allow_failure: bool,
    func: F,
}

impl<F> FnStage<F> {
    /// Creates a new function-based stage that does not tolerate failures.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            allow_failure: false,
            func,
        }
    }

    /// Sets whether failures repeat the stage.
    #[must_use]
    pub fn allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }
}

impl<F> Debug for FnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("allow_failure", &self.allow_failure)
            .finish()
    }
}

impl<C, F> Stage<C> for FnStage<F>
where
    F: Fn(&C) -> anyhow::Result<ActionOutput<C>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn allow_failure(&self) -> bool {
        self.allow_failure
    }

    fn action(&self, ctx: &C) -> anyhow::Result<ActionOutput<C>> {
        (self.func)(ctx)
    }
}
