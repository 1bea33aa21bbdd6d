//! The stage-cycle engine.

use super::RunConfig;
use crate::core::{ActionOutput, CycleStatus, Indicator};
use crate::errors::CycleError;
use crate::events::EventSink;
use crate::stages::Stage;
use crate::utils::panic_message;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reducer applied to the latest output by [`CycleEngine::get_output`].
pub type Reducer = Box<dyn Fn(Option<&Value>, &Value) -> Option<Value> + Send + Sync>;

/// A cooperative state machine over a ring of named stages.
///
/// Each call to [`CycleEngine::run`] performs exactly one tick. The engine
/// never blocks or spawns work; callers that share an engine across threads
/// must serialize access themselves.
pub struct CycleEngine<C> {
    stages: Vec<Box<dyn Stage<C>>>,
    index: HashMap<String, usize>,
    /// Position the next advancing tick moves forward from.
    cursor: Option<usize>,
    status: CycleStatus<C>,
    outputs: Vec<Value>,
    reducer: Option<Reducer>,
    events: Arc<dyn EventSink>,
}

impl<C> CycleEngine<C> {
    pub(crate) fn new(
        stages: Vec<Box<dyn Stage<C>>>,
        index: HashMap<String, usize>,
        initial_context: C,
        reducer: Option<Reducer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stages,
            index,
            cursor: None,
            status: CycleStatus::initial(initial_context),
            outputs: Vec::new(),
            reducer,
            events,
        }
    }

    /// Advances the engine by one tick and returns the updated status.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::StageFailed`] or [`CycleError::StagePanicked`]
    /// when a stage that does not allow failure fails, and
    /// [`CycleError::UnknownStage`] when a stage jumps to a missing stage.
    /// In both cases the status is left as it was before the call.
    pub fn run(&mut self) -> Result<&CycleStatus<C>, CycleError> {
        match self.status.indicator {
            Indicator::Wait | Indicator::Over => {}
            Indicator::Pass => {
                let next = self.next_position();
                self.select(next);
                self.status.indicator = Indicator::RunAgain;
                self.status.output = None;
                self.status.ticks += 1;
                debug!(stage = ?self.status.stage, "Selected stage without invoking it");
            }
            Indicator::Run => {
                let next = self.next_position();
                self.invoke(next)?;
            }
            Indicator::RunAgain => {
                let current = self.cursor.unwrap_or(0);
                self.invoke(current)?;
            }
        }
        Ok(&self.status)
    }

    /// Returns true once the cycle has reached `Over`.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.status.is_over()
    }

    /// Lets a waiting engine continue with the next stage.
    ///
    /// Has no effect unless the engine is in the `Wait` state.
    pub fn resume(&mut self) {
        if self.status.indicator == Indicator::Wait {
            self.status.indicator = Indicator::Run;
            debug!(stage = ?self.status.stage, "Cycle resumed");
        }
    }

    /// Returns the most recent output, passed through the reducer if one
    /// was configured.
    #[must_use]
    pub fn get_output(&self, extra: &Value) -> Option<Value> {
        let last = self.outputs.last();
        match &self.reducer {
            Some(reducer) => reducer(last, extra),
            None => last.cloned(),
        }
    }

    /// Returns the current status snapshot.
    #[must_use]
    pub const fn status(&self) -> &CycleStatus<C> {
        &self.status
    }

    /// Returns the current context.
    #[must_use]
    pub const fn context(&self) -> &C {
        &self.status.context
    }

    /// Returns every output produced so far, oldest first.
    #[must_use]
    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }

    /// Returns the stage names in ring order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Ticks until the cycle is over, pausing `interval` between ticks.
    ///
    /// Outputs produced along the way are handed to the reducer as a JSON
    /// array.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::Timeout`] if `timeout_ticks` ticks pass without
    /// reaching `Over`, or any error raised by [`CycleEngine::run`].
    pub async fn run_until_complete(
        &mut self,
        timeout_ticks: usize,
        interval: Duration,
    ) -> Result<Option<Value>, CycleError> {
        let mut collected = Vec::new();
        if self.is_over() {
            return Ok(self.get_output(&Value::Array(collected)));
        }

        for tick in 0..timeout_ticks {
            if tick > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            let produced_before = self.outputs.len();
            self.run()?;
            if self.outputs.len() > produced_before {
                collected.extend(self.outputs[produced_before..].iter().cloned());
            }

            if self.is_over() {
                return Ok(self.get_output(&Value::Array(collected)));
            }
        }

        warn!(ticks = timeout_ticks, stage = ?self.status.stage, "Cycle timed out");
        Err(CycleError::Timeout {
            ticks: timeout_ticks,
        })
    }

    /// Same as [`CycleEngine::run_until_complete`] with settings from a
    /// [`RunConfig`].
    ///
    /// # Errors
    ///
    /// See [`CycleEngine::run_until_complete`].
    pub async fn run_until_complete_with(
        &mut self,
        config: &RunConfig,
    ) -> Result<Option<Value>, CycleError> {
        self.run_until_complete(config.timeout_ticks, config.tick_interval())
            .await
    }

    fn next_position(&self) -> usize {
        self.cursor.map_or(0, |i| (i + 1) % self.stages.len())
    }

    fn select(&mut self, position: usize) {
        let stage = &self.stages[position];
        self.cursor = Some(position);
        self.status.stage = Some(stage.name().to_string());
        self.status.stage_index = Some(position);
        self.status.allow_failure = stage.allow_failure();
    }

    /// Invokes the stage at `position` inside the failure boundary.
    ///
    /// Nothing is committed until the stage has succeeded or its failure has
    /// been turned into a retry.
    fn invoke(&mut self, position: usize) -> Result<(), CycleError> {
        let (name, allow_failure) = {
            let stage = &self.stages[position];
            (stage.name().to_string(), stage.allow_failure())
        };

        let stage = &self.stages[position];
        let context = &self.status.context;
        let outcome = catch_unwind(AssertUnwindSafe(|| stage.action(context)));

        let failure = match outcome {
            Ok(Ok(output)) => return self.apply(position, &name, output),
            Ok(Err(err)) => CycleError::stage_failed(&name, err),
            Err(payload) => CycleError::StagePanicked {
                stage: name.clone(),
                message: panic_message(payload.as_ref()),
            },
        };

        if allow_failure {
            warn!(stage = %name, error = %failure, "Stage failed, retrying on next tick");
            self.events.emit(
                "cycle.stage.retrying",
                Some(json!({"stage": name, "error": failure.to_string()})),
            );
            self.select(position);
            self.status.indicator = Indicator::RunAgain;
            self.status.output = None;
            self.status.ticks += 1;
            return Ok(());
        }

        error!(stage = %name, error = %failure, "Stage failed");
        self.events.emit(
            "cycle.stage.failed",
            Some(json!({"stage": name, "error": failure.to_string()})),
        );
        Err(failure)
    }

    fn apply(&mut self, position: usize, name: &str, output: ActionOutput<C>) -> Result<(), CycleError> {
        let jump = match &output.jump_target {
            Some(target) => Some(*self.index.get(target).ok_or_else(|| {
                CycleError::UnknownStage {
                    from: name.to_string(),
                    target: target.clone(),
                }
            })?),
            None => None,
        };

        let ActionOutput {
            context,
            indicator,
            output,
            ..
        } = output;

        self.select(position);
        self.status.context = context;
        self.status.indicator = indicator;
        self.status.ticks += 1;
        if let Some(value) = &output {
            self.outputs.push(value.clone());
        }
        self.status.output = output;

        debug!(stage = %name, indicator = %indicator, "Stage invoked");
        self.events.emit(
            "cycle.stage.invoked",
            Some(json!({"stage": name, "indicator": indicator.to_string()})),
        );

        if let Some(target) = jump {
            if indicator == Indicator::RunAgain {
                self.select(target);
            } else {
                let len = self.stages.len();
                self.cursor = Some((target + len - 1) % len);
            }
            debug!(from = %name, to = %self.stages[target].name(), "Jump requested");
            self.events.emit(
                "cycle.jump",
                Some(json!({"from": name, "to": self.stages[target].name()})),
            );
        }

        if indicator == Indicator::Over {
            info!(stage = %name, ticks = self.status.ticks, "Cycle over");
            self.events
                .emit("cycle.over", Some(json!({"stage": name, "ticks": self.status.ticks})));
        }

        Ok(())
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for CycleEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleEngine")
            .field("stages", &self.stage_names())
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .field("outputs", &self.outputs.len())
            .finish()
    }
}
