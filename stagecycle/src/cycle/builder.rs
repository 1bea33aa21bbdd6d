//! Cycle builder with validation.

use super::engine::{CycleEngine, Reducer};
use crate::core::ActionOutput;
use crate::errors::CycleError;
use crate::events::{get_event_sink, EventSink};
use crate::stages::{FnStage, Stage};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for creating validated cycle engines.
///
/// Stages form a ring in the order they are added.
pub struct CycleBuilder<C> {
    stages: Vec<Box<dyn Stage<C>>>,
    reducer: Option<Reducer>,
    events: Option<Arc<dyn EventSink>>,
}

impl<C> Default for CycleBuilder<C> {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            reducer: None,
            events: None,
        }
    }
}

impl<C> CycleBuilder<C> {
    /// Creates a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage to the ring.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage<C> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Appends a closure stage whose errors are fatal.
    #[must_use]
    pub fn fn_stage<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<ActionOutput<C>> + Send + Sync + 'static,
    {
        self.stage(FnStage::new(name, func))
    }

    /// Appends a closure stage whose errors repeat the stage.
    #[must_use]
    pub fn fallible_stage<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<ActionOutput<C>> + Send + Sync + 'static,
    {
        self.stage(FnStage::new(name, func).allow_failure(true))
    }

    /// Sets the reducer applied by [`CycleEngine::get_output`].
    #[must_use]
    pub fn reducer<F>(mut self, reducer: F) -> Self
    where
        F: Fn(Option<&serde_json::Value>, &serde_json::Value) -> Option<serde_json::Value>
            + Send
            + Sync
            + 'static,
    {
        self.reducer = Some(Box::new(reducer));
        self
    }

    /// Sets the event sink. Defaults to the process-wide sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stage has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Builds the engine with its initial context.
    ///
    /// # Errors
    ///
    /// Returns an error if the ring is empty or two stages share a name.
    pub fn build(self, initial_context: C) -> Result<CycleEngine<C>, CycleError> {
        if self.stages.is_empty() {
            return Err(CycleError::EmptyRing);
        }

        let mut index = HashMap::with_capacity(self.stages.len());
        for (position, stage) in self.stages.iter().enumerate() {
            if index.insert(stage.name().to_string(), position).is_some() {
                return Err(CycleError::DuplicateStage {
                    name: stage.name().to_string(),
                });
            }
        }

        let events = self.events.unwrap_or_else(get_event_sink);
        Ok(CycleEngine::new(
            self.stages,
            index,
            initial_context,
            self.reducer,
            events,
        ))
    }
}

impl<C> std::fmt::Debug for CycleBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleBuilder")
            .field("stages", &self.stages)
            .field("has_reducer", &self.reducer.is_some())
            .finish()
    }
}
