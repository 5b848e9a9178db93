//! Loop orchestrator: the six-stage reasoning ring.
//!
//! The orchestrator owns stage dispatch only. It looks up the handler for
//! the loop's current stage, appends the step the handler returns and moves
//! the loop to the next stage. There is no terminal stage: after ADAPT the
//! loop wraps back to PLAN. Deciding how many advancements make a "run" is
//! the caller's concern.
//!
//! Evidence binding at PLAN is enforced by the PLAN handler, not here, so a
//! custom PLAN handler owns that contract.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::{LoopStage, ReasoningLoop, ReasoningStep};
use crate::engine::context::CycleContext;
use crate::error::{MnemosyneError, Result};

/// One stage of the reasoning cycle.
pub trait StageHandler: Send + Sync {
    /// Produce exactly one step for `reasoning_loop.current_stage`.
    ///
    /// Handlers may write side-channel outputs into `context`. Returning an
    /// error leaves the loop where it was.
    fn handle(&self, reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep>;
}

impl<F> StageHandler for F
where
    F: Fn(&ReasoningLoop, &mut CycleContext) -> Result<ReasoningStep> + Send + Sync,
{
    fn handle(&self, reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        self(reasoning_loop, context)
    }
}

/// Dispatches each stage of a [`ReasoningLoop`] to its registered handler.
#[derive(Default)]
pub struct LoopOrchestrator {
    handlers: BTreeMap<LoopStage, Box<dyn StageHandler>>,
}

impl fmt::Debug for LoopOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopOrchestrator")
            .field("stages", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LoopOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `stage`. The last registration for a stage wins.
    pub fn register(&mut self, stage: LoopStage, handler: impl StageHandler + 'static) {
        if self.handlers.insert(stage, Box::new(handler)).is_some() {
            tracing::debug!("replaced handler for stage {}", stage);
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_handler(mut self, stage: LoopStage, handler: impl StageHandler + 'static) -> Self {
        self.register(stage, handler);
        self
    }

    pub fn is_registered(&self, stage: LoopStage) -> bool {
        self.handlers.contains_key(&stage)
    }

    /// Fail fast if any stage of the ring lacks a handler.
    pub fn validate(&self) -> Result<()> {
        match LoopStage::ALL.iter().find(|stage| !self.is_registered(**stage)) {
            Some(stage) => Err(MnemosyneError::unregistered_stage(*stage)),
            None => Ok(()),
        }
    }

    /// Run the handler for the loop's current stage and advance the loop.
    ///
    /// On success the new step is appended and `current_stage` moves to the
    /// next stage in the ring. On any error the loop is left untouched.
    pub fn advance<'l>(
        &self,
        reasoning_loop: &'l mut ReasoningLoop,
        context: &mut CycleContext,
    ) -> Result<&'l ReasoningStep> {
        let stage = reasoning_loop.current_stage;
        let handler = self
            .handlers
            .get(&stage)
            .ok_or_else(|| MnemosyneError::unregistered_stage(stage))?;

        let step = handler.handle(reasoning_loop, context).map_err(|err| {
            tracing::warn!("stage {} failed for loop {}: {}", stage, reasoning_loop.id, err);
            err
        })?;

        if step.stage != stage {
            return Err(MnemosyneError::invalid_value(
                "stage",
                format!("handler for {} returned a {} step", stage, step.stage),
            ));
        }

        reasoning_loop.steps.push(step);
        reasoning_loop.current_stage = stage.next();
        tracing::debug!(
            "loop {} advanced {} -> {}",
            reasoning_loop.id,
            stage,
            reasoning_loop.current_stage
        );

        Ok(&reasoning_loop.steps[reasoning_loop.steps.len() - 1])
    }
}
