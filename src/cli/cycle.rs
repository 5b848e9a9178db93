//! Cycle command for Mnemosyne.
//!
//! Runs the reference reasoning loop for one organization against the
//! belief store, with semantic links classified by the `[interpret]`
//! thresholds. Feedback is read from a JSON array and observed once, by the
//! first cycle.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::core::{LoopStage, Organization, ReasoningLoop};
use crate::engine::{
    reference_orchestrator, CosineSimilarity, CycleContext, CycleOutcome, CycleRunner,
    HeuristicIngestor, PlaceholderRenderer, RawFeedback,
};
use crate::error::Result;
use crate::memory::BeliefStore;
use crate::util::read_json_file;

/// Options for the cycle command.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Stage advancements to run (default: one full cycle).
    pub advances: Option<usize>,
    /// Create the organization under this name if it does not exist.
    pub org_name: Option<String>,
    /// Let PLAN proceed without an active assumption, for this reason.
    pub override_reason: Option<String>,
}

/// Output format for the cycle command.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutput {
    /// Whether every requested advancement succeeded.
    pub success: bool,
    pub org_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_id: Option<String>,
    /// Stage the loop will run next.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<LoopStage>,
    pub steps: usize,
    /// Completed cycles, in order. Kept when a later stage fails.
    pub outcomes: Vec<CycleOutcome>,
    /// Set when the change is held in memory but could not be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Error message from the stage that stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleOutput {
    /// Create an output describing where `reasoning_loop` stopped.
    pub fn from_loop(reasoning_loop: &ReasoningLoop, outcomes: Vec<CycleOutcome>) -> Self {
        Self {
            success: true,
            org_id: reasoning_loop.org_id.clone(),
            loop_id: Some(reasoning_loop.id.clone()),
            current_stage: Some(reasoning_loop.current_stage),
            steps: reasoning_loop.steps.len(),
            outcomes,
            warning: None,
            error: None,
        }
    }

    /// Create a failed output for a run that never started.
    pub fn failure(org_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            org_id: org_id.into(),
            loop_id: None,
            current_stage: None,
            steps: 0,
            outcomes: Vec::new(),
            warning: None,
            error: Some(error.into()),
        }
    }
}

/// The cycle command implementation.
pub struct CycleCommand {
    store: BeliefStore,
    config: Config,
}

impl CycleCommand {
    /// Create a new cycle command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the cycle command, reading feedback from `feedback` if given.
    pub fn run(&mut self, org_id: &str, feedback: Option<&Path>, options: &CycleOptions) -> CycleOutput {
        let raw = match feedback.map(read_json_file::<Vec<RawFeedback>>).transpose() {
            Ok(raw) => raw.unwrap_or_default(),
            Err(e) => return CycleOutput::failure(org_id, e.to_string()),
        };
        self.run_with_feedback(org_id, raw, options)
    }

    /// Run the cycle command with already-parsed feedback.
    pub fn run_with_feedback(
        &mut self,
        org_id: &str,
        feedback: Vec<RawFeedback>,
        options: &CycleOptions,
    ) -> CycleOutput {
        if let Some(name) = &options.org_name {
            if self.store.get_organization(org_id).is_none() {
                tracing::info!("creating organization {} ({})", org_id, name);
                self.store
                    .add_organization(Organization::new(org_id, name.clone(), String::new()));
            }
        }

        let runner = match self.runner() {
            Ok(runner) => runner,
            Err(e) => return CycleOutput::failure(org_id, e.to_string()),
        };
        let mut context = match CycleContext::from_store(&self.store, org_id) {
            Ok(context) => context.with_raw_feedback(feedback),
            Err(e) => return CycleOutput::failure(org_id, e.to_string()),
        };
        if let Some(reason) = &options.override_reason {
            context = context.with_memory_override_reason(reason.clone());
        }

        let mut reasoning_loop = ReasoningLoop::new(org_id);
        let advances = options.advances.unwrap_or(LoopStage::ALL.len());
        let mut outcomes = Vec::new();
        let mut error = None;

        for _ in 0..advances {
            match runner.step(&mut self.store, &mut reasoning_loop, &mut context) {
                Ok(Some(outcome)) => {
                    outcomes.push(outcome);
                    context.raw_feedback.clear();
                }
                Ok(None) => {}
                Err(e) => {
                    error = Some(e.to_string());
                    break;
                }
            }
        }

        let mut output = CycleOutput::from_loop(&reasoning_loop, outcomes);
        output.success = error.is_none();
        output.error = error;
        output.warning = persistence_warning(&self.store);
        output
    }

    fn runner(&self) -> Result<CycleRunner> {
        CycleRunner::new(reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::new()),
            Arc::new(CosineSimilarity),
            self.config.interpret.clone(),
        ))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CycleOutput, options: &CycleOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &CycleOutput) -> String {
        let mut lines = Vec::new();

        if let (Some(loop_id), Some(stage)) = (&output.loop_id, output.current_stage) {
            lines.push(format!(
                "Loop {} for {}: {} step(s), next stage {}",
                loop_id, output.org_id, output.steps, stage
            ));
        }

        for (index, outcome) in output.outcomes.iter().enumerate() {
            let change = outcome
                .strategy_change_id
                .as_deref()
                .unwrap_or("none");
            lines.push(format!(
                "Cycle {}: {} contradiction(s), {} capped, strategy change {}",
                index + 1,
                outcome.batch.logged,
                outcome.batch.capped().count(),
                change
            ));
            for update in &outcome.batch.updates {
                let rail = if update.capped { " (SAFETY RAIL)" } else { "" };
                lines.push(format!(
                    "  {}: {:.2} -> {:.2}{}",
                    update.target_id, update.confidence_before, update.confidence_after, rail
                ));
            }
        }

        if let Some(warning) = &output.warning {
            lines.push(format!("Warning: {}", warning));
        }
        if let Some(error) = &output.error {
            lines.push(format!("Cycle failed: {}", error));
        }

        lines.join("\n") + "\n"
    }
}
