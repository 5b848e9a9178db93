//! Cycle runner: drives the orchestrator and commits each cycle's outputs.
//!
//! Handlers never write belief state. When ADAPT completes, the runner is
//! the single writer that:
//! 1. Routes the cycle's contradictions through `BeliefStore::process_batch`
//! 2. Stores the emitted `StrategyChange`
//! 3. Applies decay as of the end of the cycle
//! 4. Persists the loop
//! 5. Refreshes the context's belief snapshot for the next PLAN

use chrono::Utc;
use serde::Serialize;

use crate::core::{LoopStage, ReasoningLoop};
use crate::engine::context::CycleContext;
use crate::engine::orchestrator::LoopOrchestrator;
use crate::error::Result;
use crate::memory::{BatchReport, BeliefStore, DecayReport};

/// What one completed cycle wrote to the belief store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub loop_id: String,
    pub batch: BatchReport,
    pub strategy_change_id: Option<String>,
    pub decay: DecayReport,
}

/// Runs reasoning loops against a belief store.
#[derive(Debug)]
pub struct CycleRunner {
    orchestrator: LoopOrchestrator,
}

impl CycleRunner {
    /// Wrap an orchestrator, failing fast if any stage is unregistered.
    pub fn new(orchestrator: LoopOrchestrator) -> Result<Self> {
        orchestrator.validate()?;
        Ok(Self { orchestrator })
    }

    pub fn orchestrator(&self) -> &LoopOrchestrator {
        &self.orchestrator
    }

    /// Advance one stage. Returns the cycle outcome when the stage was ADAPT.
    ///
    /// An ADAPT step only lands on `reasoning_loop` once its outputs are
    /// committed. If the commit fails the loop stays at ADAPT, the cycle's
    /// contradictions stay in `context` and the unrecorded strategy change
    /// is dropped.
    pub fn step(
        &self,
        store: &mut BeliefStore,
        reasoning_loop: &mut ReasoningLoop,
        context: &mut CycleContext,
    ) -> Result<Option<CycleOutcome>> {
        if reasoning_loop.current_stage != LoopStage::Adapt {
            self.orchestrator.advance(reasoning_loop, context)?;
            return Ok(None);
        }

        let mut adapted = reasoning_loop.clone();
        self.orchestrator.advance(&mut adapted, context)?;
        let outcome = self
            .commit_cycle(store, &adapted, context)
            .map_err(|err| {
                tracing::warn!("loop {} could not commit ADAPT: {}", adapted.id, err);
                context.strategy_change = None;
                err
            })?;
        *reasoning_loop = adapted;
        Ok(Some(outcome))
    }

    /// Advance `advances` times, collecting the outcome of every completed cycle.
    ///
    /// Stops at the first failing stage; cycles completed before it stay committed.
    pub fn run(
        &self,
        store: &mut BeliefStore,
        reasoning_loop: &mut ReasoningLoop,
        context: &mut CycleContext,
        advances: usize,
    ) -> Result<Vec<CycleOutcome>> {
        let mut outcomes = Vec::new();
        for _ in 0..advances {
            if let Some(outcome) = self.step(store, reasoning_loop, context)? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Advance until the next ADAPT completes.
    pub fn run_cycle(
        &self,
        store: &mut BeliefStore,
        reasoning_loop: &mut ReasoningLoop,
        context: &mut CycleContext,
    ) -> Result<CycleOutcome> {
        loop {
            if let Some(outcome) = self.step(store, reasoning_loop, context)? {
                return Ok(outcome);
            }
        }
    }

    fn commit_cycle(
        &self,
        store: &mut BeliefStore,
        reasoning_loop: &ReasoningLoop,
        context: &mut CycleContext,
    ) -> Result<CycleOutcome> {
        // Validated as a whole before anything is written
        let batch = store.process_batch(context.contradictions.clone())?;

        let strategy_change_id = context.strategy_change.take().map(|change| {
            let id = change.id.clone();
            store.add_strategy_change(change);
            id
        });

        let decay = store.apply_decay(Utc::now());
        store.store_loop(reasoning_loop);

        tracing::info!(
            "loop {} completed cycle {}: {} contradiction(s), {} capped",
            reasoning_loop.id,
            reasoning_loop.completed_cycles(),
            batch.logged,
            batch.capped().count()
        );

        context.reset_cycle_outputs();
        context.refresh_beliefs(store);

        Ok(CycleOutcome {
            loop_id: reasoning_loop.id.clone(),
            batch,
            strategy_change_id,
            decay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::InterpretConfig;
    use crate::core::{
        Assumption, InsightContradiction, LinkStrength, Narrative, Organization, ReasoningStep,
    };
    use crate::engine::collaborators::{
        CosineSimilarity, Embedder, HeuristicIngestor, PlaceholderRenderer, RawFeedback,
        SimilarityScorer,
    };
    use crate::engine::context::PivotSignal;
    use crate::engine::handlers::{reference_orchestrator, InterpretHandler};
    use crate::error::MnemosyneError;

    /// Embeds any critique of "employee" content onto the assumption's axis.
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn embed(&self, text: &str) -> Option<Vec<f32>> {
            if text.to_lowercase().contains("employee") {
                Some(vec![1.0, 0.0])
            } else {
                Some(vec![0.0, 1.0])
            }
        }
    }

    fn seeded_store() -> BeliefStore {
        let mut store = BeliefStore::in_memory();
        store.add_organization(Organization::new("org_1", "Acme", "Ship it"));
        store.add_narrative(Narrative::new("nar_1", "org_1", "Engineers first"));
        store
            .add_assumption(
                Assumption::new("asm_1", "Employee voices build trust").with_embedding(vec![1.0, 0.0]),
            )
            .unwrap();
        store
    }

    /// Rounds a hair past the unit interval.
    struct OverUnitScorer;

    impl SimilarityScorer for OverUnitScorer {
        fn score(&self, _a: &[f32], _b: &[f32]) -> f64 {
            1.0000001
        }
    }

    fn runner() -> CycleRunner {
        let orchestrator = reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::with_embedder(Arc::new(KeywordEmbedder))),
            Arc::new(CosineSimilarity),
            InterpretConfig::default(),
        );
        CycleRunner::new(orchestrator).unwrap()
    }

    #[test]
    fn test_new_rejects_incomplete_orchestrator() {
        let err = CycleRunner::new(LoopOrchestrator::new()).unwrap_err();
        assert!(matches!(
            err,
            MnemosyneError::UnregisteredStage {
                stage: LoopStage::Plan
            }
        ));
    }

    #[test]
    fn test_quiet_cycle_records_maintain_decision() {
        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();

        let outcome = runner()
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap();

        assert_eq!(reasoning_loop.steps.len(), 6);
        assert_eq!(reasoning_loop.current_stage, LoopStage::Plan);
        assert_eq!(outcome.batch.logged, 0);
        let changes = store.get_strategy_changes(None);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_no_change());
        assert_eq!(store.get_loop(&reasoning_loop.id).unwrap().steps.len(), 6);
    }

    #[test]
    fn test_cycle_routes_contradictions_through_store() {
        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1")
            .unwrap()
            .with_raw_feedback(vec![
                RawFeedback::new("Employee posts feel staged and wrong"),
                RawFeedback::new("The employee spotlight is getting bad, real fatigue"),
                RawFeedback::new("Another employee puff piece, skeptical"),
                RawFeedback::new("Great transparency from the whole team"),
            ]);

        let outcome = runner()
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap();

        // Three STRONG hits (0.45 total) are capped to the per-cycle rail
        assert_eq!(outcome.batch.logged, 3);
        assert_eq!(outcome.batch.capped().count(), 1);
        let a = store.get_assumption("asm_1").unwrap();
        assert!((a.current_confidence - 0.8).abs() < 1e-9);

        let change_id = outcome.strategy_change_id.unwrap();
        let changes = store.get_strategy_changes(Some("asm_1"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, change_id);
        assert_eq!(
            reasoning_loop.last_step().unwrap().strategy_change_id.as_deref(),
            Some(change_id.as_str())
        );

        // Snapshot refreshed and side channel cleared for the next PLAN
        assert!(ctx.contradictions.is_empty());
        assert!((ctx.assumption("asm_1").unwrap().current_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_run_counts_cycles_across_the_ring() {
        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();

        let outcomes = runner()
            .run(&mut store, &mut reasoning_loop, &mut ctx, 13)
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(reasoning_loop.completed_cycles(), 2);
        assert_eq!(reasoning_loop.current_stage, LoopStage::Generate);
    }

    #[test]
    fn test_failed_plan_writes_nothing() {
        let mut store = BeliefStore::in_memory();
        store.add_organization(Organization::new("org_1", "Acme", "Ship it"));
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();

        let err = runner()
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap_err();

        assert!(err.is_caller_error());
        assert!(reasoning_loop.steps.is_empty());
        assert!(store.get_loop(&reasoning_loop.id).is_none());
        assert!(store.get_strategy_changes(None).is_empty());
    }

    #[test]
    fn test_custom_handlers_still_commit_through_runner() {
        let mut orchestrator = reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::new()),
            Arc::new(CosineSimilarity),
            InterpretConfig::default(),
        );
        orchestrator.register(
            LoopStage::Interpret,
            InterpretHandler::new(Arc::new(CosineSimilarity), InterpretConfig::default()),
        );
        orchestrator.register(
            LoopStage::Publish,
            |_: &ReasoningLoop, _: &mut CycleContext| -> Result<ReasoningStep> {
                let mut step = ReasoningStep::new(LoopStage::Publish, "publish", "pre-approved");
                step.human_approved = true;
                Ok(step)
            },
        );
        let runner = CycleRunner::new(orchestrator).unwrap();

        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();
        runner
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap();

        assert!(reasoning_loop.steps[2].human_approved);
        assert_eq!(store.get_strategy_changes(None).len(), 1);
    }

    #[test]
    fn test_out_of_range_score_fails_interpret_without_writes() {
        let orchestrator = reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::with_embedder(Arc::new(KeywordEmbedder))),
            Arc::new(OverUnitScorer),
            InterpretConfig::default(),
        );
        let runner = CycleRunner::new(orchestrator).unwrap();

        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1")
            .unwrap()
            .with_raw_feedback(vec![RawFeedback::new("Employee posts feel staged and wrong")]);

        let err = runner
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap_err();

        assert!(matches!(
            err,
            MnemosyneError::InvalidValue {
                field: "semantic_score",
                ..
            }
        ));
        assert_eq!(reasoning_loop.current_stage, LoopStage::Interpret);
        assert_eq!(reasoning_loop.steps.len(), 4);
        assert!(ctx.strategy_change.is_none());
        assert!(store.get_strategy_changes(None).is_empty());
        assert!(store.contradictions_for("asm_1").is_empty());
        assert!(store.get_loop(&reasoning_loop.id).is_none());
    }

    #[test]
    fn test_rejected_batch_keeps_loop_at_adapt() {
        let mut orchestrator = reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::new()),
            Arc::new(CosineSimilarity),
            InterpretConfig::default(),
        );
        // Writes its event unchecked, as a third-party INTERPRET might
        orchestrator.register(
            LoopStage::Interpret,
            |_: &ReasoningLoop, ctx: &mut CycleContext| -> Result<ReasoningStep> {
                let mut event = InsightContradiction::new("asm_1", "cmt_1", "staged posts", 0.15);
                event.link_strength = Some(LinkStrength::Strong);
                event.semantic_score = Some(1.0000001);
                ctx.contradictions = vec![event];
                ctx.pivot = Some(PivotSignal {
                    belief_id: "asm_1".to_string(),
                    previous_assumption: "Employee voices build trust".to_string(),
                    confidence_from: 1.0,
                    confidence_to: 0.85,
                    triggering_signals: vec!["staged posts".to_string()],
                });
                Ok(ReasoningStep::new(LoopStage::Interpret, "interpret", "one link"))
            },
        );
        let runner = CycleRunner::new(orchestrator).unwrap();

        let mut store = seeded_store();
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();

        let err = runner
            .run_cycle(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap_err();

        assert!(err.is_caller_error());
        assert_eq!(reasoning_loop.current_stage, LoopStage::Adapt);
        assert_eq!(reasoning_loop.steps.len(), 5);
        assert!(reasoning_loop
            .steps
            .iter()
            .all(|step| step.strategy_change_id.is_none()));
        assert!(store.get_strategy_changes(None).is_empty());
        assert!(store.contradictions_for("asm_1").is_empty());
        assert_eq!(ctx.contradictions.len(), 1);
        assert!(ctx.strategy_change.is_none());

        // Correcting the preserved batch lets ADAPT complete
        ctx.contradictions[0].semantic_score = Some(1.0);
        let outcome = runner
            .step(&mut store, &mut reasoning_loop, &mut ctx)
            .unwrap()
            .unwrap();

        assert_eq!(reasoning_loop.current_stage, LoopStage::Plan);
        assert_eq!(reasoning_loop.steps.len(), 6);
        assert_eq!(outcome.batch.logged, 1);
        let change_id = outcome.strategy_change_id.unwrap();
        assert_eq!(store.get_strategy_changes(None).len(), 1);
        assert_eq!(
            reasoning_loop.last_step().unwrap().strategy_change_id.as_deref(),
            Some(change_id.as_str())
        );
    }
}
