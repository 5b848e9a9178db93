//! Reference stage handlers for the six-stage cycle.
//!
//! PLAN binds the cycle to active beliefs. GENERATE, PUBLISH and OBSERVE
//! delegate to external collaborators. INTERPRET turns critique into
//! contradiction events. ADAPT records the decision as a `StrategyChange`.
//!
//! None of these handlers mutate belief confidence. Contradictions and
//! strategy changes are left in the [`CycleContext`] for the cycle runner to
//! route through the belief store.

use std::sync::Arc;

use chrono::Duration;

use crate::config::InterpretConfig;
use crate::core::{
    InsightContradiction, LinkStrength, LoopStage, ReasoningLoop, ReasoningStep, RiskLevel,
    StrategyChange,
};
use crate::engine::collaborators::{
    CommentIntent, Embedder, Ingestor, Renderer, SimilarityScorer,
};
use crate::engine::context::{CycleContext, PivotSignal};
use crate::engine::orchestrator::{LoopOrchestrator, StageHandler};
use crate::error::{MnemosyneError, Result};
use crate::util::truncate_chars;

/// Insights above this confidence are referenced by PLAN.
pub const INSIGHT_REFERENCE_THRESHOLD: f64 = 0.5;

/// Review horizon for a pivot.
pub const PIVOT_REVIEW_DAYS: i64 = 30;

/// Review horizon for a decision to hold course.
pub const MAINTAIN_REVIEW_DAYS: i64 = 14;

const CRITIQUE_EXCERPT_CHARS: usize = 50;

/// PLAN: bind the cycle to active assumptions or an explicit override.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanHandler;

impl StageHandler for PlanHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let referenced_insights: Vec<String> = context
            .insights
            .iter()
            .filter(|i| i.confidence > INSIGHT_REFERENCE_THRESHOLD)
            .map(|i| i.id.clone())
            .collect();
        let bound: Vec<_> = context.assumptions.iter().filter(|a| a.is_active()).collect();
        let override_reason = context.override_reason();

        if bound.is_empty() && override_reason.is_none() {
            return Err(MnemosyneError::missing_evidence(
                LoopStage::Plan,
                "a plan must reference at least one active assumption or record why memory is set aside",
            ));
        }

        let mut decisions = vec![
            "Assign content piece to the active narrative".to_string(),
            "Target the existing audience".to_string(),
        ];
        for assumption in bound.iter().filter(|a| a.risk_level == RiskLevel::High) {
            decisions.push(format!(
                "WARNING: Proceeding with high risk assumption {} (confidence {:.2}). Validation required.",
                assumption.id, assumption.current_confidence
            ));
        }

        let intent = match &context.narrative {
            Some(narrative) => format!("Develop a content plan for narrative: {}", narrative.title),
            None => "Develop a content plan".to_string(),
        };
        let rationale = match &context.organization {
            Some(org) => format!(
                "Plan for {} rests on {} assumption(s) and {} insight(s)",
                org.name,
                bound.len(),
                referenced_insights.len()
            ),
            None => format!("Plan rests on {} assumption(s)", bound.len()),
        };

        let context_used = context
            .organization
            .iter()
            .map(|o| o.id.clone())
            .chain(context.narrative.iter().map(|n| n.id.clone()))
            .collect();
        let referenced_assumptions = bound.iter().map(|a| a.id.clone()).collect();

        let mut step = ReasoningStep::new(LoopStage::Plan, intent, rationale)
            .with_decisions(decisions)
            .with_context_used(context_used)
            .with_references(referenced_insights, referenced_assumptions)
            .with_memory_override_reason(override_reason);
        if let Some(statement) = bound.first().map(|a| a.statement.clone()) {
            step = step.with_hypothesis(format!("Content built on '{}' will hold up", statement));
        }
        Ok(step)
    }
}

/// GENERATE: request a draft artifact from the renderer.
#[derive(Clone)]
pub struct GenerateHandler {
    renderer: Arc<dyn Renderer>,
}

impl GenerateHandler {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

impl StageHandler for GenerateHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let visual_intent = match &context.narrative {
            Some(narrative) => match narrative.key_messages.first() {
                Some(message) => format!("{}: {}", narrative.title, message),
                None => narrative.title.clone(),
            },
            None => "organization update".to_string(),
        };

        let artifact = self.renderer.render(&visual_intent)?;
        let decisions = vec![
            format!("Created draft artifact {}", artifact.id),
            format!("Rendered via {} at {}", artifact.renderer, artifact.path.display()),
        ];
        let context_used = context.narrative.iter().map(|n| n.id.clone()).collect();
        context.artifact = Some(artifact);

        Ok(ReasoningStep::new(
            LoopStage::Generate,
            "Generate content drafts based on the active plan",
            format!("Draft derived from visual intent '{}'", visual_intent),
        )
        .with_decisions(decisions)
        .with_context_used(context_used))
    }
}

/// PUBLISH: hold for human sign-off.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishHandler;

impl StageHandler for PublishHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let decision = match &context.artifact {
            Some(artifact) => format!("Awaiting human sign-off on artifact {}", artifact.id),
            None => "Awaiting human sign-off".to_string(),
        };
        Ok(ReasoningStep::new(
            LoopStage::Publish,
            "Obtain human approval for publishing",
            "All publishing requires a human in the loop",
        )
        .with_decisions(vec![decision]))
    }
}

/// OBSERVE: classify raw feedback into comments.
#[derive(Clone)]
pub struct ObserveHandler {
    ingestor: Arc<dyn Ingestor>,
}

impl ObserveHandler {
    pub fn new(ingestor: Arc<dyn Ingestor>) -> Self {
        Self { ingestor }
    }
}

impl StageHandler for ObserveHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let comments = self.ingestor.ingest(&context.raw_feedback)?;
        let critiques = comments
            .iter()
            .filter(|c| c.intent == CommentIntent::Critique)
            .count();
        let decision = format!(
            "Ingested {} comment(s), {} critique(s)",
            comments.len(),
            critiques
        );
        context.comments = comments;

        Ok(ReasoningStep::new(
            LoopStage::Observe,
            "Collect signals from the published content",
            "Ingesting raw feedback to extract high-signal comments",
        )
        .with_decisions(vec![decision]))
    }
}

/// INTERPRET: link critique to assumptions by semantic similarity.
#[derive(Clone)]
pub struct InterpretHandler {
    scorer: Arc<dyn SimilarityScorer>,
    thresholds: InterpretConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl InterpretHandler {
    pub fn new(scorer: Arc<dyn SimilarityScorer>, thresholds: InterpretConfig) -> Self {
        Self {
            scorer,
            thresholds,
            embedder: None,
        }
    }

    /// Embed assumptions that arrive without an embedding.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

impl StageHandler for InterpretHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let critiques: Vec<_> = context
            .comments
            .iter()
            .filter(|c| c.intent == CommentIntent::Critique)
            .collect();

        let mut decisions = Vec::new();
        let mut contradictions = Vec::new();
        let mut pivot = context.pivot.clone();

        for assumption in &context.assumptions {
            let embedding = match (&assumption.embedding, &self.embedder) {
                (Some(e), _) => Some(e.clone()),
                (None, Some(embedder)) => embedder.embed(&assumption.statement),
                (None, None) => None,
            };
            let Some(embedding) = embedding else {
                continue;
            };

            for critique in &critiques {
                let Some(critique_embedding) = critique.embedding.as_deref() else {
                    continue;
                };
                let score = self.scorer.score(&embedding, critique_embedding);
                let Some((strength, delta)) = self.thresholds.classify(score) else {
                    continue;
                };

                let contradiction = InsightContradiction::new(
                    assumption.id.clone(),
                    critique.id.clone(),
                    format!(
                        "Semantic contradiction detected (score {:.2}) with: '{}'",
                        score,
                        truncate_chars(&critique.content, CRITIQUE_EXCERPT_CHARS)
                    ),
                    delta,
                )
                .with_link(strength, score);
                // A scorer outside [0, 1] fails the stage before ADAPT can act on it
                contradiction.validate()?;
                contradictions.push(contradiction);
                decisions.push(format!(
                    "DETECTED SEMANTIC CONTRADICTION ({}) for {} (score {:.2})",
                    strength, assumption.id, score
                ));

                if strength == LinkStrength::Strong && pivot.is_none() {
                    pivot = Some(PivotSignal {
                        belief_id: assumption.id.clone(),
                        previous_assumption: assumption.statement.clone(),
                        confidence_from: assumption.current_confidence,
                        confidence_to: (assumption.current_confidence - delta).max(0.0),
                        triggering_signals: vec![critique.content.clone()],
                    });
                }
            }
        }

        if contradictions.is_empty() {
            decisions.push("No active contradictions detected in high-signal comments".to_string());
        }

        let rationale = format!(
            "Analyzed {} comment(s). Found {} critique(s) with {} semantic link(s)",
            context.comments.len(),
            critiques.len(),
            contradictions.len()
        );
        // Grouped by assumption already, so dedup removes every repeat
        let mut referenced_assumptions: Vec<String> =
            contradictions.iter().map(|c| c.insight_id.clone()).collect();
        referenced_assumptions.dedup();

        context.contradictions = contradictions;
        context.pivot = pivot;

        Ok(ReasoningStep::new(
            LoopStage::Interpret,
            "Analyze signals and evaluate hypothesis",
            rationale,
        )
        .with_decisions(decisions)
        .with_references(Vec::new(), referenced_assumptions))
    }
}

/// ADAPT: emit the cycle's strategy change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptHandler;

impl AdaptHandler {
    fn pivot(context: &CycleContext, pivot: &PivotSignal) -> StrategyChange {
        let related = context
            .assumption(&pivot.belief_id)
            .map(|a| vec![a.id.clone()])
            .unwrap_or_default();

        StrategyChange::new(
            format!(
                "Shift content focus away from relying on '{}'",
                pivot.previous_assumption
            ),
            format!(
                "{} contradiction(s) this cycle, led by a strong semantic link against {}",
                context.contradictions.len(),
                pivot.belief_id
            ),
            pivot.confidence_from,
            pivot.confidence_to,
            Duration::days(PIVOT_REVIEW_DAYS),
        )
        .for_belief(pivot.belief_id.clone())
        .with_related_assumptions(related)
        .with_previous_assumption(pivot.previous_assumption.clone())
        .with_triggering_signals(pivot.triggering_signals.clone())
        .with_acknowledged_risks(vec![
            "Engagement volume may drop while the new direction settles".to_string(),
            "Contributors tied to the previous narrative may feel sidelined".to_string(),
        ])
    }

    fn maintain() -> StrategyChange {
        StrategyChange::new(
            "Maintain current strategy",
            "Performance signals align with current beliefs",
            1.0,
            1.0,
            Duration::days(MAINTAIN_REVIEW_DAYS),
        )
        .with_previous_assumption("Existing strategy is robust")
        .with_triggering_signals(vec!["No significant critiques found".to_string()])
        .with_acknowledged_risks(vec![
            "Low feedback volume may hide emerging negative signals".to_string(),
        ])
    }
}

impl StageHandler for AdaptHandler {
    fn handle(&self, _reasoning_loop: &ReasoningLoop, context: &mut CycleContext) -> Result<ReasoningStep> {
        let (change, rationale, decisions) = match (&context.pivot, context.contradictions.is_empty()) {
            (Some(pivot), false) => {
                let change = Self::pivot(context, pivot);
                let decisions = vec![
                    format!("Emit StrategyChange {}", change.id),
                    format!("Flag assumption {} for revision", pivot.belief_id),
                    "Update future narrative templates".to_string(),
                ];
                (change, "Strategic revision triggered by signal contradiction", decisions)
            }
            (_, true) => {
                let change = Self::maintain();
                let decisions = vec![
                    format!("Emit StrategyChange {}", change.id),
                    "No changes required".to_string(),
                ];
                (change, "Maintaining current strategic course", decisions)
            }
            (None, false) => {
                return Err(MnemosyneError::missing_artifact(
                    LoopStage::Adapt,
                    "StrategyChange",
                ));
            }
        };

        let step = ReasoningStep::new(
            LoopStage::Adapt,
            "Refine strategy based on interpretations",
            rationale,
        )
        .with_decisions(decisions)
        .with_strategy_change(change.id.clone());
        context.strategy_change = Some(change);
        Ok(step)
    }
}

/// An orchestrator with every reference handler registered.
pub fn reference_orchestrator(
    renderer: Arc<dyn Renderer>,
    ingestor: Arc<dyn Ingestor>,
    scorer: Arc<dyn SimilarityScorer>,
    thresholds: InterpretConfig,
) -> LoopOrchestrator {
    LoopOrchestrator::new()
        .with_handler(LoopStage::Plan, PlanHandler)
        .with_handler(LoopStage::Generate, GenerateHandler::new(renderer))
        .with_handler(LoopStage::Publish, PublishHandler)
        .with_handler(LoopStage::Observe, ObserveHandler::new(ingestor))
        .with_handler(LoopStage::Interpret, InterpretHandler::new(scorer, thresholds))
        .with_handler(LoopStage::Adapt, AdaptHandler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Assumption, Insight, Narrative, Organization, Override};
    use crate::engine::collaborators::{
        Comment, CosineSimilarity, HeuristicIngestor, PlaceholderRenderer,
    };
    use chrono::Utc;

    fn comment(id: &str, content: &str, embedding: Vec<f32>) -> Comment {
        Comment {
            id: id.to_string(),
            author: "anonymous".to_string(),
            content: content.to_string(),
            intent: HeuristicIngestor::classify(content),
            timestamp: Utc::now(),
            embedding: Some(embedding),
        }
    }

    fn interpret() -> InterpretHandler {
        InterpretHandler::new(Arc::new(CosineSimilarity), InterpretConfig::default())
    }

    #[test]
    fn test_plan_without_evidence_fails() {
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        let mut ctx = CycleContext::new()
            .with_assumptions(vec![Assumption::new("asm_1", "x").with_confidence(0.0)]);

        let err = LoopOrchestrator::new()
            .with_handler(LoopStage::Plan, PlanHandler)
            .advance(&mut reasoning_loop, &mut ctx)
            .unwrap_err();

        assert!(matches!(
            err,
            MnemosyneError::MissingEvidence {
                stage: LoopStage::Plan,
                ..
            }
        ));
        assert!(reasoning_loop.steps.is_empty());
        assert_eq!(reasoning_loop.current_stage, LoopStage::Plan);
    }

    #[test]
    fn test_plan_binds_assumptions_and_warns_on_high_risk() {
        let mut ctx = CycleContext::new()
            .with_assumptions(vec![
                Assumption::new("asm_safe", "Engineers trust engineers"),
                Assumption::new("asm_risky", "Memes convert").with_confidence(0.3),
            ])
            .with_insights(vec![
                Insight::new("ins_hi", "x").with_confidence(0.9),
                Insight::new("ins_lo", "y").with_confidence(0.4),
            ]);
        ctx.organization = Some(Organization::new("org_1", "Acme", "Ship it"));
        ctx.narrative = Some(Narrative::new("nar_1", "org_1", "Engineers first"));

        let step = PlanHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();

        assert_eq!(step.referenced_assumptions, vec!["asm_safe", "asm_risky"]);
        assert_eq!(step.referenced_insights, vec!["ins_hi"]);
        assert_eq!(step.context_used, vec!["org_1", "nar_1"]);
        assert!(step.intent.contains("Engineers first"));
        assert!(step.is_evidence_bound());
        let warnings: Vec<_> = step
            .decisions
            .iter()
            .filter(|d| d.starts_with("WARNING"))
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("asm_risky"));
    }

    #[test]
    fn test_plan_accepts_override_reason() {
        let mut ctx = CycleContext::new().with_memory_override_reason("entering a new market");
        let step = PlanHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        assert!(step.referenced_assumptions.is_empty());
        assert_eq!(
            step.memory_override_reason.as_deref(),
            Some("entering a new market")
        );
    }

    #[test]
    fn test_plan_accepts_governance_override() {
        let mut ctx = CycleContext::new();
        ctx.active_override = Some(Override::new("org_1", "hold", "launch week", "cmo"));
        let step = PlanHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        assert!(step
            .memory_override_reason
            .unwrap()
            .contains("launch week"));
    }

    #[test]
    fn test_generate_and_publish_record_artifact() {
        let mut ctx = CycleContext::new();
        ctx.narrative = Some(
            Narrative::new("nar_1", "org_1", "Engineers first")
                .with_key_messages(vec!["We ship weekly".to_string()]),
        );
        let generate = GenerateHandler::new(Arc::new(PlaceholderRenderer::default()));
        let step = generate.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();

        let artifact_id = ctx.artifact.as_ref().unwrap().id.clone();
        assert!(step.decisions[0].contains(&artifact_id));
        assert!(step.rationale.contains("We ship weekly"));

        let publish = PublishHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        assert!(!publish.human_approved);
        assert!(publish.decisions[0].contains(&artifact_id));
    }

    #[test]
    fn test_observe_ingests_raw_feedback() {
        let mut ctx = CycleContext::new().with_raw_feedback(vec![
            crate::engine::collaborators::RawFeedback::new("This feels wrong and staged"),
            crate::engine::collaborators::RawFeedback::new("How do you deploy?"),
        ]);
        let observe = ObserveHandler::new(Arc::new(HeuristicIngestor::new()));
        let step = observe.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        assert_eq!(ctx.comments.len(), 2);
        assert_eq!(step.decisions[0], "Ingested 2 comment(s), 1 critique(s)");
    }

    #[test]
    fn test_interpret_link_strengths() {
        let mut ctx = CycleContext::new().with_assumptions(vec![
            Assumption::new("asm_1", "Employee voices build trust").with_embedding(vec![1.0, 0.0]),
        ]);
        // cos = 1.0 (strong), 0.5 (moderate), 0.3 (weak), 0.1 (none)
        ctx.comments = vec![
            comment("c_strong", "employee posts feel fake and wrong", vec![1.0, 0.0]),
            comment("c_mod", "bad vibes from the team posts", vec![0.5, 0.866_025_4]),
            comment("c_weak", "slow to get to the point", vec![0.3, 0.953_939_2]),
            comment("c_none", "wrong font on the slides", vec![0.1, 0.994_987_4]),
            comment("c_praise", "great work from the whole team", vec![1.0, 0.0]),
        ];

        let step = interpret().handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();

        let strengths: Vec<_> = ctx
            .contradictions
            .iter()
            .map(|c| (c.source_id.as_str(), c.link_strength.unwrap(), c.confidence_delta))
            .collect();
        assert_eq!(
            strengths,
            vec![
                ("c_strong", LinkStrength::Strong, 0.15),
                ("c_mod", LinkStrength::Moderate, 0.08),
                ("c_weak", LinkStrength::Weak, 0.02),
            ]
        );
        assert_eq!(step.referenced_assumptions, vec!["asm_1"]);

        let pivot = ctx.pivot.as_ref().unwrap();
        assert_eq!(pivot.belief_id, "asm_1");
        assert!((pivot.confidence_to - 0.85).abs() < 1e-9);
        assert_eq!(pivot.triggering_signals, vec!["employee posts feel fake and wrong"]);
    }

    #[test]
    fn test_interpret_skips_missing_embeddings() {
        let mut ctx = CycleContext::new().with_assumptions(vec![Assumption::new("asm_1", "x")]);
        ctx.comments = vec![comment("c1", "wrong direction here", vec![1.0])];
        let step = interpret().handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        assert!(ctx.contradictions.is_empty());
        assert!(step.decisions[0].starts_with("No active contradictions"));
    }

    #[test]
    fn test_adapt_maintains_without_contradictions() {
        let mut ctx = CycleContext::new();
        let step = AdaptHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();
        let change = ctx.strategy_change.as_ref().unwrap();
        assert!(change.is_no_change());
        assert_eq!(step.strategy_change_id.as_deref(), Some(change.id.as_str()));
        assert!(change.review_horizon - change.timestamp == Duration::days(MAINTAIN_REVIEW_DAYS));
    }

    #[test]
    fn test_adapt_pivots_on_strong_signal() {
        let mut ctx = CycleContext::new()
            .with_assumptions(vec![Assumption::new("asm_1", "Employee voices build trust")]);
        ctx.contradictions = vec![InsightContradiction::new("asm_1", "c1", "fatigue", 0.15)];
        ctx.pivot = Some(PivotSignal {
            belief_id: "asm_1".to_string(),
            previous_assumption: "Employee voices build trust".to_string(),
            confidence_from: 1.0,
            confidence_to: 0.85,
            triggering_signals: vec!["fatigue".to_string()],
        });

        AdaptHandler.handle(&ReasoningLoop::new("org_1"), &mut ctx).unwrap();

        let change = ctx.strategy_change.as_ref().unwrap();
        assert_eq!(change.insight_id.as_deref(), Some("asm_1"));
        assert_eq!(change.related_assumption_ids, vec!["asm_1"]);
        assert!(!change.is_no_change());
        assert!(!change.acknowledged_risks.is_empty());
    }

    #[test]
    fn test_adapt_without_pivot_fails() {
        let mut ctx = CycleContext::new();
        ctx.contradictions = vec![InsightContradiction::new("asm_1", "c1", "meh", 0.02)];
        let mut reasoning_loop = ReasoningLoop::new("org_1");
        reasoning_loop.current_stage = LoopStage::Adapt;

        let err = LoopOrchestrator::new()
            .with_handler(LoopStage::Adapt, AdaptHandler)
            .advance(&mut reasoning_loop, &mut ctx)
            .unwrap_err();

        assert!(matches!(err, MnemosyneError::MissingArtifact { .. }));
        assert!(ctx.strategy_change.is_none());
        assert_eq!(reasoning_loop.current_stage, LoopStage::Adapt);
    }

    #[test]
    fn test_reference_orchestrator_is_complete() {
        let orchestrator = reference_orchestrator(
            Arc::new(PlaceholderRenderer::default()),
            Arc::new(HeuristicIngestor::new()),
            Arc::new(CosineSimilarity),
            InterpretConfig::default(),
        );
        assert!(orchestrator.validate().is_ok());
    }
}
