//! The reasoning engine: stage dispatch, reference handlers and the cycle runner.

pub mod collaborators;
pub mod context;
pub mod cycle;
pub mod handlers;
pub mod orchestrator;

pub use collaborators::{
    Artifact, Comment, CommentIntent, CosineSimilarity, Embedder, HeuristicIngestor, Ingestor,
    PlaceholderRenderer, RawFeedback, Renderer, SimilarityScorer,
};
pub use context::{CycleContext, PivotSignal};
pub use cycle::{CycleOutcome, CycleRunner};
pub use handlers::{
    reference_orchestrator, AdaptHandler, GenerateHandler, InterpretHandler, ObserveHandler,
    PlanHandler, PublishHandler,
};
pub use orchestrator::{LoopOrchestrator, StageHandler};
