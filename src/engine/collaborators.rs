//! External collaborators consumed by the stage handlers.
//!
//! The engine never renders, scrapes or embeds anything itself. It talks to
//! these traits, which production deployments back with real services:
//!
//! - [`Renderer`] turns a visual intent into an opaque artifact reference
//! - [`Ingestor`] turns raw feedback into classified comments
//! - [`Embedder`] produces embedding vectors for text
//! - [`SimilarityScorer`] compares two embeddings
//!
//! Reference implementations are provided for local runs and tests.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::generate_short_id;
use crate::error::Result;

/// Words that mark a comment as critique.
pub const CRITIQUE_KEYWORDS: &[&str] = &["bad", "wrong", "fail", "slow", "fatigue", "skeptical"];

/// Comments with fewer words than this (and no other signal) are spam.
pub const MIN_SIGNAL_WORDS: usize = 3;

// =============================================================================
// Rendering
// =============================================================================

/// Reference to a rendered artifact. The bytes behind `path` are never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub path: PathBuf,
    pub renderer: String,
}

/// Turns a visual-intent description into an artifact.
pub trait Renderer: Send + Sync {
    fn render(&self, visual_intent: &str) -> Result<Artifact>;
}

/// Renderer that only allocates artifact references under `root`.
#[derive(Debug, Clone)]
pub struct PlaceholderRenderer {
    root: PathBuf,
}

impl PlaceholderRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for PlaceholderRenderer {
    fn default() -> Self {
        Self::new("artifacts")
    }
}

impl Renderer for PlaceholderRenderer {
    fn render(&self, visual_intent: &str) -> Result<Artifact> {
        let id = generate_short_id("img");
        tracing::debug!("allocated artifact {} for intent '{}'", id, visual_intent);
        Ok(Artifact {
            path: self.root.join(format!("{}.png", id)),
            id,
            renderer: "placeholder".to_string(),
        })
    }
}

// =============================================================================
// Ingestion
// =============================================================================

/// Classified intent of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentIntent {
    Question,
    Critique,
    Praise,
    Spam,
}

impl fmt::Display for CommentIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Question => "QUESTION",
            Self::Critique => "CRITIQUE",
            Self::Praise => "PRAISE",
            Self::Spam => "SPAM",
        };
        f.write_str(label)
    }
}

/// Unclassified feedback as exported from a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeedback {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Pre-computed embedding; takes precedence over the ingestor's embedder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_author() -> String {
    "anonymous".to_string()
}

impl RawFeedback {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            author: default_author(),
            timestamp: None,
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A classified piece of feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub content: String,
    pub intent: CommentIntent,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Produces classified comments from raw feedback.
pub trait Ingestor: Send + Sync {
    fn ingest(&self, raw: &[RawFeedback]) -> Result<Vec<Comment>>;
}

/// Produces embedding vectors for text.
pub trait Embedder: Send + Sync {
    /// `None` when the text cannot be embedded.
    fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Keyword-based intent classifier.
#[derive(Clone, Default)]
pub struct HeuristicIngestor {
    embedder: Option<Arc<dyn Embedder>>,
}

impl fmt::Debug for HeuristicIngestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeuristicIngestor")
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

impl HeuristicIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
        }
    }

    /// Classify one piece of text.
    ///
    /// Questions win over critique, critique over spam, and anything left
    /// over is praise.
    pub fn classify(text: &str) -> CommentIntent {
        let lower = text.to_lowercase();
        if text.contains('?') {
            CommentIntent::Question
        } else if CRITIQUE_KEYWORDS.iter().any(|word| lower.contains(word)) {
            CommentIntent::Critique
        } else if text.split_whitespace().count() < MIN_SIGNAL_WORDS {
            CommentIntent::Spam
        } else {
            CommentIntent::Praise
        }
    }
}

impl Ingestor for HeuristicIngestor {
    fn ingest(&self, raw: &[RawFeedback]) -> Result<Vec<Comment>> {
        let now = Utc::now();
        Ok(raw
            .iter()
            .map(|item| Comment {
                id: item.id.clone().unwrap_or_else(|| generate_short_id("cmt")),
                author: item.author.clone(),
                content: item.text.clone(),
                intent: Self::classify(&item.text),
                timestamp: item.timestamp.unwrap_or(now),
                embedding: item
                    .embedding
                    .clone()
                    .or_else(|| self.embedder.as_ref().and_then(|e| e.embed(&item.text))),
            })
            .collect())
    }
}

// =============================================================================
// Similarity
// =============================================================================

/// Scores how semantically close two embeddings are, in [0, 1].
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &[f32], b: &[f32]) -> f64;
}

/// Cosine similarity, clamped to [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl SimilarityScorer for CosineSimilarity {
    fn score(&self, a: &[f32], b: &[f32]) -> f64 {
        if a.is_empty() || a.len() != b.len() {
            return 0.0;
        }

        let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
        for (x, y) in a.iter().zip(b) {
            let (x, y) = (f64::from(*x), f64::from(*y));
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
    }
}
