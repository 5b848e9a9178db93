//! Strategic identity: organizations and the narratives they tell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The strategic identity of a company or entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub mission: String,
    #[serde(default)]
    pub core_values: Vec<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub strategic_priorities: Vec<String>,
}

impl Organization {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mission: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mission: mission.into(),
            core_values: Vec::new(),
            target_audience: Vec::new(),
            strategic_priorities: Vec::new(),
        }
    }
}

/// A strategic theme currently being told for an organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narrative {
    pub id: String,
    pub org_id: String,
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub key_messages: Vec<String>,
    /// Only active narratives are picked up for planning.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Narrative {
    /// Create an active narrative.
    pub fn new(id: impl Into<String>, org_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org_id: org_id.into(),
            title: title.into(),
            objectives: Vec::new(),
            key_messages: Vec::new(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_objectives(mut self, objectives: Vec<String>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn with_key_messages(mut self, messages: Vec<String>) -> Self {
        self.key_messages = messages;
        self
    }
}
