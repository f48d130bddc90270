//! Interview conversation and wizard state types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the interview; the history is append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl std::str::FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Importance::High),
            "medium" => Ok(Importance::Medium),
            "low" => Ok(Importance::Low),
            _ => Err(format!("Unknown importance: {}", s)),
        }
    }
}

/// A knowledge gap the interviewer noticed, extracted from assistant text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapSuggestion {
    pub area: String,
    pub description: String,
    pub importance: Importance,
}

/// Interview phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    TopicExploration,
    AudienceDefinition,
    ExpertiseExtraction,
    GapAnalysis,
    OutlineGeneration,
}

impl WizardPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicExploration => "topic_exploration",
            Self::AudienceDefinition => "audience_definition",
            Self::ExpertiseExtraction => "expertise_extraction",
            Self::GapAnalysis => "gap_analysis",
            Self::OutlineGeneration => "outline_generation",
        }
    }

    /// Terminal for the interview; further turns keep this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OutlineGeneration)
    }
}

impl std::fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interview progress, always re-derived from the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub phase: WizardPhase,
    pub question_count: usize,
    pub total_questions: usize,
    pub topic: String,
    pub audience: String,
    pub expertise_level: String,
    pub detected_gaps: Vec<GapSuggestion>,
    pub is_ready_for_outline: bool,
}
