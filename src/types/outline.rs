//! Outline analysis result types.

use serde::{Deserialize, Serialize};

use super::Importance;

/// A chapter the analysis suggests adding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Zero-based index the new chapter should be inserted at
    pub insert_position: usize,
    pub priority: Importance,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Covered,
    Partial,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCoverage {
    pub area: String,
    pub status: CoverageStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineAnalysis {
    pub suggestions: Vec<ChapterSuggestion>,
    pub coverage: Vec<TopicCoverage>,
    /// Completeness, 0-100
    pub overall_score: u8,
    pub summary: String,
}
