//! Quality-review result types.

use serde::{Deserialize, Serialize};

/// Chapter title used for suggestions raised by the cross-chapter pass
pub const CROSS_CHAPTER_TITLE: &str = "Cross-chapter";

/// Quality level bands, a step function of the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLevel {
    Exceptional,
    Professional,
    Good,
    NeedsImprovement,
    NeedsSignificantWork,
}

impl QualityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Exceptional,
            80..=89 => Self::Professional,
            70..=79 => Self::Good,
            60..=69 => Self::NeedsImprovement,
            _ => Self::NeedsSignificantWork,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Exceptional => "Exceptional",
            Self::Professional => "Professional",
            Self::Good => "Good",
            Self::NeedsImprovement => "Needs Improvement",
            Self::NeedsSignificantWork => "Needs Significant Work",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaDimension {
    Readability,
    Consistency,
    Structure,
    Accuracy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

/// Short rationale per dimension from a chapter pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionNotes {
    pub readability: String,
    pub consistency: String,
    pub structure: String,
    pub accuracy: String,
}

/// Scores for one chapter; `word_count` is its aggregation weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaChapterScore {
    pub chapter_id: String,
    pub chapter_title: String,
    pub readability: u8,
    pub consistency: u8,
    pub structure: u8,
    pub accuracy: u8,
    pub word_count: usize,
    #[serde(default)]
    pub notes: DimensionNotes,
}

impl QaChapterScore {
    pub fn dimension(&self, dimension: QaDimension) -> u8 {
        match dimension {
            QaDimension::Readability => self.readability,
            QaDimension::Consistency => self.consistency,
            QaDimension::Structure => self.structure,
            QaDimension::Accuracy => self.accuracy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaSuggestion {
    pub id: String,
    /// Empty for cross-chapter suggestions
    pub chapter_id: String,
    pub chapter_title: String,
    pub dimension: QaDimension,
    pub severity: Severity,
    pub issue_text: String,
    pub explanation: String,
    pub location: String,
    pub auto_fixable: bool,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

impl QaSuggestion {
    pub fn is_cross_chapter(&self) -> bool {
        self.chapter_id.is_empty()
    }
}

/// Aggregate quality report for a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaAnalysisResult {
    pub overall_score: u8,
    pub quality_level: QualityLevel,
    pub readability: u8,
    pub consistency: u8,
    pub structure: u8,
    pub accuracy: u8,
    pub chapter_scores: Vec<QaChapterScore>,
    pub suggestions: Vec<QaSuggestion>,
    pub analyzed_at: String,
}

/// Outcome of applying a suggested fix to chapter content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResult {
    pub success: bool,
    pub updated_word_count: usize,
    pub fuzzy_match: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_level_boundaries() {
        assert_eq!(QualityLevel::from_score(90), QualityLevel::Exceptional);
        assert_eq!(QualityLevel::from_score(80), QualityLevel::Professional);
        assert_eq!(QualityLevel::from_score(70), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(60), QualityLevel::NeedsImprovement);
        assert_eq!(QualityLevel::from_score(59), QualityLevel::NeedsSignificantWork);
        assert_eq!(QualityLevel::from_score(100), QualityLevel::Exceptional);
        assert_eq!(QualityLevel::from_score(0), QualityLevel::NeedsSignificantWork);
    }

    #[test]
    fn test_quality_level_serializes_kebab_case() {
        let json = serde_json::to_string(&QualityLevel::NeedsSignificantWork).unwrap();
        assert_eq!(json, "\"needs-significant-work\"");
    }
}
