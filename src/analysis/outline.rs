//! Outline completeness analysis: a single structured pass over the outline.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::ai::{PromptTemplates, SharedProvider, generate_structured};
use crate::types::{
    Book, BookError, ChapterSuggestion, Importance, Outline, OutlineAnalysis, Result,
    TopicCoverage,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionOutput {
    title: String,
    #[serde(default)]
    description: String,
    insert_position: usize,
    priority: Importance,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisOutput {
    #[serde(default)]
    suggestions: Vec<SuggestionOutput>,
    #[serde(default)]
    coverage: Vec<TopicCoverage>,
    overall_score: u8,
    #[serde(default)]
    summary: String,
}

fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "required": ["suggestions", "coverage", "overallScore", "summary"],
        "properties": {
            "suggestions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["title", "description", "insertPosition", "priority", "rationale"],
                    "properties": {
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "insertPosition": {"type": "integer", "minimum": 0},
                        "priority": {"enum": ["high", "medium", "low"]},
                        "rationale": {"type": "string"}
                    }
                }
            },
            "coverage": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["area", "status"],
                    "properties": {
                        "area": {"type": "string"},
                        "status": {"enum": ["covered", "partial", "missing"]},
                        "notes": {"type": "string"}
                    }
                }
            },
            "overallScore": {"type": "integer", "minimum": 0, "maximum": 100},
            "summary": {"type": "string"}
        }
    })
}

pub struct OutlineAnalyzer {
    provider: SharedProvider,
    timeout: Duration,
}

impl OutlineAnalyzer {
    pub fn new(provider: SharedProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn analyze(&self, book: &Book, outline: &Outline) -> Result<OutlineAnalysis> {
        info!(outline = %outline.id, sections = outline.sections.len(), "Analyzing outline");

        let prompt = PromptTemplates::outline_analysis(book, outline);
        let output: AnalysisOutput = generate_structured(
            self.provider.as_ref(),
            &prompt,
            &analysis_schema(),
            "outline analysis",
            self.timeout,
        )
        .await?;

        if output.overall_score > 100 {
            return Err(BookError::schema_mismatch(
                "outline analysis",
                format!("overallScore {} outside 0-100", output.overall_score),
            ));
        }

        let section_count = outline.sections.len();
        let suggestions = output
            .suggestions
            .into_iter()
            .filter(|s| !s.title.trim().is_empty())
            .map(|s| ChapterSuggestion {
                id: uuid::Uuid::new_v4().to_string(),
                title: s.title.trim().to_string(),
                description: s.description,
                insert_position: s.insert_position.min(section_count),
                priority: s.priority,
                rationale: s.rationale,
            })
            .collect();

        Ok(OutlineAnalysis {
            suggestions,
            coverage: output.coverage,
            overall_score: output.overall_score,
            summary: output.summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ai::provider::testing::ScriptedProvider;
    use crate::storage::database::fixtures;
    use crate::types::{CoverageStatus, OutlineSection};

    fn outline() -> Outline {
        Outline {
            id: "o1".into(),
            book_id: "book-1".into(),
            title: "Outline".into(),
            sections: vec![OutlineSection::new("Starters", 0), OutlineSection::new("Shaping", 1)],
        }
    }

    #[tokio::test]
    async fn test_analysis_assigns_ids_and_clamps_positions() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(json!({
            "suggestions": [
                {"title": "Baking Schedules", "description": "Timing", "insertPosition": 9,
                 "priority": "high", "rationale": "Readers plan around work"},
                {"title": "  ", "description": "", "insertPosition": 0,
                 "priority": "low", "rationale": ""}
            ],
            "coverage": [{"area": "Equipment", "status": "missing", "notes": ""}],
            "overallScore": 64,
            "summary": "Solid start"
        }));

        let analyzer = OutlineAnalyzer::new(provider, Duration::from_secs(5));
        let analysis = analyzer
            .analyze(&fixtures::book("book-1"), &outline())
            .await
            .unwrap();

        assert_eq!(analysis.suggestions.len(), 1);
        assert_eq!(analysis.suggestions[0].insert_position, 2);
        assert!(!analysis.suggestions[0].id.is_empty());
        assert_eq!(analysis.coverage[0].status, CoverageStatus::Missing);
        assert_eq!(analysis.overall_score, 64);
    }

    #[tokio::test]
    async fn test_bad_priority_is_schema_mismatch() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(json!({
            "suggestions": [{"title": "X", "insertPosition": 0, "priority": "urgent"}],
            "overallScore": 50
        }));

        let analyzer = OutlineAnalyzer::new(provider, Duration::from_secs(5));
        let err = analyzer
            .analyze(&fixtures::book("book-1"), &outline())
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::SchemaMismatch { .. }));
    }
}
