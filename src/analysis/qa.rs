//! QA Orchestration
//!
//! One independent scoring pass per chapter runs concurrently; when at least
//! two chapters were scored, a cross-chapter consistency pass runs over
//! compact summaries. Any failed pass fails the whole analysis, so a partial
//! report is never returned as a success.

use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::aggregate::build_result;
use crate::ai::{PromptTemplates, SharedProvider, generate_structured, with_timeout};
use crate::constants::analysis as defaults;
use crate::types::{
    Book, BookError, CROSS_CHAPTER_TITLE, Chapter, DimensionNotes, QaAnalysisResult,
    QaChapterScore, QaDimension, QaSuggestion, Result, Severity, count_words, strip_html,
};

#[derive(Debug, Clone)]
pub struct QaSettings {
    pub max_concurrency: usize,
    pub max_suggestions: usize,
    /// Scored chapters required before the consistency pass runs
    pub consistency_min_chapters: usize,
    pub request_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for QaSettings {
    fn default() -> Self {
        let timeouts = crate::ai::TimeoutConfig::default();
        Self {
            max_concurrency: defaults::MAX_CHAPTER_CONCURRENCY,
            max_suggestions: defaults::MAX_SUGGESTIONS,
            consistency_min_chapters: defaults::CONSISTENCY_MIN_CHAPTERS,
            request_timeout: timeouts.llm_request,
            run_timeout: timeouts.analysis_run,
        }
    }
}

// =============================================================================
// Structured Output
// =============================================================================

#[derive(Debug, Deserialize)]
struct DimensionScore {
    score: u8,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct ChapterReviewOutput {
    readability: DimensionScore,
    consistency: DimensionScore,
    structure: DimensionScore,
    accuracy: DimensionScore,
    #[serde(default)]
    suggestions: Vec<SuggestionOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionOutput {
    dimension: QaDimension,
    severity: Severity,
    issue_text: String,
    explanation: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    auto_fixable: bool,
    #[serde(default)]
    suggested_fix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConsistencyOutput {
    adjustment: i32,
    #[serde(default)]
    suggestions: Vec<SuggestionOutput>,
}

fn suggestion_schema() -> Value {
    json!({
        "type": "object",
        "required": ["dimension", "severity", "issueText", "explanation", "location", "autoFixable"],
        "properties": {
            "dimension": {"enum": ["readability", "consistency", "structure", "accuracy"]},
            "severity": {"enum": ["critical", "major", "minor"]},
            "issueText": {"type": "string"},
            "explanation": {"type": "string"},
            "location": {"type": "string"},
            "autoFixable": {"type": "boolean"},
            "suggestedFix": {"type": "string"}
        }
    })
}

fn chapter_review_schema() -> Value {
    let dimension = json!({
        "type": "object",
        "required": ["score", "rationale"],
        "properties": {
            "score": {"type": "integer", "minimum": 0, "maximum": 100},
            "rationale": {"type": "string"}
        }
    });
    json!({
        "type": "object",
        "required": ["readability", "consistency", "structure", "accuracy", "suggestions"],
        "properties": {
            "readability": dimension,
            "consistency": dimension,
            "structure": dimension,
            "accuracy": dimension,
            "suggestions": {"type": "array", "items": suggestion_schema()}
        }
    })
}

fn consistency_schema() -> Value {
    json!({
        "type": "object",
        "required": ["adjustment", "suggestions"],
        "properties": {
            "adjustment": {"type": "integer", "minimum": -20, "maximum": 0},
            "suggestions": {"type": "array", "items": suggestion_schema()}
        }
    })
}

fn checked_score(value: &DimensionScore, context: &str) -> Result<u8> {
    if value.score > 100 {
        return Err(BookError::schema_mismatch(
            context,
            format!("score {} outside 0-100", value.score),
        ));
    }
    Ok(value.score)
}

/// Most severe first, capped at `limit`
fn prioritize(mut suggestions: Vec<SuggestionOutput>, limit: usize) -> Vec<SuggestionOutput> {
    suggestions.sort_by_key(|s| s.severity);
    suggestions.truncate(limit);
    suggestions
}

fn into_suggestion(output: SuggestionOutput, chapter_id: &str, chapter_title: &str) -> QaSuggestion {
    let suggested_fix = output.suggested_fix.filter(|f| !f.trim().is_empty());
    QaSuggestion {
        id: uuid::Uuid::new_v4().to_string(),
        chapter_id: chapter_id.to_string(),
        chapter_title: chapter_title.to_string(),
        dimension: output.dimension,
        severity: output.severity,
        issue_text: output.issue_text,
        explanation: output.explanation,
        location: output.location,
        auto_fixable: output.auto_fixable && suggested_fix.is_some(),
        suggested_fix,
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Result of one chapter pass
#[derive(Debug)]
struct ChapterReview {
    score: QaChapterScore,
    suggestions: Vec<QaSuggestion>,
    excerpt: String,
}

pub struct QaOrchestrator {
    provider: SharedProvider,
    settings: QaSettings,
}

impl QaOrchestrator {
    pub fn new(provider: SharedProvider, settings: QaSettings) -> Self {
        Self { provider, settings }
    }

    /// Analyze every chapter of `book`
    pub async fn analyze(&self, book: &Book, chapters: &[Chapter]) -> Result<QaAnalysisResult> {
        with_timeout(
            self.settings.run_timeout,
            self.run(book, chapters),
            "QA analysis",
        )
        .await
    }

    async fn run(&self, book: &Book, chapters: &[Chapter]) -> Result<QaAnalysisResult> {
        let scorable: Vec<&Chapter> = chapters
            .iter()
            .filter(|c| !strip_html(&c.content).trim().is_empty())
            .collect();
        let total = scorable.len();

        info!(
            book = %book.id,
            chapters = total,
            skipped = chapters.len() - total,
            concurrency = self.settings.max_concurrency,
            "Starting QA analysis"
        );

        // Owned futures; a mapping closure held across the await is not Send
        let passes: Vec<_> = scorable
            .iter()
            .enumerate()
            .map(|(i, chapter)| self.review_chapter(book, chapter, i + 1, total))
            .collect();
        let reviews: Vec<ChapterReview> = stream::iter(passes)
            .buffered(self.settings.max_concurrency.max(1))
            .try_collect()
            .await?;

        let mut suggestions: Vec<QaSuggestion> = reviews
            .iter()
            .flat_map(|r| r.suggestions.iter().cloned())
            .collect();

        let adjustment = if reviews.len() >= self.settings.consistency_min_chapters {
            let (adjustment, cross) = self.review_consistency(book, &reviews).await?;
            suggestions.extend(cross);
            adjustment
        } else {
            0
        };

        let chapter_scores = reviews.into_iter().map(|r| r.score).collect();
        let result = build_result(
            chapter_scores,
            suggestions,
            adjustment,
            chrono::Utc::now().to_rfc3339(),
        );

        info!(
            book = %book.id,
            overall = result.overall_score,
            level = result.quality_level.label(),
            suggestions = result.suggestions.len(),
            "QA analysis complete"
        );
        Ok(result)
    }

    async fn review_chapter(
        &self,
        book: &Book,
        chapter: &Chapter,
        position: usize,
        total: usize,
    ) -> Result<ChapterReview> {
        let text = strip_html(&chapter.content);
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let review_text: String = text.chars().take(defaults::MAX_REVIEW_CHARS).collect();
        let context = format!("chapter review '{}'", chapter.title);

        debug!(chapter = %chapter.id, position, total, "Reviewing chapter");

        let prompt = PromptTemplates::chapter_review(
            book,
            &chapter.title,
            &review_text,
            position,
            total,
            self.settings.max_suggestions,
        );
        let output: ChapterReviewOutput = generate_structured(
            self.provider.as_ref(),
            &prompt,
            &chapter_review_schema(),
            &context,
            self.settings.request_timeout,
        )
        .await?;

        let score = QaChapterScore {
            chapter_id: chapter.id.clone(),
            chapter_title: chapter.title.clone(),
            readability: checked_score(&output.readability, &context)?,
            consistency: checked_score(&output.consistency, &context)?,
            structure: checked_score(&output.structure, &context)?,
            accuracy: checked_score(&output.accuracy, &context)?,
            word_count: count_words(&chapter.content),
            notes: DimensionNotes {
                readability: output.readability.rationale,
                consistency: output.consistency.rationale,
                structure: output.structure.rationale,
                accuracy: output.accuracy.rationale,
            },
        };

        let suggestions = prioritize(output.suggestions, self.settings.max_suggestions)
            .into_iter()
            .map(|s| into_suggestion(s, &chapter.id, &chapter.title))
            .collect();

        Ok(ChapterReview {
            score,
            suggestions,
            excerpt: text.chars().take(defaults::SUMMARY_EXCERPT_CHARS).collect(),
        })
    }

    async fn review_consistency(
        &self,
        book: &Book,
        reviews: &[ChapterReview],
    ) -> Result<(i32, Vec<QaSuggestion>)> {
        let summaries: Vec<String> = reviews
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "Chapter {}: {} ({} words; consistency {})\n{}",
                    i + 1,
                    r.score.chapter_title,
                    r.score.word_count,
                    r.score.consistency,
                    r.excerpt
                )
            })
            .collect();

        debug!(chapters = summaries.len(), "Running consistency pass");

        let prompt =
            PromptTemplates::consistency_review(book, &summaries, self.settings.max_suggestions);
        let output: ConsistencyOutput = generate_structured(
            self.provider.as_ref(),
            &prompt,
            &consistency_schema(),
            "consistency review",
            self.settings.request_timeout,
        )
        .await?;

        let suggestions = prioritize(output.suggestions, self.settings.max_suggestions)
            .into_iter()
            .map(|s| into_suggestion(s, "", CROSS_CHAPTER_TITLE))
            .collect();

        Ok((output.adjustment, suggestions))
    }
}
