//! Word-count-weighted score aggregation.
//!
//! ```text
//! aggregate(dim) = round( Σ(chapter.dim * chapter.wordCount) / Σ(chapter.wordCount) )
//! ```
//!
//! A total word count of zero yields 0 for every dimension.

use crate::constants::analysis::{MAX_CONSISTENCY_ADJUSTMENT, MIN_CONSISTENCY_ADJUSTMENT};
use crate::types::{
    QaAnalysisResult, QaChapterScore, QaDimension, QaSuggestion, QualityLevel,
};

/// The four aggregated dimension scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimensionScores {
    pub readability: u8,
    pub consistency: u8,
    pub structure: u8,
    pub accuracy: u8,
}

impl DimensionScores {
    /// Unweighted mean of the four dimensions, rounded
    pub fn overall(&self) -> u8 {
        let sum = self.readability as u32
            + self.consistency as u32
            + self.structure as u32
            + self.accuracy as u32;
        (sum as f64 / 4.0).round() as u8
    }
}

/// Weighted mean of one dimension across chapters
pub fn aggregate_dimension(chapters: &[QaChapterScore], dimension: QaDimension) -> u8 {
    let total_words: u64 = chapters.iter().map(|c| c.word_count as u64).sum();
    if total_words == 0 {
        return 0;
    }

    let weighted: u64 = chapters
        .iter()
        .map(|c| c.dimension(dimension) as u64 * c.word_count as u64)
        .sum();

    (weighted as f64 / total_words as f64).round().min(100.0) as u8
}

pub fn aggregate(chapters: &[QaChapterScore]) -> DimensionScores {
    DimensionScores {
        readability: aggregate_dimension(chapters, QaDimension::Readability),
        consistency: aggregate_dimension(chapters, QaDimension::Consistency),
        structure: aggregate_dimension(chapters, QaDimension::Structure),
        accuracy: aggregate_dimension(chapters, QaDimension::Accuracy),
    }
}

/// `max(0, consistency + adjustment)`, with the adjustment held to [-20, 0]
pub fn apply_consistency_adjustment(consistency: u8, adjustment: i32) -> u8 {
    let adjustment = adjustment.clamp(MIN_CONSISTENCY_ADJUSTMENT, MAX_CONSISTENCY_ADJUSTMENT);
    (consistency as i32 + adjustment).max(0) as u8
}

/// Reconcile per-chapter scores and the consistency pass into one report
pub fn build_result(
    chapter_scores: Vec<QaChapterScore>,
    suggestions: Vec<QaSuggestion>,
    consistency_adjustment: i32,
    analyzed_at: String,
) -> QaAnalysisResult {
    let mut scores = aggregate(&chapter_scores);
    scores.consistency = apply_consistency_adjustment(scores.consistency, consistency_adjustment);
    let overall_score = scores.overall();

    QaAnalysisResult {
        overall_score,
        quality_level: QualityLevel::from_score(overall_score),
        readability: scores.readability,
        consistency: scores.consistency,
        structure: scores.structure,
        accuracy: scores.accuracy,
        chapter_scores,
        suggestions,
        analyzed_at,
    }
}
