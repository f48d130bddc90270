//! Applying QA suggestions back into chapter content.
//!
//! The target text is located by exact substring first. When the author has
//! since reflowed whitespace, a second pass matches the same words with any
//! run of whitespace standing in for any other. If neither finds the text,
//! the content changed since analysis and the caller must re-run it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::Database;
use crate::types::{BookError, FixResult, Result, UserId, count_words};

/// Content after a successful replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFix {
    pub content: String,
    pub fuzzy_match: bool,
}

/// Replace the first occurrence of `original` in `content`
pub fn apply_fix(content: &str, original: &str, replacement: &str) -> Result<AppliedFix> {
    if original.trim().is_empty() {
        return Err(BookError::validation("originalText must not be empty"));
    }

    if let Some(pos) = content.find(original) {
        let mut updated = String::with_capacity(content.len() + replacement.len());
        updated.push_str(&content[..pos]);
        updated.push_str(replacement);
        updated.push_str(&content[pos + original.len()..]);
        return Ok(AppliedFix {
            content: updated,
            fuzzy_match: false,
        });
    }

    let pattern = original
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let re = Regex::new(&pattern)
        .map_err(|e| BookError::validation(format!("unusable originalText: {}", e)))?;

    match re.find(content) {
        Some(m) => {
            debug!(start = m.start(), end = m.end(), "Fix located by whitespace-normalized match");
            let mut updated = String::with_capacity(content.len() + replacement.len());
            updated.push_str(&content[..m.start()]);
            updated.push_str(replacement);
            updated.push_str(&content[m.end()..]);
            Ok(AppliedFix {
                content: updated,
                fuzzy_match: true,
            })
        }
        None => Err(BookError::content_changed(
            "The text to fix was not found; the chapter changed since the analysis. Re-run the analysis.",
        )),
    }
}

/// Body of `POST /api/qa/fix`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRequest {
    pub book_id: String,
    pub chapter_id: String,
    pub suggestion_id: String,
    pub original_text: String,
    pub suggested_fix: String,
}

impl FixRequest {
    pub fn validate(&self) -> Result<()> {
        if self.book_id.trim().is_empty() || self.chapter_id.trim().is_empty() {
            return Err(BookError::validation("bookId and chapterId are required"));
        }
        if self.original_text.trim().is_empty() {
            return Err(BookError::validation("originalText is required"));
        }
        Ok(())
    }
}

/// Apply a fix to a stored chapter and drop the suggestion from the stored report
pub fn apply_chapter_fix(db: &Database, user: &UserId, request: &FixRequest) -> Result<FixResult> {
    request.validate()?;
    let chapter = db.load_chapter(user, &request.book_id, &request.chapter_id)?;

    let applied = apply_fix(&chapter.content, &request.original_text, &request.suggested_fix)?;
    let word_count = count_words(&applied.content);
    db.update_chapter_content(&chapter.id, None, &applied.content, word_count)?;

    if let Some(mut report) = db.load_qa_analysis(&request.book_id)? {
        let before = report.suggestions.len();
        report.suggestions.retain(|s| s.id != request.suggestion_id);
        if report.suggestions.len() != before {
            db.save_qa_analysis(&request.book_id, &report)?;
        }
    }

    info!(
        chapter = %chapter.id,
        suggestion = %request.suggestion_id,
        fuzzy = applied.fuzzy_match,
        "Applied QA fix"
    );

    Ok(FixResult {
        success: true,
        updated_word_count: word_count,
        fuzzy_match: applied.fuzzy_match,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::fixtures;
    use crate::types::CONTENT_CHANGED;

    #[test]
    fn test_exact_match() {
        let fixed = apply_fix("<p>Their going home.</p>", "Their going", "They're going").unwrap();
        assert_eq!(fixed.content, "<p>They're going home.</p>");
        assert!(!fixed.fuzzy_match);
    }

    #[test]
    fn test_only_first_occurrence_replaced() {
        let fixed = apply_fix("a b a b", "a b", "c").unwrap();
        assert_eq!(fixed.content, "c a b");
    }

    #[test]
    fn test_whitespace_normalized_match() {
        let content = "<p>The starter\n   should  double</p>";
        let fixed = apply_fix(content, "starter should double", "levain should rise").unwrap();
        assert_eq!(fixed.content, "<p>The levain should rise</p>");
        assert!(fixed.fuzzy_match);
    }

    #[test]
    fn test_special_characters_are_literal() {
        let fixed = apply_fix("cost (approx.) $5", "(approx.)  $5", "about $5").unwrap();
        assert_eq!(fixed.content, "cost about $5");
    }

    #[test]
    fn test_missing_text_is_content_changed() {
        let err = apply_fix("<p>rewritten</p>", "original words", "x").unwrap_err();
        assert_eq!(err.code(), Some(CONTENT_CHANGED));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_empty_original_rejected() {
        let err = apply_fix("text", "   ", "x").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_apply_chapter_fix_updates_storage() {
        let db = fixtures::seeded();
        db.insert_chapter(&fixtures::chapter(
            "ch-1",
            "book-1",
            0,
            "<p>Feed the starter every day.</p>",
        ))
        .unwrap();

        let user = UserId::new(fixtures::OWNER);
        let request = FixRequest {
            book_id: "book-1".into(),
            chapter_id: "ch-1".into(),
            suggestion_id: "s-1".into(),
            original_text: "every day".into(),
            suggested_fix: "twice a day at room temperature".into(),
        };
        let result = apply_chapter_fix(&db, &user, &request).unwrap();
        assert!(result.success);
        assert_eq!(result.updated_word_count, 9);

        let chapter = db.load_chapter(&user, "book-1", "ch-1").unwrap();
        assert!(chapter.content.contains("twice a day"));

        // Applying the same fix again no longer finds the text
        let err = apply_chapter_fix(&db, &user, &request).unwrap_err();
        assert_eq!(err.code(), Some(CONTENT_CHANGED));
    }
}
