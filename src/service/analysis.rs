//! Request-level entry points for the non-streaming analysis routes.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::SharedProvider;
use crate::analysis::{FixRequest, OutlineAnalyzer, QaOrchestrator, QaSettings, apply_chapter_fix};
use crate::storage::SharedDatabase;
use crate::types::{Book, BookError, FixResult, OutlineAnalysis, QaAnalysisResult, Result, UserId};

/// Body of `POST /api/outline/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineAnalyzeRequest {
    pub outline_id: String,
}

/// Body of `POST /api/qa/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaAnalyzeRequest {
    pub book_id: String,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BookError::validation(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AnalysisService {
    db: SharedDatabase,
    settings: QaSettings,
}

impl AnalysisService {
    pub fn new(db: SharedDatabase, settings: QaSettings) -> Self {
        Self { db, settings }
    }

    pub async fn analyze_outline(
        &self,
        provider: SharedProvider,
        user: &UserId,
        body: &OutlineAnalyzeRequest,
    ) -> Result<OutlineAnalysis> {
        require(&body.outline_id, "outlineId")?;
        let (outline, book) = self.db.load_outline(user, &body.outline_id)?;
        OutlineAnalyzer::new(provider, self.settings.request_timeout)
            .analyze(&book, &outline)
            .await
    }

    pub async fn analyze_book(
        &self,
        provider: SharedProvider,
        user: &UserId,
        body: &QaAnalyzeRequest,
    ) -> Result<QaAnalysisResult> {
        require(&body.book_id, "bookId")?;
        let book = self.db.load_book(user, &body.book_id)?;
        self.run_qa(provider, &book).await
    }

    /// Run QA over every chapter of `book` and store the report
    pub async fn run_qa(&self, provider: SharedProvider, book: &Book) -> Result<QaAnalysisResult> {
        let chapters = self.db.list_chapters(&book.id)?;
        let result = QaOrchestrator::new(provider, self.settings.clone())
            .analyze(book, &chapters)
            .await?;

        self.db.save_qa_analysis(&book.id, &result)?;
        info!(
            book = %book.id,
            score = result.overall_score,
            suggestions = result.suggestions.len(),
            "Stored QA report"
        );
        Ok(result)
    }

    pub fn apply_fix(&self, user: &UserId, body: &FixRequest) -> Result<FixResult> {
        apply_chapter_fix(&self.db, user, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::ai::provider::testing::ScriptedProvider;
    use crate::storage::database::fixtures;

    fn review(score: u8) -> serde_json::Value {
        let dim = json!({"score": score, "rationale": ""});
        json!({
            "readability": dim, "consistency": dim, "structure": dim, "accuracy": dim,
            "suggestions": []
        })
    }

    #[tokio::test]
    async fn test_book_qa_is_stored() {
        let db = Arc::new(fixtures::seeded());
        db.insert_chapter(&fixtures::chapter("ch-1", "book-1", 0, "<p>one two three</p>"))
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(review(70));

        let svc = AnalysisService::new(db.clone(), QaSettings::default());
        let user = UserId::new(fixtures::OWNER);
        let result = svc
            .analyze_book(provider, &user, &QaAnalyzeRequest { book_id: "book-1".into() })
            .await
            .unwrap();

        assert_eq!(result.overall_score, 70);
        let stored = db.load_qa_analysis("book-1").unwrap().unwrap();
        assert_eq!(stored.overall_score, 70);
    }

    #[tokio::test]
    async fn test_foreign_book_is_not_found_before_any_call() {
        let db = Arc::new(fixtures::seeded());
        let provider = Arc::new(ScriptedProvider::new());
        let svc = AnalysisService::new(db, QaSettings::default());

        let err = svc
            .analyze_book(
                provider.clone(),
                &UserId::new("someone-else"),
                &QaAnalyzeRequest { book_id: "book-1".into() },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_outline_id_is_validation_error() {
        let svc = AnalysisService::new(Arc::new(fixtures::seeded()), QaSettings::default());
        let err = svc
            .analyze_outline(
                Arc::new(ScriptedProvider::new()),
                &UserId::new(fixtures::OWNER),
                &OutlineAnalyzeRequest { outline_id: " ".into() },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
