//! Chapter drafting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::{ChatRequest, PromptTemplates, SharedProvider, TimeoutConfig, open_stream};
use crate::protocol::{EventSink, ProduceOutcome, StreamFinisher, produce};
use crate::storage::SharedDatabase;
use crate::types::{BookError, Expertise, Outline, Result, Tone, UserId, count_words};

/// Body of `POST /api/ai/generate/chapter`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterGenerationRequest {
    pub book_id: String,
    pub chapter_id: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub expertise: Expertise,
}

/// Final `metadata` payload of a chapter draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMetadata {
    pub word_count: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PreparedDraft {
    chapter_id: String,
    request: ChatRequest,
}

#[derive(Clone)]
pub struct ChapterService {
    db: SharedDatabase,
    max_tokens: usize,
    request_timeout: Duration,
}

impl ChapterService {
    pub fn new(db: SharedDatabase, max_tokens: usize) -> Self {
        Self {
            db,
            max_tokens,
            request_timeout: TimeoutConfig::default().llm_request,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn prepare(&self, user: &UserId, body: &ChapterGenerationRequest) -> Result<PreparedDraft> {
        if body.book_id.trim().is_empty() || body.chapter_id.trim().is_empty() {
            return Err(BookError::validation("bookId and chapterId are required"));
        }

        let book = self.db.load_book(user, &body.book_id)?;
        let chapter = self.db.load_chapter(user, &body.book_id, &body.chapter_id)?;

        // A chapter created before any outline still gets a one-entry table of contents
        let outline = self.db.outline_for_book(user, &body.book_id)?.unwrap_or_else(|| Outline {
            id: String::new(),
            book_id: book.id.clone(),
            title: book.title.clone(),
            sections: vec![crate::types::OutlineSection::new(&chapter.title, 0)],
        });

        let description = match &chapter.section_id {
            Some(section_id) => self.db.section_description(section_id)?.unwrap_or_default(),
            None => String::new(),
        };

        let system = PromptTemplates::chapter_draft(
            &book,
            &outline,
            &chapter,
            &description,
            body.tone,
            body.expertise,
        );
        let request = ChatRequest::single(system, format!("Write the chapter \"{}\" now.", chapter.title))
            .with_max_tokens(self.max_tokens);

        Ok(PreparedDraft {
            chapter_id: chapter.id,
            request,
        })
    }

    pub async fn run(&self, provider: SharedProvider, draft: PreparedDraft, sink: EventSink) -> ProduceOutcome {
        info!(chapter = %draft.chapter_id, "Drafting chapter");

        let source = match open_stream(
            provider.as_ref(),
            draft.request,
            "chapter stream",
            self.request_timeout,
        )
        .await
        {
            Ok(source) => source,
            Err(e) => {
                warn!("Chapter stream failed to start: {}", e);
                let message = e.to_string();
                sink.error(message.clone()).await;
                return ProduceOutcome::Failed(message);
            }
        };

        let finisher = ChapterFinisher {
            db: self.db.clone(),
            chapter_id: draft.chapter_id,
        };
        produce(sink, source, finisher).await
    }
}

struct ChapterFinisher {
    db: SharedDatabase,
    chapter_id: String,
}

#[async_trait]
impl StreamFinisher for ChapterFinisher {
    type Metadata = ChapterMetadata;

    async fn finish(&mut self, full_text: &str) -> Result<ChapterMetadata> {
        Ok(ChapterMetadata {
            word_count: count_words(full_text),
            completed_at: Utc::now(),
        })
    }

    async fn persist(&mut self, full_text: &str, metadata: &ChapterMetadata) -> Option<Result<()>> {
        Some(
            self.db
                .update_chapter_content(&self.chapter_id, None, full_text, metadata.word_count),
        )
    }
}
