//! Interview chat turns.
//!
//! A turn appends the author's message, streams the assistant reply, then
//! re-derives the wizard state from the full history and stores it. The
//! stored assistant text keeps its directive blocks so that state can always
//! be rebuilt from history alone.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::{ChatRequest, PromptTemplates, SharedProvider, TimeoutConfig, open_stream};
use crate::protocol::{EventSink, ProduceOutcome, StreamFinisher, produce};
use crate::storage::SharedDatabase;
use crate::types::{
    BookError, ConversationMessage, GapSuggestion, Result, UserId, WizardPhase, WizardState,
};
use crate::wizard::{self, InterviewContext};

/// Body of `POST /api/ai/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    pub outline_id: String,
    pub message: String,
}

impl ChatTurnRequest {
    pub fn validate(&self) -> Result<()> {
        if self.outline_id.trim().is_empty() {
            return Err(BookError::validation("outlineId is required"));
        }
        if self.message.trim().is_empty() {
            return Err(BookError::validation("message must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: WizardPhase,
    pub to: WizardPhase,
}

/// Final `metadata` payload of a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub wizard_state: WizardState,
    /// Gaps found in this turn only; the state carries the running list
    pub gaps: Vec<GapSuggestion>,
    pub phase_transition: Option<PhaseTransition>,
}

/// A validated turn, ready to stream
#[derive(Debug)]
pub struct PreparedTurn {
    outline_id: String,
    history: Vec<ConversationMessage>,
    context: InterviewContext,
    previous_phase: WizardPhase,
    request: ChatRequest,
}

#[derive(Clone)]
pub struct ChatService {
    db: SharedDatabase,
    total_questions: usize,
    request_timeout: Duration,
}

impl ChatService {
    pub fn new(db: SharedDatabase, total_questions: usize) -> Self {
        Self {
            db,
            total_questions,
            request_timeout: TimeoutConfig::default().llm_request,
        }
    }

    /// Bound on opening the reply stream and on each wait for more text
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate and load everything the turn needs.
    ///
    /// Every error here happens before the response is committed to a stream.
    pub fn prepare(&self, user: &UserId, body: &ChatTurnRequest) -> Result<PreparedTurn> {
        body.validate()?;
        let (_, book) = self.db.load_outline(user, &body.outline_id)?;
        let mut history = self.db.load_conversation(&body.outline_id)?;

        let context = InterviewContext {
            topic: book.topic,
            audience: book.audience,
            expertise_level: book.expertise_level,
            total_questions: self.total_questions,
        };

        let previous = wizard::derive_state(&history, &context);
        history.push(ConversationMessage::user(body.message.trim()));

        let system = PromptTemplates::interview(previous.phase, previous.question_count, &context);
        let request = ChatRequest::new(system).with_history(&history);

        Ok(PreparedTurn {
            outline_id: body.outline_id.clone(),
            history,
            context,
            previous_phase: previous.phase,
            request,
        })
    }

    /// Stream the assistant reply into `sink`
    pub async fn run(&self, provider: SharedProvider, turn: PreparedTurn, sink: EventSink) -> ProduceOutcome {
        info!(outline = %turn.outline_id, turns = turn.history.len(), "Starting chat turn");

        let source = match open_stream(
            provider.as_ref(),
            turn.request,
            "chat stream",
            self.request_timeout,
        )
        .await
        {
            Ok(source) => source,
            Err(e) => {
                warn!("Chat stream failed to start: {}", e);
                let message = e.to_string();
                sink.error(message.clone()).await;
                return ProduceOutcome::Failed(message);
            }
        };

        let finisher = ChatFinisher {
            db: self.db.clone(),
            outline_id: turn.outline_id,
            history: turn.history,
            context: turn.context,
            previous_phase: turn.previous_phase,
        };
        produce(sink, source, finisher).await
    }
}

struct ChatFinisher {
    db: SharedDatabase,
    outline_id: String,
    history: Vec<ConversationMessage>,
    context: InterviewContext,
    previous_phase: WizardPhase,
}

#[async_trait]
impl StreamFinisher for ChatFinisher {
    type Metadata = ChatMetadata;

    async fn finish(&mut self, full_text: &str) -> Result<ChatMetadata> {
        self.history.push(ConversationMessage::assistant(full_text));
        let state = wizard::derive_state(&self.history, &self.context);

        let phase_transition = (state.phase != self.previous_phase).then_some(PhaseTransition {
            from: self.previous_phase,
            to: state.phase,
        });
        if let Some(transition) = &phase_transition {
            info!(from = %transition.from, to = %transition.to, "Interview phase changed");
        }

        Ok(ChatMetadata {
            gaps: wizard::extract_gaps(full_text),
            wizard_state: state,
            phase_transition,
        })
    }

    async fn persist(&mut self, _full_text: &str, _metadata: &ChatMetadata) -> Option<Result<()>> {
        Some(self.db.save_conversation(&self.outline_id, &self.history))
    }
}
