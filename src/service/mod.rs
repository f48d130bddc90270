//! Request-level services behind the HTTP routes.
//!
//! Each service splits a request into `prepare` (validation, ownership and
//! loading, all before a response is committed) and `run` (streaming or the
//! AI call itself).

pub mod analysis;
pub mod chapter;
pub mod chat;

pub use analysis::{AnalysisService, OutlineAnalyzeRequest, QaAnalyzeRequest};
pub use chapter::{ChapterGenerationRequest, ChapterMetadata, ChapterService, PreparedDraft};
pub use chat::{ChatMetadata, ChatService, ChatTurnRequest, PhaseTransition, PreparedTurn};
