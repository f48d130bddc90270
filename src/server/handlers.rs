//! Route handlers.
//!
//! Streaming routes do all validation, ownership checks and loading before
//! the response is committed. After that, failures travel as `error` events.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::AppState;
use super::auth::CurrentUser;
use super::error::json_body;
use crate::analysis::FixRequest;
use crate::protocol::{self, EVENT_STREAM_CONTENT_TYPE, EventStream};
use crate::service::{ChapterGenerationRequest, ChatTurnRequest, OutlineAnalyzeRequest, QaAnalyzeRequest};
use crate::types::{FixResult, OutlineAnalysis, QaAnalysisResult, Result};

type JsonResult<T> = std::result::Result<Json<T>, JsonRejection>;

fn event_stream_response(stream: EventStream) -> Response {
    (
        [
            (header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream.into_frames()),
    )
        .into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/ai/chat`
pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: JsonResult<ChatTurnRequest>,
) -> Result<Response> {
    let body = json_body(body)?;
    let turn = state.chat.prepare(&user, &body)?;
    let provider = state.provider.get()?;

    let (sink, stream) = protocol::channel(state.stream_capacity);
    let service = state.chat.clone();
    let outline_id = body.outline_id;
    tokio::spawn(async move {
        let outcome = service.run(provider, turn, sink).await;
        debug!(outline = %outline_id, ?outcome, "Chat turn finished");
    });

    Ok(event_stream_response(stream))
}

/// `POST /api/ai/generate/chapter`
pub async fn generate_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: JsonResult<ChapterGenerationRequest>,
) -> Result<Response> {
    let body = json_body(body)?;
    let draft = state.chapters.prepare(&user, &body)?;
    let provider = state.provider.get()?;

    let (sink, stream) = protocol::channel(state.stream_capacity);
    let service = state.chapters.clone();
    let chapter_id = body.chapter_id;
    tokio::spawn(async move {
        let outcome = service.run(provider, draft, sink).await;
        debug!(chapter = %chapter_id, ?outcome, "Chapter draft finished");
    });

    Ok(event_stream_response(stream))
}

/// `POST /api/outline/analyze`
pub async fn analyze_outline(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: JsonResult<OutlineAnalyzeRequest>,
) -> Result<Json<OutlineAnalysis>> {
    let body = json_body(body)?;
    let provider = state.provider.get()?;
    let analysis = state.analysis.analyze_outline(provider, &user, &body).await?;
    Ok(Json(analysis))
}

/// `POST /api/qa/analyze`
pub async fn analyze_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: JsonResult<QaAnalyzeRequest>,
) -> Result<Json<QaAnalysisResult>> {
    let body = json_body(body)?;
    let provider = state.provider.get()?;
    info!(book = %body.book_id, "QA analysis requested");
    let result = state.analysis.analyze_book(provider, &user, &body).await?;
    Ok(Json(result))
}

/// `POST /api/qa/fix`
pub async fn apply_fix(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: JsonResult<FixRequest>,
) -> Result<Json<FixResult>> {
    let body = json_body(body)?;
    let result = state.analysis.apply_fix(&user, &body)?;
    Ok(Json(result))
}
