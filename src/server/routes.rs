//! Route table.

use axum::Router;
use axum::routing::{get, post};

use super::AppState;
use super::handlers;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/ai/chat", post(handlers::chat))
        .route("/api/ai/generate/chapter", post(handlers::generate_chapter))
        .route("/api/outline/analyze", post(handlers::analyze_outline))
        .route("/api/qa/analyze", post(handlers::analyze_book))
        .route("/api/qa/fix", post(handlers::apply_fix))
        .with_state(state)
}
