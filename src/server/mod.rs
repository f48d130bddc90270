//! HTTP API
//!
//! Axum server exposing the streaming generation routes and the analysis
//! routes. Handlers share one [`AppState`]; the LLM provider inside it is
//! built lazily on the first request that needs it.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use routes::router;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::ai::LazyProvider;
use crate::config::Config;
use crate::service::{AnalysisService, ChapterService, ChatService};
use crate::storage::{Database, SharedDatabase};
use crate::types::Result;

/// Events buffered between a producer and a slow client
const STREAM_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDatabase,
    pub provider: Arc<LazyProvider>,
    pub chat: ChatService,
    pub chapters: ChapterService,
    pub analysis: AnalysisService,
    pub stream_capacity: usize,
}

impl AppState {
    pub fn new(db: SharedDatabase, provider: Arc<LazyProvider>, config: &Config) -> Self {
        let request_timeout = config.timeouts().llm_request;
        Self {
            chat: ChatService::new(db.clone(), config.wizard.total_questions)
                .with_request_timeout(request_timeout),
            chapters: ChapterService::new(db.clone(), config.llm.max_tokens)
                .with_request_timeout(request_timeout),
            analysis: AnalysisService::new(db.clone(), config.qa_settings()),
            db,
            provider,
            stream_capacity: STREAM_CAPACITY,
        }
    }
}

/// Open the database and serve until interrupted
pub async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let path = config.server.resolved_database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(Database::open(&path)?);
    db.initialize()?;
    info!(path = %path.display(), "Database ready");

    let provider = Arc::new(LazyProvider::new(config.llm.clone()));
    let state = AppState::new(db, provider, &config);

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "BookForge API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
