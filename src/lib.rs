//! BookForge - AI Orchestration for Guided Book Authoring
//!
//! The core behind an authoring platform where an AI interviews the author,
//! drafts chapters, and reviews the finished book.
//!
//! ## Core Features
//!
//! - **Interview Wizard**: tag parsing and phase derivation from conversation history
//! - **Event Streams**: `data: <json>` framing shared by server and client
//! - **Generation Controllers**: cancellable client state machines over event streams
//! - **Debounced Editors**: reducer-owned state with trailing-edge persistence
//! - **Analysis**: parallel per-chapter QA with word-weighted aggregation, outline analysis
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider abstraction, prompts, timeouts, structured output
//! - [`wizard`]: interview tags and phase machine
//! - [`protocol`]: event-stream codec
//! - [`service`]: server-side chat, drafting and analysis services
//! - [`analysis`]: QA orchestration, aggregation and fixes
//! - [`server`]: axum HTTP API
//! - [`client`]: transport, generation controllers, editors, analysis controllers
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`config`]: layered configuration

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod protocol;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;
pub mod wizard;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{BookError, ErrorCategory, Result, ResultExt};

// Storage
pub use storage::{Database, SharedDatabase};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{LazyProvider, LlmProvider, ProviderConfig, SharedProvider, TimeoutConfig, with_timeout};

// =============================================================================
// Streaming and Client Re-exports
// =============================================================================

pub use client::{ChapterController, ChatController, GenerationStatus, HttpTransport, Transport};
pub use protocol::{EventReader, StreamEvent};
pub use server::{AppState, router};
