//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait used by every AI operation:
//! structured JSON output for analyses and incremental text for drafting
//! and chat. Providers are constructed explicitly and injected; there is no
//! global client.
//!
//! ## Modules
//!
//! - `openai`: OpenAI-compatible chat completions over HTTP
//! - `lazy`: lazily-initialized shared holder with an explicit reset

mod lazy;
mod openai;

pub use lazy::LazyProvider;
pub use openai::OpenAiProvider;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::types::{ConversationMessage, Result, Role};

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Structured LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated content (structured JSON)
    pub content: Value,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

/// Incremental text produced by a streaming generation
pub type TextStream = BoxStream<'static, Result<String>>;

/// Shared LLM provider type for concurrent access across requests.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// Streaming Request
// =============================================================================

/// A multi-turn text generation request
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatTurn>,
    pub max_tokens: Option<usize>,
}

/// One message in a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ConversationMessage> for ChatTurn {
    fn from(message: &ConversationMessage) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: message.content.clone(),
        }
    }
}

impl ChatRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Default::default()
        }
    }

    /// Single-prompt request
    pub fn single(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatTurn::user(prompt)],
            max_tokens: None,
        }
    }

    pub fn with_history(mut self, history: &[ConversationMessage]) -> Self {
        self.messages.extend(history.iter().map(ChatTurn::from));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for LLM providers
///
/// API keys are never serialized and are redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "openai" (any OpenAI-compatible endpoint)
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for LLM generation
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            timeout_secs: 300,
            temperature: 0.7,
            api_key: None,
            api_base: None,
            max_tokens: 4096,
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate structured output matching a JSON schema
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    /// Stream free-form text increments
    async fn stream(&self, request: ChatRequest) -> Result<TextStream>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        _ => Err(crate::types::BookError::Config(format!(
            "Unknown provider: {}. Supported: openai",
            config.provider
        ))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider for tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::types::BookError;

    /// Replays queued responses; records every prompt it receives
    #[derive(Default)]
    pub struct ScriptedProvider {
        structured: Mutex<VecDeque<Result<Value>>>,
        streams: Mutex<VecDeque<Vec<Result<String>>>>,
        pub prompts: Mutex<Vec<String>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_json(&self, value: Value) -> &Self {
            self.structured.lock().unwrap().push_back(Ok(value));
            self
        }

        pub fn push_failure(&self, err: BookError) -> &Self {
            self.structured.lock().unwrap().push_back(Err(err));
            self
        }

        pub fn push_stream(&self, chunks: Vec<Result<String>>) -> &Self {
            self.streams.lock().unwrap().push_back(chunks);
            self
        }

        pub fn push_text(&self, chunks: &[&str]) -> &Self {
            self.push_stream(chunks.iter().map(|c| Ok(c.to_string())).collect())
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, prompt: &str, _schema: &Value) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self
                .structured
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BookError::llm(ErrorCategory::Unknown, "script exhausted")));
            next.map(LlmResponse::content_only)
        }

        async fn stream(&self, request: ChatRequest) -> Result<TextStream> {
            self.requests.lock().unwrap().push(request);
            let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }
    }
}
