//! AI Integration Layer
//!
//! LLM provider abstraction, prompt construction, timeouts and structured
//! output validation shared by the chat, drafting and analysis services.

pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use prompt::{PromptBuilder, PromptSection, PromptTemplates};
pub use provider::{
    ChatRequest, ChatTurn, ErrorCategory, ErrorClassifier, LazyProvider, LlmError, LlmProvider,
    LlmResponse, OpenAiProvider, ProviderConfig, ResponseMetadata, ResponseTiming, SharedProvider,
    TextStream, TokenUsage, create_provider,
};
pub use timeout::{TimeoutConfig, with_idle_timeout, with_timeout};
pub use validation::{extract_json_from_response, parse_structured};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::types::Result;

/// Run one structured call and decode it into `T`.
///
/// The call is bounded by `timeout`; output that does not decode is a
/// `SchemaMismatch` for `context`.
pub async fn generate_structured<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    prompt: &str,
    schema: &Value,
    context: &str,
    timeout: Duration,
) -> Result<T> {
    let response = with_timeout(timeout, provider.generate(prompt, schema), context).await?;
    debug!(
        context,
        tokens = response.usage.total(),
        elapsed_ms = response.timing.total_ms,
        "Structured response received"
    );
    parse_structured(response.content, context)
}

/// Start a streamed call.
///
/// Both the wait for the stream to open and the wait for each later
/// increment are bounded by `timeout`.
pub async fn open_stream(
    provider: &dyn LlmProvider,
    request: ChatRequest,
    context: &str,
    timeout: Duration,
) -> Result<TextStream> {
    let source = with_timeout(timeout, provider.stream(request), context).await?;
    Ok(with_idle_timeout(source, timeout, context))
}
