//! OpenAI API Provider
//!
//! LLM provider using OpenAI's Chat Completions API. Structured calls use
//! `response_format: json_object`; streaming calls read the `data:` lines of
//! the completion stream and yield content deltas.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    ChatRequest, ChatTurn, LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata,
    ResponseTiming, TextStream, TokenUsage,
};
use crate::ai::validation::extract_json_from_response;
use crate::types::{BookError, ErrorCategory, ErrorClassifier, LlmError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const PROVIDER: &str = "openai";
const STREAM_DONE: &str = "[DONE]";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                BookError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        // No client-level timeout: streams may legitimately run long, callers
        // bound structured calls with `with_timeout`.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(30)))
            .build()
            .map_err(|e| BookError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_structured_request(&self, prompt: &str, schema: &Value) -> ChatCompletionRequest {
        let system_content = if schema.is_null() {
            "You are an expert book editor. Always respond with valid JSON.".to_string()
        } else {
            let schema_str =
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
            format!(
                "You are an expert book editor. Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                schema_str
            )
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatTurn {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatTurn::user(prompt),
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        }
    }

    fn build_stream_request(&self, request: ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatTurn {
                role: "system".to_string(),
                content: request.system,
            });
        }
        messages.extend(request.messages);

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
            response_format: None,
            stream: true,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, PROVIDER))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status, &text, PROVIDER).into());
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        info!(
            "Generating with OpenAI (model: {}, temperature: {})",
            self.model, self.temperature
        );

        let start_time = Instant::now();
        let request = self.build_structured_request(prompt, schema);
        let response = self.send(&request).await?;
        let elapsed = start_time.elapsed();

        let response_body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, PROVIDER))?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| {
                LlmError::with_provider(
                    ErrorCategory::ParseError,
                    "No content in OpenAI response",
                    PROVIDER,
                )
            })?;

        debug!("Received response from OpenAI, parsing JSON");
        let content = extract_json_from_response(content_str)?;

        Ok(LlmResponse {
            content,
            usage,
            timing: ResponseTiming::from_duration(elapsed),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER.to_string(),
            },
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<TextStream> {
        info!(model = %self.model, turns = request.messages.len(), "Streaming with OpenAI");

        let body = self.build_stream_request(request);
        let response = self.send(&body).await?;
        let state = DeltaReader::new(response.bytes_stream().boxed());

        Ok(stream::try_unfold(state, |mut reader| async move {
            Ok(reader.next_delta().await?.map(|text| (text, reader)))
        })
        .boxed())
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// Stream Parsing
// =============================================================================

/// One parsed line of the completion stream
#[derive(Debug, PartialEq)]
enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_stream_line(line: &str) -> Result<StreamLine> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim();
    if data == STREAM_DONE {
        return Ok(StreamLine::Done);
    }
    if data.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        LlmError::with_provider(
            ErrorCategory::ParseError,
            format!("Malformed stream chunk: {}", e),
            PROVIDER,
        )
    })?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty())
        .map(StreamLine::Delta)
        .unwrap_or(StreamLine::Skip))
}

/// Buffers raw bytes into lines and yields content deltas in order
struct DeltaReader {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl DeltaReader {
    fn new(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            bytes,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    async fn next_delta(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Ok(Some(text));
            }
            if self.finished {
                return Ok(None);
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.drain_lines()?;
                }
                Some(Err(e)) => return Err(BookError::Transport(e.to_string())),
                None => {
                    let rest = std::mem::take(&mut self.buffer);
                    self.accept(&String::from_utf8_lossy(&rest))?;
                    self.finished = true;
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Result<()> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.accept(&String::from_utf8_lossy(&line))?;
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    fn accept(&mut self, line: &str) -> Result<()> {
        match parse_stream_line(line)? {
            StreamLine::Delta(text) => self.pending.push_back(text),
            StreamLine::Done => self.finished = true,
            StreamLine::Skip => {}
        }
        Ok(())
    }
}

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatTurn>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
