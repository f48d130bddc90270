//! Client transport to the BookForge API.
//!
//! Every call is bound to a [`CancellationToken`]: cancelling it abandons the
//! request and ends an open byte stream without surfacing an error.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::constants::network::USER_ID_HEADER;
use crate::types::{BookError, Result};

/// Response body of a streaming route
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

pub type SharedTransport = Arc<dyn Transport>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body and decode a JSON response
    async fn post_json(&self, path: &str, body: Value, cancel: &CancellationToken) -> Result<Value>;

    /// POST a JSON body and return the response body as raw bytes
    async fn post_stream(
        &self,
        path: &str,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<ByteStream>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Map a non-success response to an error, keeping the server's message
pub fn error_from_response(status: u16, body: &str) -> BookError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status {}", status));

    match parsed.and_then(|b| b.code) {
        Some(code) if status == StatusCode::CONFLICT.as_u16() => BookError::Conflict { code, message },
        _ => BookError::Http { status, message },
    }
}

/// Message suitable for showing inline to the author
pub fn user_message(err: &BookError) -> String {
    match err {
        BookError::Http { message, .. } | BookError::Conflict { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// [`Transport`] over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    user_id: Option<String>,
}

impl HttpTransport {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| BookError::Config(format!("Invalid API base URL '{}': {}", base, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BookError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base,
            user_id: None,
        })
    }

    /// Identify requests as `user_id`, as the upstream gateway would
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    async fn send(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = self
            .base
            .join(path)
            .map_err(|e| BookError::validation(format!("Invalid path '{}': {}", path, e)))?;

        let mut request = self.client.post(url).json(body);
        if let Some(user) = &self.user_id {
            request = request.header(USER_ID_HEADER, user);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BookError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(%status, path, "Request rejected");
            return Err(error_from_response(status.as_u16(), &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: Value, cancel: &CancellationToken) -> Result<Value> {
        let call = async {
            let response = self.send(path, &body).await?;
            response
                .json::<Value>()
                .await
                .map_err(|e| BookError::Transport(format!("Invalid JSON response: {}", e)))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BookError::Cancelled),
            result = call => result,
        }
    }

    async fn post_stream(
        &self,
        path: &str,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<ByteStream> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BookError::Cancelled),
            result = self.send(path, &body) => result?,
        };

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| BookError::Transport(e.to_string())))
            .take_until(cancel.clone().cancelled_owned());
        Ok(stream.boxed())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for controller tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::oneshot;

    use crate::protocol::{StreamEvent, encode_events};

    pub enum Reply {
        Json(Result<Value>),
        Stream(Result<Vec<Bytes>>),
        /// Chunks arrive as the test sends them
        Live(futures::channel::mpsc::UnboundedReceiver<Bytes>),
    }

    struct Scripted {
        reply: Reply,
        gate: Option<oneshot::Receiver<()>>,
    }

    /// Replays queued replies in order and records every call.
    ///
    /// Cancellation tokens are deliberately ignored so tests can observe
    /// late resolutions reaching the caller.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Scripted>>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, reply: Reply) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Scripted { reply, gate: None });
        }

        /// Queue a reply that is only delivered once the returned sender fires
        pub fn push_gated(&self, reply: Reply) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(Scripted {
                reply,
                gate: Some(rx),
            });
            tx
        }

        pub fn push_json(&self, value: Value) {
            self.push(Reply::Json(Ok(value)));
        }

        pub fn push_events(&self, events: &[StreamEvent]) {
            let wire = encode_events(events).unwrap();
            self.push(Reply::Stream(Ok(vec![Bytes::from(wire)])));
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        async fn next(&self, path: &str, body: Value) -> Reply {
            self.calls.lock().unwrap().push((path.to_string(), body));
            let scripted = self.replies.lock().unwrap().pop_front();
            match scripted {
                Some(Scripted { reply, gate }) => {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    reply
                }
                None => Reply::Json(Err(BookError::Transport("script exhausted".into()))),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(&self, path: &str, body: Value, _cancel: &CancellationToken) -> Result<Value> {
            match self.next(path, body).await {
                Reply::Json(result) => result,
                Reply::Stream(_) | Reply::Live(_) => {
                    Err(BookError::Transport("expected a JSON reply".into()))
                }
            }
        }

        async fn post_stream(
            &self,
            path: &str,
            body: Value,
            _cancel: &CancellationToken,
        ) -> Result<ByteStream> {
            match self.next(path, body).await {
                Reply::Stream(result) => {
                    let chunks = result?;
                    Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
                }
                Reply::Live(chunks) => Ok(chunks.map(Ok).boxed()),
                Reply::Json(Err(e)) => Err(e),
                Reply::Json(Ok(_)) => Err(BookError::Transport("expected a stream reply".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CONTENT_CHANGED;

    #[test]
    fn test_conflict_keeps_code() {
        let err = error_from_response(409, r#"{"error":"Text moved","code":"CONTENT_CHANGED"}"#);
        assert_eq!(err.code(), Some(CONTENT_CHANGED));
        assert_eq!(user_message(&err), "Text moved");
    }

    #[test]
    fn test_server_message_preserved() {
        let err = error_from_response(404, r#"{"error":"Outline not found: o1","code":"NOT_FOUND"}"#);
        assert!(matches!(err, BookError::Http { status: 404, .. }));
        assert_eq!(user_message(&err), "Outline not found: o1");
    }

    #[test]
    fn test_generic_message_for_unreadable_body() {
        let err = error_from_response(502, "<html>Bad Gateway</html>");
        assert_eq!(user_message(&err), "Request failed with status 502");
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        assert!(matches!(HttpTransport::new("not a url"), Err(BookError::Config(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transport
            .post_json("/api/qa/analyze", serde_json::json!({}), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
