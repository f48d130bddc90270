//! Generation Controllers
//!
//! Client state machines for streamed chat turns and chapter drafts:
//!
//! ```text
//! idle → loading → streaming → complete
//!           ↘          ↘
//!            error      error        abort(): any non-terminal → idle
//! ```
//!
//! Each controller owns at most one live operation. Starting a new one, or
//! calling [`GenerationController::abort`], bumps an epoch and cancels the
//! previous token; anything that settles under a stale epoch is dropped, so a
//! late resolution can never overwrite newer state.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::timer::Throttle;
use super::transport::{SharedTransport, user_message};
use crate::constants::editor::STREAM_THROTTLE_MS;
use crate::protocol::{EventReader, EventType, SaveStatus, StreamEvent};
use crate::service::{ChapterGenerationRequest, ChapterMetadata, ChatMetadata, ChatTurnRequest};
use crate::types::{BookError, Result, WizardState};
use crate::wizard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Loading,
    Streaming,
    Complete,
    Error,
}

/// Client-visible state of one generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationState<M> {
    pub status: GenerationStatus,
    /// Throttled view of the streamed text
    pub accumulated_text: String,
    pub word_count: usize,
    pub error: Option<String>,
    /// Non-blocking warning when the server could not save the result
    pub save_warning: Option<String>,
    pub metadata: Option<M>,
}

impl<M> Default for GenerationState<M> {
    fn default() -> Self {
        Self {
            status: GenerationStatus::Idle,
            accumulated_text: String::new(),
            word_count: 0,
            error: None,
            save_warning: None,
            metadata: None,
        }
    }
}

/// What differs between streamed operations
pub trait GenerationKind: Send + Sync + 'static {
    type Params: Serialize + Send + Sync;
    type Metadata: DeserializeOwned + Clone + Send + Sync + 'static;

    const PATH: &'static str;

    /// Word count carried by the final metadata, if any
    fn word_count(_metadata: &Self::Metadata) -> Option<usize> {
        None
    }
}

pub struct ChatKind;

impl GenerationKind for ChatKind {
    type Params = ChatTurnRequest;
    type Metadata = ChatMetadata;
    const PATH: &'static str = "/api/ai/chat";
}

pub struct ChapterKind;

impl GenerationKind for ChapterKind {
    type Params = ChapterGenerationRequest;
    type Metadata = ChapterMetadata;
    const PATH: &'static str = "/api/ai/generate/chapter";

    fn word_count(metadata: &ChapterMetadata) -> Option<usize> {
        Some(metadata.word_count)
    }
}

struct Inner<M> {
    state: GenerationState<M>,
    /// Full streamed text; `state.accumulated_text` trails it by the throttle
    buffer: String,
    epoch: u64,
    cancel: Option<CancellationToken>,
    tx: watch::Sender<GenerationState<M>>,
}

impl<M: Clone> Inner<M> {
    fn publish(&self) {
        self.tx.send_replace(self.state.clone());
    }

    fn flush(&mut self) {
        if self.state.accumulated_text.len() != self.buffer.len() {
            self.state.accumulated_text.clone_from(&self.buffer);
            self.publish();
        }
    }
}

pub struct GenerationController<K: GenerationKind> {
    transport: SharedTransport,
    inner: Arc<Mutex<Inner<K::Metadata>>>,
    throttle: Arc<Throttle>,
    _kind: PhantomData<K>,
}

impl<K: GenerationKind> Clone for GenerationController<K> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            inner: Arc::clone(&self.inner),
            throttle: Arc::clone(&self.throttle),
            _kind: PhantomData,
        }
    }
}

pub type ChatController = GenerationController<ChatKind>;
pub type ChapterController = GenerationController<ChapterKind>;

impl<K: GenerationKind> GenerationController<K> {
    pub fn new(transport: SharedTransport) -> Self {
        Self::with_throttle(transport, Duration::from_millis(STREAM_THROTTLE_MS))
    }

    pub fn with_throttle(transport: SharedTransport, interval: Duration) -> Self {
        let (tx, _) = watch::channel(GenerationState::default());
        Self {
            transport,
            inner: Arc::new(Mutex::new(Inner {
                state: GenerationState::default(),
                buffer: String::new(),
                epoch: 0,
                cancel: None,
                tx,
            })),
            throttle: Arc::new(Throttle::new(interval)),
            _kind: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K::Metadata>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> GenerationState<K::Metadata> {
        self.lock().state.clone()
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<GenerationState<K::Metadata>> {
        self.lock().tx.subscribe()
    }

    /// Run one generation to its end, superseding any live one
    pub async fn generate(&self, params: &K::Params) -> GenerationStatus {
        let (epoch, token) = self.begin();

        let body = match serde_json::to_value(params) {
            Ok(body) => body,
            Err(e) => return self.settle(epoch, Err(e.into())),
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(BookError::Cancelled),
            result = self.drive(epoch, body, &token) => result,
        };
        self.settle(epoch, outcome)
    }

    /// Cancel the live operation and return to idle immediately.
    ///
    /// Safe to call at any time; a no-op when nothing is running.
    pub fn abort(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        let Some(token) = inner.cancel.take() else {
            return;
        };
        token.cancel();
        self.throttle.reset();
        inner.flush();
        inner.state.status = GenerationStatus::Idle;
        inner.publish();
        debug!(path = K::PATH, "Generation aborted");
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut inner = self.lock();
        if let Some(previous) = inner.cancel.replace(token.clone()) {
            previous.cancel();
        }
        inner.epoch += 1;
        inner.buffer.clear();
        inner.state = GenerationState {
            status: GenerationStatus::Loading,
            ..GenerationState::default()
        };
        inner.publish();
        self.throttle.reset();
        (inner.epoch, token)
    }

    /// Apply `f` only while `epoch` is still the live operation
    fn update<F>(&self, epoch: u64, f: F) -> Result<()>
    where
        F: FnOnce(&mut Inner<K::Metadata>),
    {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Err(BookError::Cancelled);
        }
        f(&mut inner);
        Ok(())
    }

    async fn drive(&self, epoch: u64, body: serde_json::Value, token: &CancellationToken) -> Result<()> {
        let stream = self.transport.post_stream(K::PATH, body, token).await?;
        self.update(epoch, |inner| {
            inner.state.status = GenerationStatus::Streaming;
            inner.publish();
        })?;

        let mut reader = EventReader::new(stream);
        while let Some(event) = reader.next_event().await {
            let event = event?;
            let terminal = event.kind.is_terminal();
            self.handle_event(epoch, event)?;
            if terminal {
                return Ok(());
            }
        }

        Err(BookError::Transport(
            "Stream ended before completion".to_string(),
        ))
    }

    /// Apply one event; a server `error` event becomes `Err`
    fn handle_event(&self, epoch: u64, event: StreamEvent) -> Result<()> {
        match event.kind {
            EventType::Text => {
                self.update(epoch, |inner| inner.buffer.push_str(&event.content))?;
                let shared = Arc::clone(&self.inner);
                self.throttle.run(move || {
                    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
                    if inner.epoch == epoch {
                        inner.flush();
                    }
                });
                Ok(())
            }
            EventType::Metadata => {
                match event.payload::<K::Metadata>() {
                    Ok(metadata) => self.update(epoch, |inner| {
                        if let Some(words) = K::word_count(&metadata) {
                            inner.state.word_count = words;
                        }
                        inner.state.metadata = Some(metadata);
                        inner.publish();
                    })?,
                    Err(e) => warn!(path = K::PATH, "Ignoring unreadable metadata: {}", e),
                }
                Ok(())
            }
            EventType::SaveStatus => {
                match event.payload::<SaveStatus>() {
                    Ok(status) if !status.success => self.update(epoch, |inner| {
                        let reason = status
                            .error
                            .unwrap_or_else(|| "unknown error".to_string());
                        inner.state.save_warning = Some(format!(
                            "The result was not saved ({}). Copy it before leaving this page.",
                            reason
                        ));
                        inner.publish();
                    })?,
                    Ok(_) => {}
                    Err(e) => warn!(path = K::PATH, "Ignoring unreadable save status: {}", e),
                }
                Ok(())
            }
            EventType::Done => Ok(()),
            EventType::Error => Err(BookError::Http {
                status: 502,
                message: if event.content.trim().is_empty() {
                    "Generation failed".to_string()
                } else {
                    event.content
                },
            }),
        }
    }

    fn settle(&self, epoch: u64, outcome: Result<()>) -> GenerationStatus {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            // Superseded or aborted; its outcome is not ours to report
            return inner.state.status;
        }

        self.throttle.cancel_pending();
        inner.cancel = None;
        inner.flush();

        match outcome {
            Ok(()) => {
                inner.state.status = GenerationStatus::Complete;
                inner.state.error = None;
            }
            Err(e) if e.is_cancellation() => {
                inner.state.status = GenerationStatus::Idle;
            }
            Err(e) => {
                warn!(path = K::PATH, "Generation failed: {}", e);
                inner.state.status = GenerationStatus::Error;
                inner.state.error = Some(user_message(&e));
            }
        }
        inner.publish();
        inner.state.status
    }
}

impl ChatController {
    pub async fn send(&self, outline_id: &str, message: &str) -> GenerationStatus {
        self.generate(&ChatTurnRequest {
            outline_id: outline_id.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Assistant text with directive blocks removed
    pub fn display_text(&self) -> String {
        wizard::strip(&self.lock().state.accumulated_text)
    }

    pub fn wizard_state(&self) -> Option<WizardState> {
        self.lock()
            .state
            .metadata
            .as_ref()
            .map(|m| m.wizard_state.clone())
    }
}
