//! Producer side of the event stream.
//!
//! A generation writes into an [`EventSink`]; the HTTP layer drains the
//! paired [`EventStream`] into the response body. The sink's terminal
//! methods take `self`, so exactly one of `done`/`error` can be sent and
//! nothing can follow it. Dropping the sender after the terminal event lets
//! the receiver drain every queued frame before it observes closure.

use std::convert::Infallible;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::event::{SaveStatus, StreamEvent};
use crate::types::{BookError, Result};

/// Default number of events buffered between producer and HTTP body
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Create a connected sink/stream pair
pub fn channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventStream { rx })
}

/// Write half used by the producing task
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    async fn send(&self, event: StreamEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| BookError::Cancelled)
    }

    /// Forward one text increment verbatim.
    ///
    /// Fails with `Cancelled` once the consumer has gone away.
    pub async fn text(&self, chunk: impl Into<String>) -> Result<()> {
        self.send(StreamEvent::text(chunk)).await
    }

    pub async fn metadata<T: Serialize>(&self, payload: &T) -> Result<()> {
        self.send(StreamEvent::metadata(payload)?).await
    }

    pub async fn save_status(&self, status: &SaveStatus) -> Result<()> {
        self.send(StreamEvent::save_status(status)?).await
    }

    pub async fn done(self) {
        if self.send(StreamEvent::done()).await.is_err() {
            debug!("Consumer gone before done event");
        }
    }

    pub async fn error(self, message: impl Into<String>) {
        if self.send(StreamEvent::error(message)).await.is_err() {
            debug!("Consumer gone before error event");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half, drained into the response body
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Collect every event until the producer closes the channel
    pub async fn collect_all(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Convert into wire frames for an HTTP body
    pub fn into_frames(self) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Send {
        futures::stream::unfold(self.rx, |mut rx| async move {
            loop {
                let event = rx.recv().await?;
                match event.to_frame() {
                    Ok(frame) => return Some((Ok(Bytes::from(frame)), rx)),
                    Err(e) => warn!("Skipping unencodable event: {}", e),
                }
            }
        })
    }
}

/// Encode a batch of events into one wire string
pub fn encode_events(events: &[StreamEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_frame()?);
    }
    Ok(out)
}

/// Completion hooks run after the text source is exhausted
#[async_trait]
pub trait StreamFinisher: Send {
    type Metadata: Serialize + Send + Sync;

    /// Derive side-channel data from the full generated text
    async fn finish(&mut self, full_text: &str) -> Result<Self::Metadata>;

    /// Best-effort persistence; `None` when nothing is persisted
    async fn persist(&mut self, full_text: &str, metadata: &Self::Metadata) -> Option<Result<()>>;
}

/// How a produced stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduceOutcome {
    Completed { text: String, saved: Option<bool> },
    Failed(String),
    /// The consumer went away; nothing more was sent
    Disconnected,
}

/// Drive a text source into the sink.
///
/// Emits, in order: one `text` event per increment, one `metadata` event,
/// one `save_status` event when persistence was attempted, then exactly one
/// terminal event. A failed save is a warning, so it is still followed by
/// `done`. Upstream failures become an `error` event because the response
/// is already committed to streaming.
pub async fn produce<S, F>(sink: EventSink, mut source: S, mut finisher: F) -> ProduceOutcome
where
    S: Stream<Item = Result<String>> + Unpin + Send,
    F: StreamFinisher,
{
    let mut full_text = String::new();

    while let Some(chunk) = source.next().await {
        match chunk {
            Ok(text) => {
                if text.is_empty() {
                    continue;
                }
                full_text.push_str(&text);
                if sink.text(text).await.is_err() {
                    debug!("Consumer disconnected mid-stream");
                    return ProduceOutcome::Disconnected;
                }
            }
            Err(e) => {
                warn!("Upstream stream failed: {}", e);
                let message = e.to_string();
                sink.error(message.clone()).await;
                return ProduceOutcome::Failed(message);
            }
        }
    }

    let metadata = match finisher.finish(&full_text).await {
        Ok(metadata) => metadata,
        Err(e) => {
            let message = e.to_string();
            sink.error(message.clone()).await;
            return ProduceOutcome::Failed(message);
        }
    };

    if sink.metadata(&metadata).await.is_err() {
        return ProduceOutcome::Disconnected;
    }

    let saved = match finisher.persist(&full_text, &metadata).await {
        Some(Ok(())) => {
            if sink.save_status(&SaveStatus::saved()).await.is_err() {
                return ProduceOutcome::Disconnected;
            }
            Some(true)
        }
        Some(Err(e)) => {
            warn!("Best-effort save failed: {}", e);
            if sink
                .save_status(&SaveStatus::failed(e.to_string()))
                .await
                .is_err()
            {
                return ProduceOutcome::Disconnected;
            }
            Some(false)
        }
        None => None,
    };

    sink.done().await;
    ProduceOutcome::Completed {
        text: full_text,
        saved,
    }
}
