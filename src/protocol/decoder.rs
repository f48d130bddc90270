//! Consumer side of the event stream.
//!
//! Chunks may split a frame anywhere, including inside a multi-byte UTF-8
//! sequence. The decoder keeps undecoded bytes and the trailing incomplete
//! frame buffered until more input arrives. Lines that do not start with
//! the data prefix are ignored; frames whose JSON fails to parse are
//! skipped without ending the stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::warn;

use super::event::StreamEvent;
use super::{DATA_PREFIX, FRAME_SEPARATOR};
use crate::types::Result;

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes not yet valid UTF-8 (a split code point)
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a frame separator
    buffer: String,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find(FRAME_SEPARATOR) {
            let frame: String = self.buffer.drain(..idx + FRAME_SEPARATOR.len()).collect();
            self.parse_frame(&frame[..idx], &mut events);
        }
        events
    }

    /// Flush whatever remains once the byte stream has ended
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        let frame = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if !frame.trim().is_empty() {
            self.parse_frame(&frame, &mut events);
        }
        events
    }

    /// Number of malformed frames skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.buffer.push_str(s);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // Valid prefix is guaranteed by valid_up_to
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    fn parse_frame(&mut self, frame: &str, events: &mut Vec<StreamEvent>) {
        for line in frame.lines() {
            let Some(json) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            match serde_json::from_str::<StreamEvent>(json) {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping malformed stream frame: {}", e);
                }
            }
        }
    }
}

/// Pull-based reader over a byte stream
pub struct EventReader<S> {
    inner: S,
    decoder: SseDecoder,
    ready: VecDeque<StreamEvent>,
    finished: bool,
}

impl<S> EventReader<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next decoded event, `None` at end of stream
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.finished = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }
}
