//! Event-Stream Protocol
//!
//! Wire format shared by the streaming endpoints and their clients:
//! a sequence of `data: <json>\n\n` frames where `<json>` decodes to
//! `{type, content}`.
//!
//! - [`event`]: the event model and frame serialization
//! - [`encoder`]: producer side, turning a text source into ordered events
//! - [`decoder`]: consumer side, reassembling events from arbitrary chunks

pub mod decoder;
pub mod encoder;
pub mod event;

pub use decoder::{EventReader, SseDecoder};
pub use encoder::{
    EventSink, EventStream, ProduceOutcome, StreamFinisher, channel, encode_events, produce,
};
pub use event::{EventType, SaveStatus, StreamEvent};

/// Prefix of every data line
pub const DATA_PREFIX: &str = "data: ";

/// Separator between frames
pub const FRAME_SEPARATOR: &str = "\n\n";

/// Content type for streaming responses
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
