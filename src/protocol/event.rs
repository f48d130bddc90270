//! Stream event model.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{DATA_PREFIX, FRAME_SEPARATOR};
use crate::types::{BookError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Text,
    Metadata,
    SaveStatus,
    Done,
    Error,
}

impl EventType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One event on the wire.
///
/// `content` of `metadata` and `save_status` events is itself a JSON
/// document and needs a second decode step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub content: String,
}

/// Result of the best-effort persistence attempt after a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStatus {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveStatus {
    pub fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: EventType::Text,
            content: content.into(),
        }
    }

    pub fn metadata<T: Serialize>(payload: &T) -> Result<Self> {
        Ok(Self {
            kind: EventType::Metadata,
            content: serde_json::to_string(payload)?,
        })
    }

    pub fn save_status(status: &SaveStatus) -> Result<Self> {
        Ok(Self {
            kind: EventType::SaveStatus,
            content: serde_json::to_string(status)?,
        })
    }

    pub fn done() -> Self {
        Self {
            kind: EventType::Done,
            content: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventType::Error,
            content: message.into(),
        }
    }

    /// Serialize as one wire frame
    pub fn to_frame(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}{}{}", DATA_PREFIX, json, FRAME_SEPARATOR))
    }

    /// Second decode step for `metadata` / `save_status` payloads
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        match self.kind {
            EventType::Metadata | EventType::SaveStatus => {
                serde_json::from_str(&self.content).map_err(BookError::from)
            }
            other => Err(BookError::validation(format!(
                "{:?} events carry no JSON payload",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_layout() {
        let frame = StreamEvent::text("Hello").to_frame().unwrap();
        assert_eq!(frame, "data: {\"type\":\"text\",\"content\":\"Hello\"}\n\n");
    }

    #[test]
    fn test_newlines_in_content_stay_inside_json() {
        let frame = StreamEvent::text("a\n\nb").to_frame().unwrap();
        assert_eq!(frame.matches("\n\n").count(), 1);
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_nested_metadata_payload() {
        let event = StreamEvent::metadata(&json!({"wordCount": 2})).unwrap();
        assert_eq!(event.kind, EventType::Metadata);
        let payload: serde_json::Value = event.payload().unwrap();
        assert_eq!(payload["wordCount"], 2);
    }

    #[test]
    fn test_save_status_omits_missing_error() {
        let event = StreamEvent::save_status(&SaveStatus::saved()).unwrap();
        assert_eq!(event.content, "{\"success\":true}");
        let failed: SaveStatus = StreamEvent::save_status(&SaveStatus::failed("disk full"))
            .unwrap()
            .payload()
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_text_has_no_payload() {
        assert!(StreamEvent::text("x").payload::<serde_json::Value>().is_err());
    }
}
