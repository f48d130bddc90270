//! Reducer contract shared by the editors, plus the save-status machine.

use chrono::{DateTime, Utc};

/// Pure state transitions over a closed action set
pub trait Reducer: Send + Sync + 'static {
    type State: Clone + PartialEq + Send + Sync + 'static;
    type Action: Send;

    fn reduce(state: Self::State, action: Self::Action) -> Self::State;

    /// Whether the action edits content and so needs persisting
    fn is_edit(action: &Self::Action) -> bool;

    /// Wrap a save-status change as an action
    fn save_event(event: SaveEvent) -> Self::Action;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Started,
    Succeeded(DateTime<Utc>),
    Failed(String),
}

/// Persistence progress of an editor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveTracker {
    pub status: SaveState,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SaveTracker {
    pub fn apply(mut self, event: SaveEvent) -> Self {
        match event {
            SaveEvent::Started => {
                self.status = SaveState::Saving;
            }
            SaveEvent::Succeeded(at) => {
                self.status = SaveState::Saved;
                self.last_saved_at = Some(at);
                self.last_error = None;
            }
            SaveEvent::Failed(reason) => {
                self.status = SaveState::Error;
                self.last_error = Some(reason);
            }
        }
        self
    }
}

/// Trimmed text, or `None` when nothing is left
pub fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_cycle() {
        let tracker = SaveTracker::default().apply(SaveEvent::Started);
        assert_eq!(tracker.status, SaveState::Saving);

        let failed = tracker.apply(SaveEvent::Failed("offline".into()));
        assert_eq!(failed.status, SaveState::Error);
        assert_eq!(failed.last_error.as_deref(), Some("offline"));
        assert!(failed.last_saved_at.is_none());

        let now = Utc::now();
        let saved = failed
            .apply(SaveEvent::Started)
            .apply(SaveEvent::Succeeded(now));
        assert_eq!(saved.status, SaveState::Saved);
        assert_eq!(saved.last_saved_at, Some(now));
        assert!(saved.last_error.is_none());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  Intro \n"), Some("Intro".to_string()));
        assert_eq!(non_blank(" \t "), None);
    }
}
