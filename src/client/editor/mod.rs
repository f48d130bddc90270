//! Debounced Editors
//!
//! Local edits are applied through a pure reducer and are the source of
//! truth; persistence trails them. Every content edit restarts a quiet
//! window, and only the state at the end of the window is saved. Saves run
//! one at a time, and a save only reports `Saved` when no edit landed while
//! it was in flight.

pub mod chapter;
pub mod outline;
pub mod reducer;

pub use chapter::{ChapterAction, ChapterEditor, ChapterEditorState, ChapterReducer};
pub use outline::{OutlineAction, OutlineEditor, OutlineEditorState, OutlineReducer};
pub use reducer::{Reducer, SaveEvent, SaveState, SaveTracker};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::timer::Debouncer;
use crate::types::Result;

/// Persistence collaborator for editor drafts
#[async_trait]
pub trait DraftStore<T>: Send + Sync {
    async fn save(&self, draft: &T) -> Result<()>;
}

struct Shared<R: Reducer> {
    state: Mutex<R::State>,
    tx: watch::Sender<R::State>,
    store: Arc<dyn DraftStore<R::State>>,
    /// Bumped on every applied edit
    revision: AtomicU64,
    /// Held for the duration of one save
    save_lock: tokio::sync::Mutex<()>,
}

impl<R: Reducer> Shared<R> {
    fn apply(&self, action: R::Action) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let next = R::reduce(state.clone(), action);
        let changed = next != *state;
        if changed {
            *state = next;
            self.tx.send_replace(state.clone());
        }
        changed
    }

    fn snapshot(&self) -> R::State {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Save the current state; status is tracked through the reducer
    async fn persist(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        self.apply(R::save_event(SaveEvent::Started));
        let revision = self.revision.load(Ordering::SeqCst);
        let draft = self.snapshot();

        match self.store.save(&draft).await {
            Ok(()) => {
                if self.revision.load(Ordering::SeqCst) == revision {
                    self.apply(R::save_event(SaveEvent::Succeeded(Utc::now())));
                } else {
                    // The pending save for the newer edit settles the status
                    debug!("Saved draft is already stale");
                }
                Ok(())
            }
            Err(e) => {
                warn!("Draft save failed: {}", e);
                self.apply(R::save_event(SaveEvent::Failed(e.to_string())));
                Err(e)
            }
        }
    }
}

/// Reducer-driven editor with trailing-edge debounced saves
pub struct DebouncedEditor<R: Reducer> {
    shared: Arc<Shared<R>>,
    debouncer: Debouncer,
    delay: Duration,
}

impl<R: Reducer> DebouncedEditor<R> {
    /// Start from loaded state; loading itself never triggers a save
    pub fn new(initial: R::State, store: Arc<dyn DraftStore<R::State>>, delay: Duration) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(initial),
                tx,
                store,
                revision: AtomicU64::new(0),
                save_lock: tokio::sync::Mutex::new(()),
            }),
            debouncer: Debouncer::new(),
            delay,
        }
    }

    pub fn state(&self) -> R::State {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.shared.tx.subscribe()
    }

    /// Apply an action. Returns whether the state changed.
    pub fn dispatch(&self, action: R::Action) -> bool {
        let is_edit = R::is_edit(&action);
        let changed = self.shared.apply(action);

        if changed && is_edit {
            self.shared.revision.fetch_add(1, Ordering::SeqCst);
            let shared = Arc::clone(&self.shared);
            self.debouncer.schedule(self.delay, async move {
                // Failures are recorded in the save status
                let _ = shared.persist().await;
            });
        }
        changed
    }

    /// Skip the quiet window and save right away
    pub async fn save_now(&self) -> Result<()> {
        if self.debouncer.cancel_pending() {
            debug!("Flushing pending save");
        }
        self.shared.persist().await
    }

    pub fn has_pending_save(&self) -> bool {
        self.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::fixtures;
    use crate::types::BookError;

    /// Records every saved draft; fails while `fail` is set
    struct RecordingStore<T> {
        saved: Mutex<Vec<T>>,
        fail: Mutex<bool>,
    }

    impl<T> Default for RecordingStore<T> {
        fn default() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync> DraftStore<T> for RecordingStore<T> {
        async fn save(&self, draft: &T) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(BookError::Transport("offline".into()));
            }
            self.saved.lock().unwrap().push(draft.clone());
            Ok(())
        }
    }

    fn chapter_editor(store: Arc<RecordingStore<ChapterEditorState>>) -> ChapterEditor {
        let initial = ChapterEditorState::new(fixtures::chapter("ch-1", "book-1", 0, "<p>start</p>"));
        ChapterEditor::new(initial, store, Duration::from_millis(2000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_save() {
        let store = Arc::new(RecordingStore::default());
        let editor = chapter_editor(store.clone());

        for text in ["<p>a</p>", "<p>a b</p>", "<p>a b c</p>"] {
            editor.dispatch(ChapterAction::UpdateContent(text.into()));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(store.saved.lock().unwrap().is_empty());
        assert!(editor.has_pending_save());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].chapter.content, "<p>a b c</p>");

        let state = editor.state();
        assert_eq!(state.save.status, SaveState::Saved);
        assert!(state.save.last_saved_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_edit_schedules_nothing() {
        let store = Arc::new(RecordingStore::default());
        let editor = chapter_editor(store.clone());

        assert!(!editor.dispatch(ChapterAction::UpdateTitle("   ".into())));
        assert!(!editor.has_pending_save());
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_local_state() {
        let store = Arc::new(RecordingStore::default());
        *store.fail.lock().unwrap() = true;
        let editor = chapter_editor(store.clone());

        editor.dispatch(ChapterAction::UpdateContent("<p>unsaved words</p>".into()));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let state = editor.state();
        assert_eq!(state.save.status, SaveState::Error);
        assert_eq!(state.save.last_error.as_deref(), Some("Transport error: offline"));
        assert_eq!(state.chapter.content, "<p>unsaved words</p>");
    }

    /// Slow for drafts containing "old", quick otherwise
    #[derive(Default)]
    struct LatencyStore {
        saved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DraftStore<ChapterEditorState> for LatencyStore {
        async fn save(&self, draft: &ChapterEditorState) -> Result<()> {
            let latency = if draft.chapter.content.contains("old") { 3000 } else { 100 };
            tokio::time::sleep(Duration::from_millis(latency)).await;
            self.saved.lock().unwrap().push(draft.chapter.content.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_save_never_overwrites_newer_draft() {
        let store = Arc::new(LatencyStore::default());
        let initial = ChapterEditorState::new(fixtures::chapter("ch-1", "book-1", 0, ""));
        let editor = ChapterEditor::new(initial, store.clone(), Duration::from_millis(500));

        editor.dispatch(ChapterAction::UpdateContent("<p>old</p>".into()));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(editor.state().save.status, SaveState::Saving);

        editor.dispatch(ChapterAction::UpdateContent("<p>new</p>".into()));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        // The older save is still running; it must not report success
        assert_ne!(editor.state().save.status, SaveState::Saved);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved, vec!["<p>old</p>".to_string(), "<p>new</p>".to_string()]);

        let state = editor.state();
        assert_eq!(state.chapter.content, "<p>new</p>");
        assert_eq!(state.save.status, SaveState::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_edit_then_saved() {
        let store = Arc::new(RecordingStore::default());
        let editor = chapter_editor(store);
        let mut rx = editor.subscribe();

        editor.dispatch(ChapterAction::UpdateContent("<p>crumb and crust</p>".into()));
        assert!(rx.has_changed().unwrap());
        {
            let seen = rx.borrow_and_update();
            assert_eq!(seen.chapter.word_count, 3);
            assert_eq!(seen.save.status, SaveState::Idle);
        }

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().save.status, SaveState::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_cancels_pending_timer() {
        let store: Arc<RecordingStore<OutlineEditorState>> = Arc::new(RecordingStore::default());
        let initial = OutlineEditorState::new(crate::types::Outline {
            id: "outline-1".into(),
            book_id: "book-1".into(),
            title: "Draft".into(),
            sections: vec![],
        });
        let editor = OutlineEditor::new(initial, store.clone(), Duration::from_millis(500));

        editor.dispatch(OutlineAction::UpdateTitle("Sourdough at Home".into()));
        editor.save_now().await.unwrap();
        assert!(!editor.has_pending_save());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].outline.title, "Sourdough at Home");
        assert_eq!(editor.state().save.status, SaveState::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outline_editor_persists_to_database() {
        let db = Arc::new(fixtures::seeded());
        let user = crate::types::UserId::new(fixtures::OWNER);
        let (outline, _) = db.load_outline(&user, "outline-1").unwrap();
        let editor = OutlineEditor::new(
            OutlineEditorState::new(outline),
            db.clone(),
            Duration::from_millis(500),
        );

        editor.dispatch(OutlineAction::Reorder { from: 1, to: 0 });
        tokio::time::sleep(Duration::from_millis(600)).await;

        let (stored, _) = db.load_outline(&user, "outline-1").unwrap();
        assert_eq!(stored.sections[0].title, "Shaping");
        assert_eq!(stored.sections[0].order_index, 0);
    }
}
