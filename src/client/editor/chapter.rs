//! Chapter editor state.

use async_trait::async_trait;

use super::reducer::{Reducer, SaveEvent, SaveTracker, non_blank};
use super::{DebouncedEditor, DraftStore};
use crate::storage::Database;
use crate::types::{Chapter, Result, count_words};

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterEditorState {
    pub chapter: Chapter,
    pub save: SaveTracker,
}

impl ChapterEditorState {
    pub fn new(chapter: Chapter) -> Self {
        Self {
            chapter,
            save: SaveTracker::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterAction {
    UpdateTitle(String),
    /// Replace the HTML body; an empty body is allowed
    UpdateContent(String),
    SetSaveStatus(SaveEvent),
}

pub struct ChapterReducer;

impl Reducer for ChapterReducer {
    type State = ChapterEditorState;
    type Action = ChapterAction;

    fn reduce(mut state: ChapterEditorState, action: ChapterAction) -> ChapterEditorState {
        match action {
            ChapterAction::UpdateTitle(title) => {
                if let Some(title) = non_blank(&title) {
                    state.chapter.title = title;
                }
            }
            ChapterAction::UpdateContent(content) => {
                state.chapter.word_count = count_words(&content);
                state.chapter.content = content;
            }
            ChapterAction::SetSaveStatus(event) => {
                state.save = state.save.apply(event);
            }
        }
        state
    }

    fn is_edit(action: &ChapterAction) -> bool {
        !matches!(action, ChapterAction::SetSaveStatus(_))
    }

    fn save_event(event: SaveEvent) -> ChapterAction {
        ChapterAction::SetSaveStatus(event)
    }
}

pub type ChapterEditor = DebouncedEditor<ChapterReducer>;

#[async_trait]
impl DraftStore<ChapterEditorState> for Database {
    async fn save(&self, draft: &ChapterEditorState) -> Result<()> {
        let chapter = &draft.chapter;
        self.update_chapter_content(
            &chapter.id,
            Some(&chapter.title),
            &chapter.content,
            chapter.word_count,
        )
    }
}
