//! Outline editor state.
//!
//! Sections always carry contiguous order indices starting at zero, and at
//! least one section always exists.

use async_trait::async_trait;

use super::reducer::{Reducer, SaveEvent, SaveTracker, non_blank};
use super::{DebouncedEditor, DraftStore};
use crate::storage::Database;
use crate::types::{Outline, OutlineSection, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEditorState {
    pub outline: Outline,
    pub save: SaveTracker,
}

impl OutlineEditorState {
    pub fn new(outline: Outline) -> Self {
        let mut state = Self {
            outline,
            save: SaveTracker::default(),
        };
        if state.outline.sections.is_empty() {
            state.outline.sections.push(OutlineSection::new("Introduction", 0));
        }
        reindex(&mut state.outline.sections);
        state
    }

    pub fn section_count(&self) -> usize {
        self.outline.sections.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutlineAction {
    UpdateTitle(String),
    AddSection { title: String, description: String },
    RemoveSection { id: String },
    UpdateSection {
        id: String,
        title: Option<String>,
        description: Option<String>,
    },
    /// Move the section at `from` so it ends up at `to`
    Reorder { from: usize, to: usize },
    SetSaveStatus(SaveEvent),
}

fn reindex(sections: &mut [OutlineSection]) {
    for (i, section) in sections.iter_mut().enumerate() {
        section.order_index = i;
    }
}

pub struct OutlineReducer;

impl Reducer for OutlineReducer {
    type State = OutlineEditorState;
    type Action = OutlineAction;

    fn reduce(mut state: OutlineEditorState, action: OutlineAction) -> OutlineEditorState {
        let sections = &mut state.outline.sections;
        match action {
            OutlineAction::UpdateTitle(title) => {
                if let Some(title) = non_blank(&title) {
                    state.outline.title = title;
                }
            }
            OutlineAction::AddSection { title, description } => {
                if let Some(title) = non_blank(&title) {
                    let mut section = OutlineSection::new(title, sections.len());
                    section.description = description.trim().to_string();
                    sections.push(section);
                }
            }
            OutlineAction::RemoveSection { id } => {
                if sections.len() > 1
                    && let Some(pos) = sections.iter().position(|s| s.id == id)
                {
                    sections.remove(pos);
                    reindex(sections);
                }
            }
            OutlineAction::UpdateSection {
                id,
                title,
                description,
            } => {
                if let Some(section) = sections.iter_mut().find(|s| s.id == id) {
                    match title.as_deref().map(non_blank) {
                        // A blank title rejects the whole update
                        Some(None) => return state,
                        Some(Some(title)) => section.title = title,
                        None => {}
                    }
                    if let Some(description) = description {
                        section.description = description.trim().to_string();
                    }
                }
            }
            OutlineAction::Reorder { from, to } => {
                if from < sections.len() && to < sections.len() && from != to {
                    let section = sections.remove(from);
                    sections.insert(to, section);
                    reindex(sections);
                }
            }
            OutlineAction::SetSaveStatus(event) => {
                state.save = state.save.apply(event);
            }
        }
        state
    }

    fn is_edit(action: &OutlineAction) -> bool {
        !matches!(action, OutlineAction::SetSaveStatus(_))
    }

    fn save_event(event: SaveEvent) -> OutlineAction {
        OutlineAction::SetSaveStatus(event)
    }
}

pub type OutlineEditor = DebouncedEditor<OutlineReducer>;

#[async_trait]
impl DraftStore<OutlineEditorState> for Database {
    async fn save(&self, draft: &OutlineEditorState) -> Result<()> {
        self.save_outline(&draft.outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(n: usize) -> OutlineEditorState {
        OutlineEditorState::new(Outline {
            id: "outline-1".into(),
            book_id: "book-1".into(),
            title: "Sourdough".into(),
            sections: (0..n)
                .map(|i| OutlineSection::new(format!("Section {}", i), i))
                .collect(),
        })
    }

    fn titles(state: &OutlineEditorState) -> Vec<&str> {
        state.outline.sections.iter().map(|s| s.title.as_str()).collect()
    }

    fn assert_contiguous(state: &OutlineEditorState) {
        let indices: Vec<_> = state.outline.sections.iter().map(|s| s.order_index).collect();
        assert_eq!(indices, (0..state.section_count()).collect::<Vec<_>>());
    }

    #[test]
    fn test_reorder_moves_and_reindexes() {
        let next = OutlineReducer::reduce(state(3), OutlineAction::Reorder { from: 0, to: 2 });
        assert_eq!(titles(&next), vec!["Section 1", "Section 2", "Section 0"]);
        assert_contiguous(&next);
    }

    #[test]
    fn test_out_of_range_reorder_is_noop() {
        let before = state(2);
        let after = OutlineReducer::reduce(before.clone(), OutlineAction::Reorder { from: 0, to: 5 });
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_last_section_is_noop() {
        let before = state(1);
        let id = before.outline.sections[0].id.clone();
        let after = OutlineReducer::reduce(before.clone(), OutlineAction::RemoveSection { id });
        assert_eq!(after.section_count(), 1);
        assert_eq!(before, after);
    }

    #[test]
    fn test_blank_titles_rejected() {
        let before = state(2);
        let id = before.outline.sections[0].id.clone();

        let after = OutlineReducer::reduce(before.clone(), OutlineAction::UpdateTitle("   ".into()));
        assert_eq!(before, after);

        let after = OutlineReducer::reduce(
            before.clone(),
            OutlineAction::UpdateSection {
                id,
                title: Some("\n".into()),
                description: Some("ignored too".into()),
            },
        );
        assert_eq!(before, after);

        let after = OutlineReducer::reduce(
            before.clone(),
            OutlineAction::AddSection {
                title: " ".into(),
                description: String::new(),
            },
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_updates_are_trimmed() {
        let before = state(1);
        let id = before.outline.sections[0].id.clone();
        let after = OutlineReducer::reduce(
            before,
            OutlineAction::UpdateSection {
                id,
                title: Some("  Starters ".into()),
                description: Some(" Feeding ".into()),
            },
        );
        assert_eq!(after.outline.sections[0].title, "Starters");
        assert_eq!(after.outline.sections[0].description, "Feeding");
    }

    #[test]
    fn test_empty_outline_gets_one_section() {
        assert_eq!(state(0).section_count(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reorder(usize, usize),
        Remove(usize),
        Add,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Reorder(a, b)),
            (0usize..8).prop_map(Op::Remove),
            Just(Op::Add),
        ]
    }

    proptest! {
        #[test]
        fn prop_order_indices_stay_contiguous(n in 1usize..6, ops in prop::collection::vec(op(), 0..30)) {
            let mut current = state(n);
            for op in ops {
                let action = match op {
                    Op::Reorder(from, to) => OutlineAction::Reorder { from, to },
                    Op::Remove(i) => {
                        let id = current
                            .outline
                            .sections
                            .get(i % current.section_count())
                            .map(|s| s.id.clone())
                            .unwrap_or_default();
                        OutlineAction::RemoveSection { id }
                    }
                    Op::Add => OutlineAction::AddSection {
                        title: "New".into(),
                        description: String::new(),
                    },
                };
                current = OutlineReducer::reduce(current, action);

                prop_assert!(current.section_count() >= 1);
                let indices: Vec<_> = current.outline.sections.iter().map(|s| s.order_index).collect();
                prop_assert_eq!(indices, (0..current.section_count()).collect::<Vec<_>>());
            }
        }
    }
}
