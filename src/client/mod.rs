//! Client-side state synchronization.
//!
//! Everything here runs against the HTTP API through a [`Transport`]: the
//! generation controllers consume event streams, the editors persist drafts
//! behind debounce windows, and the analysis controllers keep reports fresh.

pub mod analysis;
pub mod editor;
pub mod generation;
pub mod timer;
pub mod transport;

pub use analysis::{FixOutcome, OutlineAnalysisController, OutlineAnalysisState, QaClient};
pub use editor::{
    ChapterAction, ChapterEditor, ChapterEditorState, DebouncedEditor, DraftStore, OutlineAction,
    OutlineEditor, OutlineEditorState, SaveState,
};
pub use generation::{
    ChapterController, ChatController, GenerationController, GenerationState, GenerationStatus,
};
pub use timer::{Debouncer, Throttle};
pub use transport::{HttpTransport, SharedTransport, Transport};
