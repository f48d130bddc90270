//! Global Constants
//!
//! Centralized constants for configuration defaults and tuning.
//! Config values override most of these at runtime.

/// Interview constants
pub mod wizard {
    /// Planned number of interview questions shown to the author
    pub const TOTAL_QUESTIONS: usize = 12;
}

/// Editor persistence and rendering constants
pub mod editor {
    /// Trailing debounce before an outline edit is saved (milliseconds)
    pub const OUTLINE_DEBOUNCE_MS: u64 = 500;

    /// Trailing debounce before a chapter edit is saved (milliseconds)
    pub const CHAPTER_DEBOUNCE_MS: u64 = 2000;

    /// Minimum interval between visible updates of streamed text (milliseconds)
    pub const STREAM_THROTTLE_MS: u64 = 100;
}

/// Analysis orchestration constants
pub mod analysis {
    /// Quiet period before automatic outline re-analysis (seconds)
    pub const OUTLINE_DEBOUNCE_SECS: u64 = 3;

    /// Per-chapter QA passes running at once
    pub const MAX_CHAPTER_CONCURRENCY: usize = 4;

    /// Suggestions kept from each QA pass
    pub const MAX_SUGGESTIONS: usize = 10;

    /// Scored chapters required before the consistency pass runs
    pub const CONSISTENCY_MIN_CHAPTERS: usize = 2;

    /// Bounds of the cross-chapter consistency adjustment
    pub const MIN_CONSISTENCY_ADJUSTMENT: i32 = -20;
    pub const MAX_CONSISTENCY_ADJUSTMENT: i32 = 0;

    /// Characters of chapter text included in a consistency summary
    pub const SUMMARY_EXCERPT_CHARS: usize = 600;

    /// Characters of chapter text sent to one QA pass
    pub const MAX_REVIEW_CHARS: usize = 60_000;
}

/// HTTP/Network constants
pub mod network {
    /// Default upstream LLM request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// A whole analysis run may take this many request timeouts
    pub const ANALYSIS_RUN_MULTIPLIER: u32 = 3;

    /// Default bind address for `serve`
    pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

    /// Header set by the upstream auth gateway
    pub const USER_ID_HEADER: &str = "x-user-id";
}

/// Storage constants
pub mod storage {
    /// Default database file name inside the data directory
    pub const DATABASE_FILE: &str = "bookforge.db";
}
