pub mod book;
pub mod conversation;
pub mod error;
pub mod outline;
pub mod qa;
pub mod utils;

pub use book::*;
pub use conversation::*;
pub use error::{
    BookError, CONTENT_CHANGED, ErrorCategory, ErrorClassifier, LlmError, Result, ResultExt,
};
pub use outline::*;
pub use qa::*;
pub use utils::{count_words, log_filter_error, strip_html};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for the authenticated caller's id
///
/// Resolved by the authentication layer in front of the core; the core only
/// compares it against entity owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
