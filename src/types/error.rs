//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Taxonomy
//!
//! - **Validation**: malformed request, rejected before any AI call
//! - **Unauthorized / NotFound**: caller is unknown or does not own the entity
//! - **Upstream**: LLM call failed or returned output that does not match the schema
//! - **Conflict**: persisted content changed since an analysis was computed
//! - **Transport / Cancelled**: network drop vs. deliberate abort (abort is not an error)

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for upstream LLM failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Context/token limit exceeded
    TokenLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues
    Network,
    /// Provider unavailable
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Parsing LLM response failed
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Transient errors are shown inline with a retry affordance
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::Unavailable
        )
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM error with category and provider context
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps provider responses onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify HTTP status code from an upstream provider
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 => ErrorCategory::BadRequest,
            413 => ErrorCategory::TokenLimit,
            500 | 502 | 503 | 504 => ErrorCategory::Transient,
            404 => ErrorCategory::Unavailable,
            _ => ErrorCategory::Unknown,
        };
        LlmError::with_provider(category, message, provider)
    }

    /// Classify a reqwest transport failure
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> LlmError {
        let category = if err.is_timeout() || err.is_connect() {
            ErrorCategory::Network
        } else if err.is_decode() {
            ErrorCategory::ParseError
        } else {
            ErrorCategory::Unknown
        };
        LlmError::with_provider(category, err.to_string(), provider)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum BookError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Request Errors (terminal, returned synchronously)
    // -------------------------------------------------------------------------
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Persisted content changed since the analysis was computed
    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    // -------------------------------------------------------------------------
    // Upstream Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Structured LLM output did not match the expected schema
    #[error("Schema mismatch in {context}: {message}")]
    SchemaMismatch { context: String, message: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    /// Network-level failure talking to the API (not an abort)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request returned a non-success status
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },

    /// Operation was deliberately cancelled
    #[error("Operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Infrastructure Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<LlmError> for BookError {
    fn from(err: LlmError) -> Self {
        BookError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, BookError>;

/// Conflict code for a QA fix whose target text can no longer be located
pub const CONTENT_CHANGED: &str = "CONTENT_CHANGED";

// =============================================================================
// Helper Functions
// =============================================================================

impl BookError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn schema_mismatch(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn content_changed(message: impl Into<String>) -> Self {
        Self::Conflict {
            code: CONTENT_CHANGED.to_string(),
            message: message.into(),
        }
    }

    pub fn llm(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(category, message))
    }

    /// Deliberate aborts are never surfaced to the user
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the error is transient and worth offering a retry for
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status the server answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Llm(_) | Self::SchemaMismatch { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Http { status, .. } => *status,
            _ => 500,
        }
    }

    /// Machine-readable code attached to error bodies, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Conflict { code, .. } => Some(code),
            Self::Validation(_) => Some("VALIDATION"),
            Self::Unauthorized => Some("UNAUTHORIZED"),
            Self::NotFound { .. } => Some("NOT_FOUND"),
            Self::SchemaMismatch { .. } => Some("SCHEMA_MISMATCH"),
            _ => None,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| BookError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| BookError::Storage(format!("{}: {}", f().into(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::ParseError.to_string(), "PARSE_ERROR");
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);
        assert!(rate_limit.is_retryable());

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);
        assert!(!auth.is_retryable());

        let server_error = ErrorClassifier::classify_http_status(503, "Overloaded", "test");
        assert_eq!(server_error.category, ErrorCategory::Transient);
    }

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(BookError::validation("empty message").status_code(), 400);
        assert_eq!(BookError::Unauthorized.status_code(), 401);
        assert_eq!(BookError::not_found("book", "b1").status_code(), 404);
        assert_eq!(BookError::content_changed("gone").status_code(), 409);
        assert_eq!(
            BookError::schema_mismatch("qa", "missing field").status_code(),
            502
        );
    }

    #[test]
    fn test_conflict_code() {
        let err = BookError::content_changed("text missing");
        assert_eq!(err.code(), Some(CONTENT_CHANGED));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_cancellation_is_distinct_from_transport() {
        assert!(BookError::Cancelled.is_cancellation());
        assert!(!BookError::Transport("reset".into()).is_cancellation());
        assert!(BookError::Transport("reset".into()).is_recoverable());
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }
}
