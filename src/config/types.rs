//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/bookforge/) and project (.bookforge/) level configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::{ProviderConfig, TimeoutConfig};
use crate::analysis::QaSettings;
use crate::constants::{analysis, editor, network, storage, wizard};
use crate::types::{BookError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: ProviderConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Client-side editor timing
    pub editor: EditorConfig,

    /// Analysis orchestration settings
    pub analysis: AnalysisConfig,

    /// Interview wizard settings
    pub wizard: WizardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: ProviderConfig::default(),
            server: ServerConfig::default(),
            editor: EditorConfig::default(),
            analysis: AnalysisConfig::default(),
            wizard: WizardConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `BookError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(BookError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(BookError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(BookError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &self.llm.api_base {
            url::Url::parse(base)
                .map_err(|e| BookError::Config(format!("Invalid llm.api_base '{}': {}", base, e)))?;
        }

        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| BookError::Config(format!("Invalid server.bind '{}': {}", self.server.bind, e)))?;

        if self.editor.outline_debounce_ms == 0
            || self.editor.chapter_debounce_ms == 0
            || self.editor.stream_throttle_ms == 0
        {
            return Err(BookError::Config(
                "Editor debounce and throttle intervals must be greater than 0".to_string(),
            ));
        }

        if self.analysis.outline_debounce_secs == 0 {
            return Err(BookError::Config(
                "analysis.outline_debounce_secs must be greater than 0".to_string(),
            ));
        }

        if self.analysis.max_chapter_concurrency == 0 {
            return Err(BookError::Config(
                "analysis.max_chapter_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.wizard.total_questions == 0 {
            return Err(BookError::Config(
                "wizard.total_questions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::from_request_secs(self.llm.timeout_secs)
    }

    /// QA orchestrator settings derived from the analysis and llm sections
    pub fn qa_settings(&self) -> QaSettings {
        let timeouts = self.timeouts();
        QaSettings {
            max_concurrency: self.analysis.max_chapter_concurrency,
            max_suggestions: self.analysis.max_suggestions,
            consistency_min_chapters: self.analysis.consistency_min_chapters,
            request_timeout: timeouts.llm_request,
            run_timeout: timeouts.analysis_run,
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// SQLite database file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: network::DEFAULT_BIND.to_string(),
            database_path: None,
        }
    }
}

impl ServerConfig {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", "bookforge")
                .map(|dirs| dirs.data_dir().join(storage::DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(".bookforge").join(storage::DATABASE_FILE))
        })
    }
}

// =============================================================================
// Editor Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub outline_debounce_ms: u64,
    pub chapter_debounce_ms: u64,
    /// Minimum interval between streamed UI updates
    pub stream_throttle_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            outline_debounce_ms: editor::OUTLINE_DEBOUNCE_MS,
            chapter_debounce_ms: editor::CHAPTER_DEBOUNCE_MS,
            stream_throttle_ms: editor::STREAM_THROTTLE_MS,
        }
    }
}

impl EditorConfig {
    pub fn outline_debounce(&self) -> Duration {
        Duration::from_millis(self.outline_debounce_ms)
    }

    pub fn chapter_debounce(&self) -> Duration {
        Duration::from_millis(self.chapter_debounce_ms)
    }

    pub fn stream_throttle(&self) -> Duration {
        Duration::from_millis(self.stream_throttle_ms)
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Quiet period before outline re-analysis
    pub outline_debounce_secs: u64,

    /// Chapters scored concurrently
    pub max_chapter_concurrency: usize,

    /// Suggestions kept per chapter
    pub max_suggestions: usize,

    /// Scored chapters required for the cross-chapter consistency pass
    pub consistency_min_chapters: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outline_debounce_secs: analysis::OUTLINE_DEBOUNCE_SECS,
            max_chapter_concurrency: analysis::MAX_CHAPTER_CONCURRENCY,
            max_suggestions: analysis::MAX_SUGGESTIONS,
            consistency_min_chapters: analysis::CONSISTENCY_MIN_CHAPTERS,
        }
    }
}

impl AnalysisConfig {
    pub fn outline_debounce(&self) -> Duration {
        Duration::from_secs(self.outline_debounce_secs)
    }
}

// =============================================================================
// Wizard Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Nominal interview length shown to the author
    pub total_questions: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            total_questions: wizard::TOTAL_QUESTIONS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
