//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/bookforge/config.toml)
//! 3. Project config (.bookforge/config.toml)
//! 4. Environment variables (BOOKFORGE_* prefix, `__` between nested keys)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{BookError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_layers(Self::global_config_path(), &Self::project_config_path())
    }

    fn load_layers(global: Option<PathBuf>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // BOOKFORGE_LLM__TIMEOUT_SECS -> llm.timeout_secs
        figment = figment.merge(Env::prefixed("BOOKFORGE_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| BookError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| BookError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/bookforge/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config")))
            .map(|p| p.join("bookforge"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".bookforge")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:   {} {}", exists, global.display());
        } else {
            println!("  Global:   (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project:  {} {}", exists, project.display());

        if let Ok(config) = Self::load() {
            let db = config.server.resolved_database_path();
            let exists = if db.exists() { "✓" } else { "✗" };
            println!("  Database: {} {}", exists, db.display());
        }
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;
        println!("{}", Self::render(&config, as_json)?);
        Ok(())
    }

    fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| BookError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            BookError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_config(&global_dir, force, Self::default_global_config())
    }

    /// Initialize project configuration
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_config(&Self::project_dir(), force, Self::default_project_config())
    }

    fn write_config(dir: &Path, force: bool, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, content)?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> &'static str {
        r#"# BookForge Global Configuration
# User-wide defaults. Project settings in .bookforge/config.toml override these.

version = "1.0"

# LLM settings. The API key is read from OPENAI_API_KEY or BOOKFORGE_LLM__API_KEY.
[llm]
provider = "openai"
model = "gpt-4o"
timeout_secs = 300
temperature = 0.7
max_tokens = 4096

[wizard]
total_questions = 12
"#
    }

    fn default_project_config() -> &'static str {
        r#"# BookForge Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[server]
bind = "127.0.0.1:8787"
database_path = ".bookforge/bookforge.db"

[editor]
outline_debounce_ms = 500
chapter_debounce_ms = 2000
stream_throttle_ms = 100

[analysis]
outline_debounce_secs = 3
max_chapter_concurrency = 4
max_suggestions = 10
consistency_min_chapters = 2
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_configs_parse() {
        let temp_dir = TempDir::new().unwrap();

        let global = ConfigLoader::write_config(
            &temp_dir.path().join("global"),
            false,
            ConfigLoader::default_global_config(),
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&global).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o"));

        let project = ConfigLoader::write_config(
            &temp_dir.path().join("project"),
            false,
            ConfigLoader::default_project_config(),
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&project).unwrap();
        assert_eq!(
            config.server.database_path,
            Some(PathBuf::from(".bookforge/bookforge.db"))
        );
    }

    #[test]
    fn test_project_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(&global, "[llm]\nmodel = \"global-model\"\ntemperature = 0.2\n").unwrap();
        fs::write(&project, "[llm]\nmodel = \"project-model\"\n").unwrap();

        let config = ConfigLoader::load_layers(Some(global), &project).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("project-model"));
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.timeout_secs, 300);
    }

    #[test]
    fn test_write_config_respects_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::write_config(temp_dir.path(), false, "version = \"1.0\"\n").unwrap();
        ConfigLoader::write_config(temp_dir.path(), false, "version = \"2.0\"\n").unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("1.0"));

        ConfigLoader::write_config(temp_dir.path(), true, "version = \"2.0\"\n").unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("2.0"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[llm]\ntemperature = 9.0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(BookError::Config(_))
        ));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: no other test reads this variable
        unsafe {
            std::env::set_var("BOOKFORGE_WIZARD__TOTAL_QUESTIONS", "20");
        }
        let temp_dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_layers(None, &temp_dir.path().join("missing.toml")).unwrap();
        unsafe {
            std::env::remove_var("BOOKFORGE_WIZARD__TOTAL_QUESTIONS");
        }
        assert_eq!(config.wizard.total_questions, 20);
    }

    #[test]
    fn test_render_toml_and_json() {
        let config = Config::default();
        assert!(ConfigLoader::render(&config, false).unwrap().contains("[llm]"));
        assert!(ConfigLoader::render(&config, true).unwrap().contains("\"llm\""));
    }
}
