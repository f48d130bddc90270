//! CLI Common Utilities
//!
//! Shared loading of configuration and the database for command handlers.

use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SharedDatabase};
use crate::types::Result;

/// Command execution context
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub db: SharedDatabase,
}

impl CommandContext {
    /// Load the merged config and open the configured database
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let db = open_database(&config)?;
        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }
}

/// Open the database at the configured path, creating it if needed
pub fn open_database(config: &Config) -> Result<Database> {
    let path = config.server.resolved_database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open(&path)?;
    db.initialize()?;
    Ok(db)
}
