//! Config Command
//!
//! Manage BookForge configuration.
//!
//! Usage:
//!   bookforge config show [-f json]
//!   bookforge config path
//!   bookforge config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    ConfigLoader::show_config(format == "json")
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write a starter config file
pub fn init(global: bool, force: bool) -> Result<()> {
    let (scope, path) = if global {
        ("global", ConfigLoader::init_global(force)?)
    } else {
        ("project", ConfigLoader::init_project(force)?)
    };

    let output = Output::new();
    output.success(&format!("Initialized {} configuration", scope));
    println!("  Config: {}", path.display());
    Ok(())
}
