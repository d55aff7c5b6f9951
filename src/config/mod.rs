// Configuration management module
// Loads, validates and persists the TOML configuration

pub mod settings;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use settings::{
    Config, ConfigError, LlmConfig, LlmProvider, OllamaConfig, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    Config::config_dir()
}

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn resolve_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    override_dir.map_or_else(get_config_dir, |dir| Ok(dir.to_path_buf()))
}

/// Load `<config_dir>/.env` into the process environment
///
/// Variables that are already set (including those from the working
/// directory's `.env`) are never overridden.
#[inline]
pub fn load_config_env(config_dir: &Path) -> Option<PathBuf> {
    let path = config_dir.join(".env");
    if !path.is_file() {
        return None;
    }

    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

/// Render the configuration as it would be written to disk
#[inline]
pub fn render_config(config: &Config) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// Print the current configuration to stdout
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration file: {}", config.config_file_path().display());
    println!("Vector index: {}", config.vector_database_path().display());
    println!();
    print!("{}", render_config(config)?);
    Ok(())
}
