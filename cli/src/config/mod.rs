//! Configuration management for git-auth.

pub mod paths;
pub mod settings;

pub use paths::config_file;
pub use settings::{GitAuthConfig, Profile};

use std::path::Path;

use crate::error::{GitAuthError, Result};

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<GitAuthConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<GitAuthConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "configuration file not found, using defaults");
        return Ok(GitAuthConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: GitAuthConfig =
        toml::from_str(&contents).map_err(|e| GitAuthError::ConfigRead(e.to_string()))?;

    Ok(config.with_env_overrides())
}
