//! Application configuration settings.
//!
//! The config file carries global defaults at the top level and one table
//! per profile. Profile tables may override any of the `ssh-*` defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::paths::{default_ssh_dir, expand_tilde};
use crate::error::{GitAuthError, Result};

/// Default title prefix for keys created by git-auth.
pub const DEFAULT_SSH_PREFIX: &str = "gl_auth";

/// Default SSH port written into generated config blocks.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Main configuration for git-auth, as read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitAuthConfig {
    /// Profile used when none is given on the command line.
    pub profile: String,
    /// Default directory for key pairs.
    pub ssh_path: Option<PathBuf>,
    /// Default key title prefix.
    pub ssh_prefix: String,
    /// Default SSH port.
    pub ssh_port: u16,
    /// Default SSH host alias. Falls back to the profile URL host.
    pub ssh_host: Option<String>,
    /// Profile tables keyed by name.
    #[serde(flatten)]
    pub profiles: BTreeMap<String, ProfileSettings>,
}

impl Default for GitAuthConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            ssh_path: None,
            ssh_prefix: DEFAULT_SSH_PREFIX.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_host: None,
            profiles: BTreeMap::new(),
        }
    }
}

/// Settings for a single GitLab account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileSettings {
    /// GitLab instance base URL.
    pub url: Option<String>,
    /// OAuth application ID registered on the instance.
    pub client_id: Option<String>,
    /// Requested OAuth scopes.
    #[serde(default)]
    pub scope: Vec<String>,
    pub ssh_path: Option<PathBuf>,
    pub ssh_prefix: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_host: Option<String>,
    /// Lifetime of uploaded keys. Keys never expire when unset.
    pub ssh_key_ttl_hours: Option<u64>,
}

/// A fully resolved profile with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub url: Url,
    pub client_id: String,
    pub scope: Vec<String>,
    pub ssh_path: PathBuf,
    pub ssh_prefix: String,
    pub ssh_port: u16,
    pub ssh_host: String,
    pub ssh_key_ttl_hours: Option<u64>,
}

/// Environment variables that can override configuration.
pub mod env {
    pub const PROFILE: &str = "GIT_AUTH_PROFILE";
    pub const LOG_LEVEL: &str = "GIT_AUTH_LOG";
}

impl GitAuthConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(profile) = std::env::var(env::PROFILE) {
            if !profile.is_empty() {
                self.profile = profile;
            }
        }
        self
    }

    /// Resolve a profile by name, or the configured default when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::Config`] if the profile does not exist or lacks
    /// a `url` or `client-id`.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<Profile> {
        let name = name.unwrap_or(&self.profile);
        if name.is_empty() {
            return Err(GitAuthError::Config(
                "profile not specified in the configuration".to_string(),
            ));
        }

        let settings = self
            .profiles
            .get(name)
            .ok_or_else(|| GitAuthError::Config(format!("No profile named '{name}'")))?;

        let raw_url = settings
            .url
            .as_deref()
            .ok_or_else(|| GitAuthError::Config(format!("Profile '{name}' has no url")))?;
        let url = Url::parse(raw_url)
            .map_err(|e| GitAuthError::Config(format!("Profile '{name}' has an invalid url: {e}")))?;

        let client_id = settings
            .client_id
            .clone()
            .ok_or_else(|| GitAuthError::Config(format!("Profile '{name}' has no client-id")))?;

        let ssh_path = match settings.ssh_path.as_ref().or(self.ssh_path.as_ref()) {
            Some(path) => expand_tilde(path)?,
            None => default_ssh_dir()?,
        };

        let ssh_host = settings
            .ssh_host
            .clone()
            .or_else(|| self.ssh_host.clone())
            .or_else(|| url.host_str().map(str::to_string))
            .ok_or_else(|| GitAuthError::Config(format!("Profile '{name}' has no ssh-host")))?;

        Ok(Profile {
            name: name.to_string(),
            client_id,
            scope: settings.scope.clone(),
            ssh_path,
            ssh_prefix: settings
                .ssh_prefix
                .clone()
                .unwrap_or_else(|| self.ssh_prefix.clone()),
            ssh_port: settings.ssh_port.unwrap_or(self.ssh_port),
            ssh_host,
            ssh_key_ttl_hours: settings.ssh_key_ttl_hours,
            url,
        })
    }
}
