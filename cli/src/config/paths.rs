//! Filesystem locations used by git-auth.

use std::path::{Path, PathBuf};

use crate::error::{GitAuthError, Result};

/// Name of the directory under `$HOME` holding config and tokens.
const CONFIG_DIR_NAME: &str = ".git-auth";

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| GitAuthError::Config("Cannot determine home directory".to_string()))
}

/// Get the configuration directory for git-auth (`~/.git-auth`).
pub fn config_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(CONFIG_DIR_NAME))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory holding `tokens.json`. Shares the config directory.
pub fn token_dir() -> Result<PathBuf> {
    config_dir()
}

/// Default directory for generated key pairs.
pub fn default_ssh_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".ssh"))
}

/// The user's OpenSSH client config.
pub fn ssh_config_file() -> Result<PathBuf> {
    Ok(default_ssh_dir()?.join("config"))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_leaves_absolute_paths_alone() {
        let path = Path::new("/var/keys");
        assert_eq!(expand_tilde(path).unwrap(), PathBuf::from("/var/keys"));
    }

    #[test]
    fn expand_tilde_resolves_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde(Path::new("~/.ssh")).unwrap(), home.join(".ssh"));
    }

    #[test]
    fn token_dir_is_config_dir() {
        if dirs::home_dir().is_none() {
            return;
        }
        assert_eq!(token_dir().unwrap(), config_dir().unwrap());
        assert!(config_file().unwrap().ends_with(".git-auth/config.toml"));
    }
}
