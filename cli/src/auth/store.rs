//! File-backed credential storage.
//!
//! This module provides persistence for per-profile tokens:
//! - [`CredentialStore`] - Trait for credential storage operations
//! - [`FileTokenStore`] - JSON file implementation (`tokens.json`)
//!
//! The file holds an ordered list of records and is rewritten in full on
//! every mutation. There is no locking; two processes mutating the same
//! store concurrently can lose an update.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;

use crate::auth::tokens::CredentialRecord;
use crate::config::paths::token_dir;
use crate::error::{GitAuthError, Result};

const TOKEN_FILE_NAME: &str = "tokens.json";

/// Trait for credential storage operations (enables mocking).
#[cfg_attr(test, automock)]
pub trait CredentialStore {
    /// Looks up the record for a profile.
    ///
    /// Returns `Ok(None)` when the profile has no record.
    fn get(&self, profile: &str) -> Result<Option<CredentialRecord>>;

    /// Inserts the record, replacing any existing record for the same profile.
    fn put(&self, record: &CredentialRecord) -> Result<()>;

    /// Removes the record for a profile.
    ///
    /// Returns `true` if a record was removed.
    fn remove(&self, profile: &str) -> Result<bool>;

    /// Lists all records in file order.
    fn list(&self) -> Result<Vec<CredentialRecord>>;
}

/// Credential store backed by a single JSON file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Opens the store in the default location (`~/.git-auth/tokens.json`).
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::Storage`] if the directory or file cannot be created.
    pub fn open_default() -> Result<Self> {
        Self::open(&token_dir()?)
    }

    /// Opens the store in `dir`, creating the directory and an empty token
    /// list if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::Storage`] if the directory or file cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| storage_error(dir, &e))?;

        let store = Self {
            path: dir.join(TOKEN_FILE_NAME),
        };
        if !store.path.exists() {
            store.write_records(&[])?;
        }
        Ok(store)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<CredentialRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(&self.path, &e)),
        };

        serde_json::from_str(&contents).map_err(|e| {
            GitAuthError::CorruptTokenStore(format!("{}: {e}", self.path.display()))
        })
    }

    fn write_records(&self, records: &[CredentialRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        write_owner_only(&tmp, json.as_bytes()).map_err(|e| storage_error(&tmp, &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| storage_error(&self.path, &e))?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "token store written");
        Ok(())
    }
}

impl CredentialStore for FileTokenStore {
    fn get(&self, profile: &str) -> Result<Option<CredentialRecord>> {
        Ok(self
            .read_records()?
            .into_iter()
            .find(|record| record.profile == profile))
    }

    fn put(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = self.read_records()?;

        match records.iter_mut().find(|r| r.profile == record.profile) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }

        self.write_records(&records)
    }

    fn remove(&self, profile: &str) -> Result<bool> {
        let mut records = self.read_records()?;
        let before = records.len();
        records.retain(|r| r.profile != profile);

        if records.len() == before {
            return Ok(false);
        }
        self.write_records(&records)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<CredentialRecord>> {
        self.read_records()
    }
}

fn storage_error(path: &Path, err: &std::io::Error) -> GitAuthError {
    GitAuthError::Storage(format!("{}: {err}", path.display()))
}

/// Write `bytes` to `path`, readable by the owner only on Unix.
fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
