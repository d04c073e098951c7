//! Server-side SSH key lifecycle: clean up old keys, upload new ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::client::GitLabClient;
use crate::error::{GitAuthError, Result};
use crate::ssh::keys::{self, KeyPair};

type KeyGenerator = fn(&Path, &str, &str) -> Result<KeyPair>;

/// Outcome of deleting one key during cleanup.
#[derive(Debug)]
pub struct KeyDeletion {
    pub id: u64,
    pub title: String,
    pub result: Result<()>,
}

/// Result of [`SshKeyProvisioner::sync`].
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deletions: Vec<KeyDeletion>,
}

impl CleanupReport {
    /// Keys that were removed.
    pub fn deleted(&self) -> impl Iterator<Item = &KeyDeletion> {
        self.deletions.iter().filter(|d| d.result.is_ok())
    }

    /// Keys whose deletion failed, with the error.
    pub fn failed(&self) -> impl Iterator<Item = &KeyDeletion> {
        self.deletions.iter().filter(|d| d.result.is_err())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }
}

/// Manages the session user's keys on the server.
///
/// The client must already be bound to a valid token.
pub struct SshKeyProvisioner<'a> {
    client: &'a GitLabClient,
    generate: KeyGenerator,
}

impl<'a> SshKeyProvisioner<'a> {
    pub fn new(client: &'a GitLabClient) -> Self {
        Self {
            client,
            generate: keys::generate_pair,
        }
    }

    #[cfg(test)]
    fn with_generator(mut self, generate: KeyGenerator) -> Self {
        self.generate = generate;
        self
    }

    /// Delete every key whose title starts with `prefix`.
    ///
    /// Deletions run concurrently. A failed deletion is logged and recorded in
    /// the report; it does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is empty or the key list cannot be
    /// fetched.
    pub async fn sync(&self, prefix: &str) -> Result<CleanupReport> {
        if prefix.is_empty() {
            return Err(GitAuthError::Config(
                "refusing to clean up keys with an empty prefix".to_string(),
            ));
        }

        let targets: Vec<_> = self
            .client
            .list_ssh_keys()
            .await?
            .into_iter()
            .filter(|key| key.title.starts_with(prefix))
            .collect();

        tracing::debug!(prefix, count = targets.len(), "cleaning up SSH keys");

        let deletions = join_all(targets.into_iter().map(|key| async move {
            let result = self.client.delete_ssh_key(key.id).await;
            match &result {
                Ok(()) => tracing::info!(id = key.id, title = %key.title, "deleted SSH key"),
                Err(e) => {
                    tracing::warn!(id = key.id, title = %key.title, error = %e, "failed to delete SSH key");
                }
            }
            KeyDeletion {
                id: key.id,
                title: key.title,
                result,
            }
        }))
        .await;

        Ok(CleanupReport { deletions })
    }

    /// Generate a key pair under `dir` and upload its public half.
    ///
    /// With a `ttl`, the server is asked to expire the key after that long.
    ///
    /// # Errors
    ///
    /// Returns an error if `ttl` is out of range, generation fails or the
    /// server rejects the key. Local files are kept once generated.
    pub async fn provision(
        &self,
        dir: PathBuf,
        key_name: String,
        title: String,
        ttl: Option<Duration>,
    ) -> Result<KeyPair> {
        let expires_at = ttl
            .map(|ttl| {
                chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                    .ok_or_else(|| {
                        GitAuthError::Config(format!("invalid key lifetime: {}s", ttl.as_secs()))
                    })
            })
            .transpose()?;

        let generate = self.generate;
        let pair = tokio::task::spawn_blocking(move || generate(&dir, &key_name, &title))
            .await
            .map_err(|e| GitAuthError::KeyGeneration(e.to_string()))??;

        let public_key = std::fs::read_to_string(&pair.public_key_path)?;

        self.client
            .add_ssh_key(&pair.title, &public_key, expires_at)
            .await?;

        Ok(pair)
    }
}
