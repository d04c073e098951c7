//! Command implementations.

pub mod auth;
pub mod keys;
pub mod ssh_config;

pub use auth::{handle_auth, handle_logout, handle_magic_auth, handle_status};
pub use keys::{handle_add_key, handle_clean_keys, handle_list_keys};
pub use ssh_config::handle_generate_ssh_config;

use crate::auth::{CredentialResolver, FileTokenStore};
use crate::client::{ClientOptions, GitLabClient};
use crate::config::{load_config, Profile};
use crate::error::Result;

/// Everything a command needs to talk to one profile's GitLab instance.
pub(crate) struct Session {
    pub profile: Profile,
    pub client: GitLabClient,
    pub store: FileTokenStore,
}

impl Session {
    pub fn open(profile: Option<&str>) -> Result<Self> {
        let profile = load_config()?.resolve_profile(profile)?;
        tracing::debug!(profile = %profile.name, url = %profile.url, "using profile");

        let client = GitLabClient::new(&ClientOptions::from(&profile))?;
        let store = FileTokenStore::open_default()?;

        Ok(Self {
            profile,
            client,
            store,
        })
    }

    pub const fn resolver(&self) -> CredentialResolver<'_, FileTokenStore, GitLabClient> {
        CredentialResolver::new(&self.store, &self.client)
    }
}
