//! Credential resolution.
//!
//! Turns a profile name into a usable session: load the stored record,
//! check it against the server, refresh it when the server rejects it.
//! Falling back to the device flow is left to the caller, which decides
//! based on [`GitAuthError::requires_device_flow`].

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::auth::store::CredentialStore;
use crate::auth::tokens::{CredentialRecord, TokenResponse};
use crate::client::GitLabClient;
use crate::error::{GitAuthError, Result};

/// Token operations the resolver needs from the GitLab API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenApi: Send + Sync {
    /// Whether the server accepts `token`.
    async fn verify(&self, token: &str) -> Result<bool>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Use `token` for subsequent authenticated calls.
    async fn bind_token(&self, token: &str);
}

#[async_trait]
impl TokenApi for GitLabClient {
    async fn verify(&self, token: &str) -> Result<bool> {
        GitLabClient::verify(self, token).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        GitLabClient::refresh(self, refresh_token).await
    }

    async fn bind_token(&self, token: &str) {
        self.set_token(token).await;
    }
}

/// Turns a profile's stored record into a credential the server accepts.
///
/// Never starts a device flow itself; callers check
/// [`GitAuthError::requires_device_flow`] on the error and fall back.
pub struct CredentialResolver<'a, S, A> {
    store: &'a S,
    api: &'a A,
}

impl<'a, S, A> CredentialResolver<'a, S, A>
where
    S: CredentialStore,
    A: TokenApi,
{
    /// Resolver reading and writing `store` and talking to `api`.
    pub const fn new(store: &'a S, api: &'a A) -> Self {
        Self { store, api }
    }

    /// Produce a valid credential for `profile` without user interaction.
    ///
    /// A record the server still accepts is returned unchanged. A rejected
    /// record is refreshed once and the new pair replaces it in the store.
    /// On success the API session is bound to the returned access token.
    ///
    /// # Errors
    ///
    /// - [`GitAuthError::TokenNotFound`] if the profile has no record
    /// - [`GitAuthError::TokenRefreshFailed`] if the refresh is rejected; the
    ///   store is left untouched
    /// - [`GitAuthError::CorruptTokenStore`] or [`GitAuthError::Storage`] if the
    ///   store cannot be read or written
    /// - transport errors from verification or refresh
    pub async fn resolve(&self, profile: &str) -> Result<CredentialRecord> {
        let record = self
            .store
            .get(profile)?
            .ok_or_else(|| GitAuthError::TokenNotFound {
                profile: profile.to_string(),
            })?;

        if self.api.verify(&record.access_token).await? {
            tracing::debug!(profile, "stored token accepted");
            self.api.bind_token(&record.access_token).await;
            return Ok(record);
        }

        tracing::info!(profile, "stored token rejected, refreshing");
        let response = self.api.refresh(&record.refresh_token).await?;
        self.persist_grant(profile, &response).await
    }

    /// Store a freshly issued token pair for `profile` and bind the session
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be written.
    pub async fn persist_grant(
        &self,
        profile: &str,
        response: &TokenResponse,
    ) -> Result<CredentialRecord> {
        let record = CredentialRecord::from_response(profile, response);
        self.store.put(&record)?;
        self.api.bind_token(&record.access_token).await;

        tracing::debug!(profile, expires_at = record.expires_at, "credential stored");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::auth::store::MockCredentialStore;

    fn stored() -> CredentialRecord {
        CredentialRecord {
            profile: "work".to_string(),
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            expires_at: 1_700_000_000,
        }
    }

    fn refreshed() -> TokenResponse {
        TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: "new-refresh".to_string(),
            expires_in: 3600,
            token_type: Some("Bearer".to_string()),
            scope: None,
        }
    }

    #[tokio::test]
    async fn missing_record_requires_device_flow() {
        let mut store = MockCredentialStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_put().never();

        let mut api = MockTokenApi::new();
        api.expect_verify().never();
        api.expect_refresh().never();

        let err = CredentialResolver::new(&store, &api)
            .resolve("work")
            .await
            .unwrap_err();

        assert!(matches!(&err, GitAuthError::TokenNotFound { profile } if profile == "work"));
        assert!(err.requires_device_flow());
    }

    #[tokio::test]
    async fn accepted_token_is_returned_unchanged() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get()
            .with(eq("work"))
            .returning(|_| Ok(Some(stored())));
        store.expect_put().never();

        let mut api = MockTokenApi::new();
        api.expect_verify()
            .with(eq("old-access"))
            .times(1)
            .returning(|_| Ok(true));
        api.expect_refresh().never();
        api.expect_bind_token()
            .with(eq("old-access"))
            .times(1)
            .return_const(());

        let record = assert_ok!(CredentialResolver::new(&store, &api).resolve("work").await);

        assert_eq!(record, stored());
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_persisted() {
        let mut store = MockCredentialStore::new();
        store.expect_get().returning(|_| Ok(Some(stored())));
        store
            .expect_put()
            .withf(|record| {
                let expected = Utc::now().timestamp() + 3600;
                record.profile == "work"
                    && record.access_token == "new-access"
                    && record.refresh_token == "new-refresh"
                    && (record.expires_at - expected).abs() <= 5
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut api = MockTokenApi::new();
        api.expect_verify().times(1).returning(|_| Ok(false));
        api.expect_refresh()
            .with(eq("old-refresh"))
            .times(1)
            .returning(|_| Ok(refreshed()));
        api.expect_bind_token()
            .with(eq("new-access"))
            .times(1)
            .return_const(());

        let record = CredentialResolver::new(&store, &api)
            .resolve("work")
            .await
            .unwrap();

        assert_eq!(record.access_token, "new-access");
    }

    #[tokio::test]
    async fn failed_refresh_leaves_store_untouched() {
        let mut store = MockCredentialStore::new();
        store.expect_get().returning(|_| Ok(Some(stored())));
        store.expect_put().never();

        let mut api = MockTokenApi::new();
        api.expect_verify().returning(|_| Ok(false));
        api.expect_refresh()
            .times(1)
            .returning(|_| Err(GitAuthError::TokenRefreshFailed("invalid_grant".to_string())));
        api.expect_bind_token().never();

        let err = assert_err!(CredentialResolver::new(&store, &api).resolve("work").await);

        assert!(matches!(err, GitAuthError::TokenRefreshFailed(_)));
        assert!(err.requires_device_flow());
    }

    #[tokio::test]
    async fn transport_error_during_verify_is_not_a_refresh() {
        let mut store = MockCredentialStore::new();
        store.expect_get().returning(|_| Ok(Some(stored())));
        store.expect_put().never();

        let mut api = MockTokenApi::new();
        api.expect_verify()
            .returning(|_| Err(GitAuthError::Network("connection refused".to_string())));
        api.expect_refresh().never();

        let err = CredentialResolver::new(&store, &api)
            .resolve("work")
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::Network(_)));
        assert!(!err.requires_device_flow());
    }

    #[tokio::test]
    async fn corrupt_store_is_reported_as_such() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get()
            .returning(|_| Err(GitAuthError::CorruptTokenStore("tokens.json".to_string())));

        let mut api = MockTokenApi::new();
        api.expect_verify().never();

        let err = CredentialResolver::new(&store, &api)
            .resolve("work")
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::CorruptTokenStore(_)));
    }

    #[tokio::test]
    async fn persist_grant_writes_before_binding() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = crate::auth::store::FileTokenStore::open(temp_dir.path()).unwrap();

        let mut api = MockTokenApi::new();
        api.expect_bind_token()
            .with(eq("new-access"))
            .times(1)
            .return_const(());

        let record = CredentialResolver::new(&store, &api)
            .persist_grant("work", &refreshed())
            .await
            .unwrap();

        assert_eq!(store.get("work").unwrap(), Some(record));
    }
}
