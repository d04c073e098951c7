//! GitLab API client implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use oauth2::devicecode::{DeviceCodeErrorResponse, DeviceCodeErrorResponseType};
use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::auth::tokens::{DeviceAuthorization, DevicePoll, TokenResponse};
use crate::client::middleware::AuthMiddleware;
use crate::client::types::{
    CreateSshKey, DeviceAuthorizationRequest, GitLabUser, SshKeyEntry,
};
use crate::config::Profile;
use crate::error::{GitAuthError, Result};

const AUTHORIZE_DEVICE_PATH: &str = "/oauth/authorize_device";
const TOKEN_PATH: &str = "/oauth/token";
const TOKEN_INFO_PATH: &str = "/oauth/token/info";
const USER_PATH: &str = "/api/v4/user";
const USER_KEYS_PATH: &str = "/api/v4/user/keys";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Request timeout applied to every call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect URI sent with refresh grants.
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob:auto";

/// Construction options for [`GitLabClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Instance base URL, e.g. `https://gitlab.example.com`.
    pub base_url: Url,
    /// OAuth application ID.
    pub client_id: String,
    /// Requested scopes, joined with spaces on the wire.
    pub scope: Vec<String>,
    /// Bound on every request. Defaults to [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
    /// Defaults to [`DEFAULT_REDIRECT_URI`].
    pub redirect_uri: String,
}

impl ClientOptions {
    #[must_use]
    pub fn new(base_url: Url, client_id: impl Into<String>) -> Self {
        Self {
            base_url,
            client_id: client_id.into(),
            scope: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl From<&Profile> for ClientOptions {
    fn from(profile: &Profile) -> Self {
        Self {
            scope: profile.scope.clone(),
            ..Self::new(profile.url.clone(), profile.client_id.clone())
        }
    }
}

/// Client for the OAuth and user-key endpoints of one GitLab instance.
///
/// Holds the session's bearer token; set it with
/// [`set_token`](Self::set_token) once a valid token is known.
pub struct GitLabClient {
    client: ClientWithMiddleware,
    base_url: Url,
    client_id: String,
    scope: String,
    redirect_uri: String,
    token: Arc<RwLock<Option<String>>>,
}

impl GitLabClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("git-auth/{}", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()?;

        let token: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

        let client = ClientBuilder::new(inner_client)
            .with(AuthMiddleware::new(Arc::clone(&token)))
            .build();

        Ok(Self {
            client,
            base_url: options.base_url.clone(),
            client_id: options.client_id.clone(),
            scope: options.scope.join(" "),
            redirect_uri: options.redirect_uri.clone(),
            token,
        })
    }

    /// Bind the session to a bearer token.
    pub async fn set_token(&self, token: &str) {
        *self.token.write().await = Some(token.to_string());
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Space-separated scope string.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Start a device authorization grant.
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::ApiError`] carrying the response body for any
    /// non-2xx response.
    pub async fn request_device_authorization(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<DeviceAuthorization> {
        let url = self.endpoint(AUTHORIZE_DEVICE_PATH)?;
        let body = DeviceAuthorizationRequest { client_id, scope };

        let response = self.post_json(url, &body).await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GitAuthError::ApiError { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| GitAuthError::Serialization(format!("device authorization response: {e}")))
    }

    /// Poll the token endpoint once with a device code.
    ///
    /// Known OAuth error codes on HTTP 400 map to a [`DevicePoll`] outcome;
    /// anything else is a hard failure.
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::AuthenticationFailed`] for unexpected statuses
    /// or error codes, and transport errors as-is.
    pub async fn exchange_device_code(&self, device_code: &str) -> Result<DevicePoll> {
        let url = self.endpoint(TOKEN_PATH)?;
        let params = [
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code),
            ("grant_type", DEVICE_CODE_GRANT),
        ];

        let response = self.client.post(url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => {
                let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                    GitAuthError::AuthenticationFailed(format!("invalid token response: {e}"))
                })?;
                Ok(DevicePoll::Granted(token))
            }
            StatusCode::BAD_REQUEST => {
                let error: DeviceCodeErrorResponse = serde_json::from_str(&body).map_err(|e| {
                    GitAuthError::AuthenticationFailed(format!(
                        "unreadable error response ({e}): {body}"
                    ))
                })?;

                match error.error() {
                    DeviceCodeErrorResponseType::AuthorizationPending => Ok(DevicePoll::Pending),
                    DeviceCodeErrorResponseType::SlowDown => Ok(DevicePoll::SlowDown),
                    DeviceCodeErrorResponseType::AccessDenied => Ok(DevicePoll::Denied),
                    DeviceCodeErrorResponseType::ExpiredToken => Ok(DevicePoll::Expired),
                    other => Err(GitAuthError::AuthenticationFailed(format!(
                        "unexpected error: {other:?} - {}",
                        error.error_description().map_or("", String::as_str)
                    ))),
                }
            }
            status => Err(GitAuthError::AuthenticationFailed(format!(
                "unexpected status code: {status}, body: {body}"
            ))),
        }
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Returns [`GitAuthError::TokenRefreshFailed`] for any non-200 response
    /// or unreadable body. Transport failures propagate unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let url = self.endpoint(TOKEN_PATH)?;
        let params = [
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self.client.post(url).form(&params).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GitAuthError::TokenRefreshFailed(format!(
                "unexpected status code: {status}, body: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GitAuthError::TokenRefreshFailed(format!("invalid token response: {e}")))
    }

    /// Check a token against the introspection endpoint.
    ///
    /// Any non-200 answer means "invalid"; only transport failures are errors.
    pub async fn verify(&self, token: &str) -> Result<bool> {
        let url = self.endpoint(TOKEN_INFO_PATH)?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        tracing::debug!(status = %response.status(), "token introspection");
        Ok(response.status() == StatusCode::OK)
    }

    /// Fetch the user that owns `token`.
    pub async fn get_user(&self, token: &str) -> Result<GitLabUser> {
        let url = self.endpoint(USER_PATH)?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if response.status() != StatusCode::OK {
            return Err(api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| GitAuthError::Serialization(e.to_string()))
    }

    /// Upload a public key to the session user's account.
    ///
    /// # Errors
    ///
    /// Anything other than HTTP 201 is an error.
    pub async fn add_ssh_key(
        &self,
        title: &str,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let url = self.endpoint(USER_KEYS_PATH)?;
        let body = CreateSshKey {
            title,
            key: key.trim_end(),
            expires_at,
        };

        let response = self.post_json(url, &body).await?;
        if response.status() != StatusCode::CREATED {
            return Err(api_error(response).await);
        }

        tracing::info!(title, "SSH key added");
        Ok(())
    }

    /// List the session user's SSH keys.
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKeyEntry>> {
        let url = self.endpoint(USER_KEYS_PATH)?;
        let response = self.client.get(url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(api_error(response).await);
        }

        let keys: Vec<SshKeyEntry> = response
            .json()
            .await
            .map_err(|e| GitAuthError::Serialization(e.to_string()))?;

        tracing::debug!(count = keys.len(), "retrieved SSH keys");
        Ok(keys)
    }

    /// Keys whose expiry date has already passed.
    pub async fn expired_ssh_keys(&self) -> Result<Vec<SshKeyEntry>> {
        let now = Utc::now();
        let expired: Vec<_> = self
            .list_ssh_keys()
            .await?
            .into_iter()
            .filter(|key| key.is_expired_at(now))
            .collect();

        tracing::debug!(count = expired.len(), "found expired SSH keys");
        Ok(expired)
    }

    /// Delete one key by id.
    ///
    /// # Errors
    ///
    /// Anything other than HTTP 204 is an error.
    pub async fn delete_ssh_key(&self, id: u64) -> Result<()> {
        let url = self.endpoint(&format!("{USER_KEYS_PATH}/{id}"))?;
        let response = self.client.delete(url).send().await?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(api_error(response).await);
        }

        tracing::debug!(id, "SSH key deleted");
        Ok(())
    }

    /// Resolve an API path against the base URL, keeping any path prefix
    /// the instance is mounted under.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: Url, body: &T) -> Result<Response> {
        Ok(self
            .client
            .post(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(body)?)
            .send()
            .await?)
    }
}

/// Turn a non-success response into an error carrying its body.
async fn api_error(response: Response) -> GitAuthError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return GitAuthError::Unauthorized;
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    GitAuthError::ApiError {
        status: status.as_u16(),
        message,
    }
}
