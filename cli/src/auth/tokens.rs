//! Token types for authentication.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Fallback device-code lifetime when the server omits `expires_in`.
const DEFAULT_DEVICE_CODE_LIFETIME_SECS: u64 = 300;

/// Fallback polling interval when the server omits `interval`.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Stored credentials for one profile.
///
/// Serialized with the field names used by `tokens.json`; note that
/// `expire_in` holds an absolute unix timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Profile this record belongs to. Unique within a store.
    pub profile: String,
    /// OAuth access token.
    #[serde(rename = "token")]
    pub access_token: String,
    /// OAuth refresh token.
    pub refresh_token: String,
    /// Unix timestamp at which the access token expires.
    #[serde(rename = "expire_in")]
    pub expires_at: i64,
}

impl CredentialRecord {
    /// Build a record from a token response, anchoring the lifetime at now.
    #[must_use]
    pub fn from_response(profile: &str, response: &TokenResponse) -> Self {
        Self {
            profile: profile.to_string(),
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: Utc::now().timestamp().saturating_add(response.expires_in),
        }
    }

    /// Check whether the access token's recorded lifetime has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp()
    }
}

/// Token endpoint response for both the device-code and refresh grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Response from the device authorization endpoint.
///
/// Lives only for the duration of one login attempt and is never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    #[serde(default)]
    pub user_code: Option<String>,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Device code lifetime in seconds.
    #[serde(alias = "expire_in", default = "default_lifetime")]
    pub expires_in: u64,
    /// Server-advertised polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

const fn default_lifetime() -> u64 {
    DEFAULT_DEVICE_CODE_LIFETIME_SECS
}

const fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl DeviceAuthorization {
    /// URL to show the user, preferring the one with the code embedded.
    #[must_use]
    pub fn display_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }

    /// Code the user must confirm in the browser.
    ///
    /// Falls back to the `user_code` query parameter of the complete URI.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.user_code.as_deref().or_else(|| {
            self.verification_uri_complete
                .as_deref()
                .and_then(|uri| uri.split_once("user_code="))
                .map(|(_, code)| code.split('&').next().unwrap_or(code))
        })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

/// Outcome of a single poll of the token endpoint with a device code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePoll {
    /// The user approved the request.
    Granted(TokenResponse),
    /// The user has not acted yet.
    Pending,
    /// The server asked us to poll less often.
    SlowDown,
    /// The user rejected the request.
    Denied,
    /// The device code is no longer valid.
    Expired,
}
