//! Error types and result aliases for git-auth.
//!
//! This module provides a comprehensive error handling system with:
//! - Specific error variants for different failure modes
//! - User-friendly error messages with recovery suggestions
//! - Helper methods for error classification
//! - Automatic conversion from common error types

use thiserror::Error;

/// Main error type for git-auth operations.
///
/// Each variant includes a user-friendly message with actionable recovery steps.
/// Use [`requires_device_flow`](Self::requires_device_flow) to decide whether a
/// fresh login can recover.
#[derive(Error, Debug)]
pub enum GitAuthError {
    /// No credential record is stored for the profile.
    #[error("No stored token for profile '{profile}'. Run 'git-auth auth' to log in.")]
    TokenNotFound {
        /// The profile that was looked up.
        profile: String,
    },

    /// The refresh grant was rejected by the server.
    #[error("Token refresh failed. Run 'git-auth auth' to log in again. Details: {0}")]
    TokenRefreshFailed(String),

    /// The device flow ended in an unexpected state.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Device code expired before the user completed authorization.
    #[error("Device authorization code expired. Run 'git-auth auth' again and complete authorization within the time limit.")]
    DeviceAuthorizationExpired,

    /// User denied the authorization request.
    #[error("Authorization was denied. If this was unintentional, run 'git-auth auth' to try again.")]
    AccessDenied,

    /// The operation was interrupted by the user.
    #[error("Operation cancelled.")]
    Cancelled,

    /// API returned a non-success status code.
    #[error("GitLab request failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body returned by GitLab.
        message: String,
    },

    /// API returned 401 Unauthorized.
    #[error("GitLab returned unauthorized (401). Your session may have expired. Run 'git-auth auth' to log in again.")]
    Unauthorized,

    /// GitLab is unreachable (connection failed).
    #[error("GitLab is unavailable. Check your network connection or try again later.")]
    ApiUnavailable,

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// Network error during HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// Token file could not be read or written.
    #[error("Token storage error: {0}")]
    Storage(String),

    /// Token file exists but does not contain a valid token list.
    #[error("Token store is corrupted: {0}. Fix or delete the file, then run 'git-auth auth'.")]
    CorruptTokenStore(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// SSH key pair could not be generated or encoded.
    #[error("SSH key generation failed: {0}")]
    KeyGeneration(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Data serialization error: {0}. This may indicate corrupted data.")]
    Serialization(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GitAuthError {
    /// Checks if running the device flow from scratch is the way to recover.
    ///
    /// Only a missing record and a rejected refresh qualify; both mean the
    /// stored credentials can no longer produce a valid token.
    #[must_use]
    pub const fn requires_device_flow(&self) -> bool {
        matches!(self, Self::TokenNotFound { .. } | Self::TokenRefreshFailed(_))
    }
}

/// Result type alias using [`GitAuthError`].
pub type Result<T> = std::result::Result<T, GitAuthError>;

impl From<serde_json::Error> for GitAuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for GitAuthError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}

impl From<ssh_key::Error> for GitAuthError {
    fn from(err: ssh_key::Error) -> Self {
        Self::KeyGeneration(err.to_string())
    }
}

impl From<reqwest::Error> for GitAuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ApiUnavailable
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for GitAuthError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}
