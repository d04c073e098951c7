//! GitLab API wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated user, as returned by `GET /api/v4/user`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
    /// Absent when the user keeps their email private.
    #[serde(default)]
    pub email: Option<String>,
}

/// One entry of `GET /api/v4/user/keys`.
///
/// Read-only: entries are matched by title and referenced by id, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SshKeyEntry {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SshKeyEntry {
    /// Whether the key had an expiry that lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Body of `POST /api/v4/user/keys`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateSshKey<'a> {
    pub title: &'a str,
    pub key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `POST /oauth/authorize_device`.
#[derive(Debug, Serialize)]
pub(crate) struct DeviceAuthorizationRequest<'a> {
    pub client_id: &'a str,
    pub scope: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn key_entry_tolerates_missing_and_null_expiry() {
        let keys: Vec<SshKeyEntry> = serde_json::from_str(
            r#"[
                {"id": 1, "title": "gl_auth-1", "key": "ssh-rsa AAAA", "expires_at": null},
                {"id": 2, "title": "laptop", "created_at": "2024-01-01T00:00:00.000Z"},
                {"id": 3, "title": "gl_auth-2", "expires_at": "2024-10-18T00:00:00.000Z"}
            ]"#,
        )
        .unwrap();

        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].expires_at, None);
        assert_eq!(keys[1].expires_at, None);
        assert!(keys[2].expires_at.is_some());
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let now = Utc::now();
        let key = |expires_at| SshKeyEntry {
            id: 1,
            title: "k".to_string(),
            expires_at,
        };

        assert!(key(Some(now - Duration::hours(1))).is_expired_at(now));
        assert!(!key(Some(now + Duration::hours(1))).is_expired_at(now));
        assert!(!key(None).is_expired_at(now));
    }

    #[test]
    fn user_email_is_optional() {
        let user: GitLabUser =
            serde_json::from_str(r#"{"id": 7, "username": "jdoe", "name": "J Doe"}"#).unwrap();
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.email, None);
    }
}
