//! OAuth device authorization flow implementation (RFC 8628).
//!
//! One login attempt moves through: request a device code, show it to the
//! user, then poll the token endpoint until the server reports a terminal
//! outcome. Pending and slow-down answers keep polling; everything else ends
//! the attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::auth::tokens::{DeviceAuthorization, DevicePoll, TokenResponse};
use crate::client::GitLabClient;
use crate::error::{GitAuthError, Result};

/// Added to the polling interval each time the server answers `slow_down`.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Start the device authorization flow.
///
/// Returns the verification URL and user code for the user to complete
/// authentication.
///
/// # Errors
///
/// Returns an error if the device authorization request fails. This is not
/// retryable.
pub async fn start_device_flow(client: &GitLabClient) -> Result<DeviceAuthorization> {
    let grant = client
        .request_device_authorization(client.client_id(), client.scope())
        .await?;

    tracing::debug!(
        interval = grant.interval,
        expires_in = grant.expires_in,
        "device authorization granted"
    );
    Ok(grant)
}

/// Poll for token completion.
///
/// Polls until the user completes authorization, the device code expires, or
/// `cancel` fires.
///
/// # Errors
///
/// Returns an error if:
/// - The device code expires ([`GitAuthError::DeviceAuthorizationExpired`])
/// - The user denies access ([`GitAuthError::AccessDenied`])
/// - The server answers with anything unexpected ([`GitAuthError::AuthenticationFailed`])
/// - The wait is interrupted ([`GitAuthError::Cancelled`])
pub async fn poll_for_token(
    client: &GitLabClient,
    grant: &DeviceAuthorization,
    cancel: &CancellationToken,
) -> Result<TokenResponse> {
    poll_for_token_with(client, grant, cancel, tokio::time::sleep).await
}

/// [`poll_for_token`] with a caller-supplied sleep between attempts.
pub async fn poll_for_token_with<S, F>(
    client: &GitLabClient,
    grant: &DeviceAuthorization,
    cancel: &CancellationToken,
    sleep: S,
) -> Result<TokenResponse>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    // A lifetime too large to represent never expires.
    let deadline = Instant::now().checked_add(grant.lifetime());
    let mut interval = grant.interval();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let poll = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(GitAuthError::Cancelled),
            poll = client.exchange_device_code(&grant.device_code) => poll?,
        };

        match poll {
            DevicePoll::Granted(token) => {
                tracing::info!(attempts, "device authorization completed");
                return Ok(token);
            }
            DevicePoll::Pending => {
                tracing::debug!(attempts, "authorization pending");
            }
            DevicePoll::SlowDown => {
                interval += SLOW_DOWN_INCREMENT;
                tracing::debug!(
                    attempts,
                    interval_secs = interval.as_secs(),
                    "server asked to slow down"
                );
            }
            DevicePoll::Denied => return Err(GitAuthError::AccessDenied),
            DevicePoll::Expired => return Err(GitAuthError::DeviceAuthorizationExpired),
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::debug!(attempts, "device code lifetime elapsed");
            return Err(GitAuthError::DeviceAuthorizationExpired);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(GitAuthError::Cancelled),
            () = sleep(interval) => {}
        }
    }
}

/// Open the verification URL in the default browser.
///
/// Returns `true` if the browser was opened successfully, `false` otherwise.
pub fn open_browser(grant: &DeviceAuthorization) -> bool {
    open::that(grant.display_uri()).is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::future::{ready, Ready};
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::ClientOptions;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn grant(expires_in: u64) -> DeviceAuthorization {
        DeviceAuthorization {
            device_code: "dev-code".to_string(),
            user_code: Some("ABCD-1234".to_string()),
            verification_uri: "https://gitlab.example.com/oauth/device".to_string(),
            verification_uri_complete: None,
            expires_in,
            interval: INTERVAL.as_secs(),
        }
    }

    fn client_for(server: &MockServer) -> GitLabClient {
        GitLabClient::new(&ClientOptions::new(Url::parse(&server.uri()).unwrap(), "app-id"))
            .unwrap()
    }

    /// Sleep function that records requested durations and returns at once.
    fn recording_sleep() -> (Arc<Mutex<Vec<Duration>>>, impl Fn(Duration) -> Ready<()>) {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&slept);
        let sleep = move |duration: Duration| {
            log.lock().unwrap().push(duration);
            ready(())
        };
        (slept, sleep)
    }

    fn oauth_error(code: &str) -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({ "error": code }))
    }

    fn granted() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 7200,
        }))
    }

    async fn mount(server: &MockServer, template: ResponseTemplate, times: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(template)
            .up_to_n_times(times)
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pending_twice_then_granted() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("authorization_pending"), 2).await;
        mount(&server, granted(), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        let token = poll_for_token_with(&client, &grant(300), &CancellationToken::new(), sleep)
            .await
            .unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(*slept.lock().unwrap(), vec![INTERVAL, INTERVAL]);
    }

    #[tokio::test]
    async fn slow_down_grows_interval_monotonically() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("slow_down"), 2).await;
        mount(&server, oauth_error("authorization_pending"), 1).await;
        mount(&server, granted(), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        poll_for_token_with(&client, &grant(300), &CancellationToken::new(), sleep)
            .await
            .unwrap();

        let slept = slept.lock().unwrap().clone();
        assert_eq!(
            slept,
            vec![
                INTERVAL + SLOW_DOWN_INCREMENT,
                INTERVAL + SLOW_DOWN_INCREMENT * 2,
                INTERVAL + SLOW_DOWN_INCREMENT * 2,
            ]
        );
        assert!(slept[0] > INTERVAL);
    }

    #[tokio::test]
    async fn access_denied_stops_immediately() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("access_denied"), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        let err = poll_for_token_with(&client, &grant(300), &CancellationToken::new(), sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::AccessDenied));
        assert!(!err.requires_device_flow());
        assert!(slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_token_stops_immediately() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("expired_token"), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        let err = poll_for_token_with(&client, &grant(300), &CancellationToken::new(), sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::DeviceAuthorizationExpired));
        assert!(slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unexpected_status_fails() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(503).set_body_string("maintenance"), 1).await;

        let client = client_for(&server);
        let (_, sleep) = recording_sleep();
        let err = poll_for_token_with(&client, &grant(300), &CancellationToken::new(), sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::AuthenticationFailed(msg) if msg.contains("maintenance")));
    }

    #[tokio::test]
    async fn lifetime_bounds_polling() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("authorization_pending"), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        let err = poll_for_token_with(&client, &grant(0), &CancellationToken::new(), sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::DeviceAuthorizationExpired));
        assert!(slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_lifetime_keeps_polling() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("authorization_pending"), 1).await;
        mount(&server, granted(), 1).await;

        let client = client_for(&server);
        let (slept, sleep) = recording_sleep();
        let token = poll_for_token_with(&client, &grant(u64::MAX), &CancellationToken::new(), sleep)
            .await
            .unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(*slept.lock().unwrap(), vec![INTERVAL]);
    }

    #[tokio::test]
    async fn cancelled_before_first_poll_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(granted())
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (_, sleep) = recording_sleep();
        let err = poll_for_token_with(&client, &grant(300), &cancel, sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_interrupts_the_wait() {
        let server = MockServer::start().await;
        mount(&server, oauth_error("authorization_pending"), 1).await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sleep = move |_| {
            trigger.cancel();
            futures::future::pending::<()>()
        };

        let err = poll_for_token_with(&client, &grant(300), &cancel, sleep)
            .await
            .unwrap_err();

        assert!(matches!(err, GitAuthError::Cancelled));
    }

    #[tokio::test]
    async fn start_device_flow_sends_configured_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/authorize_device"))
            .and(wiremock::matchers::body_string_contains("\"client_id\":\"app-id\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-code",
                "verification_uri": "https://gitlab.example.com/oauth/device",
                "verification_uri_complete": "https://gitlab.example.com/oauth/device?user_code=WXYZ",
                "expires_in": 300,
                "interval": 5,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = start_device_flow(&client_for(&server)).await.unwrap();
        assert_eq!(grant.code(), Some("WXYZ"));
    }
}
