//! Authentication command handlers.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::auth::{
    open_browser, poll_for_token, start_device_flow, CredentialRecord, CredentialStore,
    FileTokenStore, TokenResponse,
};
use crate::cli::commands::keys::{print_cleanup, provision_key};
use crate::cli::commands::Session;
use crate::client::GitLabClient;
use crate::config::load_config;
use crate::error::Result;
use crate::ssh::SshKeyProvisioner;

/// Handle the `git-auth auth` command.
pub async fn handle_auth(
    profile: Option<&str>,
    no_browser: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let session = Session::open(profile)?;
    let record = login(&session, no_browser, cancel).await?;
    greet(&session.client, &record).await
}

/// Handle the `git-auth logout` command.
pub fn handle_logout(profile: Option<&str>) -> Result<()> {
    let session = Session::open(profile)?;

    if session.store.remove(&session.profile.name)? {
        println!("Logged out of profile '{}'.", session.profile.name);
    } else {
        println!("Not currently logged in to profile '{}'.", session.profile.name);
    }

    Ok(())
}

/// Handle the `git-auth status` command.
///
/// Reports what is stored locally; tokens are not checked against the server.
pub fn handle_status(profile: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let active = profile.unwrap_or(&config.profile);
    let records = FileTokenStore::open_default()?.list()?;

    if records.is_empty() {
        println!("Not logged in");
        println!();
        println!("Run 'git-auth auth' to authenticate.");
        return Ok(());
    }

    for record in records {
        let marker = if record.profile == active { "*" } else { " " };
        let expiry = DateTime::<Utc>::from_timestamp(record.expires_at, 0)
            .map_or_else(|| "unknown".to_string(), |at| at.format("%Y-%m-%d %H:%M UTC").to_string());
        let state = if record.is_expired() { "expired" } else { "valid until" };
        println!("{marker} {:<16} {state} {expiry}", record.profile);
    }

    Ok(())
}

/// Handle the `git-auth magic-auth` command.
pub async fn handle_magic_auth(
    profile: Option<&str>,
    no_browser: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let session = Session::open(profile)?;
    let record = login(&session, no_browser, cancel).await?;
    greet(&session.client, &record).await?;

    let report = SshKeyProvisioner::new(&session.client)
        .sync(&session.profile.ssh_prefix)
        .await?;
    print_cleanup(&report);

    provision_key(&session).await
}

/// Resolve stored credentials, falling back to the device flow when there
/// are none or they cannot be refreshed.
async fn login(
    session: &Session,
    no_browser: bool,
    cancel: &CancellationToken,
) -> Result<CredentialRecord> {
    let resolver = session.resolver();
    match resolver.resolve(&session.profile.name).await {
        Err(e) if e.requires_device_flow() => {
            tracing::info!(reason = %e, "starting device authorization");
            let token = device_login(&session.client, no_browser, cancel).await?;
            resolver.persist_grant(&session.profile.name, &token).await
        }
        other => other,
    }
}

async fn device_login(
    client: &GitLabClient,
    no_browser: bool,
    cancel: &CancellationToken,
) -> Result<TokenResponse> {
    let grant = start_device_flow(client).await?;

    println!("To authenticate, please visit:");
    println!();
    println!("  {}", grant.display_uri());
    println!();
    if let Some(code) = grant.code() {
        println!("And confirm the code: {code}");
        println!();
    }

    if !no_browser {
        if open_browser(&grant) {
            println!("Browser opened automatically.");
        } else {
            println!("Could not open browser. Please visit the URL manually.");
        }
        println!();
    }

    println!("Waiting for authorization...");
    let token = poll_for_token(client, &grant, cancel).await?;

    println!("Authorization received!");
    println!();
    Ok(token)
}

async fn greet(client: &GitLabClient, record: &CredentialRecord) -> Result<()> {
    let user = client.get_user(&record.access_token).await?;
    let name = if user.name.is_empty() {
        &user.username
    } else {
        &user.name
    };
    println!("Welcome {name}! (profile '{}')", record.profile);
    Ok(())
}
