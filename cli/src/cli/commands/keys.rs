//! SSH key command handlers.

use std::time::Duration;

use chrono::Utc;

use crate::cli::commands::Session;
use crate::error::Result;
use crate::ssh::{key_title, CleanupReport, SshKeyProvisioner};

/// Handle the `git-auth add-key` command.
pub async fn handle_add_key(profile: Option<&str>) -> Result<()> {
    let session = Session::open(profile)?;
    session.resolver().resolve(&session.profile.name).await?;

    provision_key(&session).await
}

/// Handle the `git-auth clean-keys` command.
pub async fn handle_clean_keys(profile: Option<&str>, key_prefix: Option<String>) -> Result<()> {
    let session = Session::open(profile)?;
    session.resolver().resolve(&session.profile.name).await?;

    let prefix = key_prefix.unwrap_or_else(|| session.profile.ssh_prefix.clone());
    let report = SshKeyProvisioner::new(&session.client).sync(&prefix).await?;
    print_cleanup(&report);

    Ok(())
}

/// Handle the `git-auth list-keys` command.
pub async fn handle_list_keys(profile: Option<&str>, expired: bool) -> Result<()> {
    let session = Session::open(profile)?;
    session.resolver().resolve(&session.profile.name).await?;

    let keys = if expired {
        session.client.expired_ssh_keys().await?
    } else {
        session.client.list_ssh_keys().await?
    };

    if keys.is_empty() {
        println!("No SSH keys found.");
        return Ok(());
    }

    for key in keys {
        match key.expires_at {
            Some(at) => println!("{:>10}  {}  (expires {})", key.id, key.title, at.format("%Y-%m-%d")),
            None => println!("{:>10}  {}", key.id, key.title),
        }
    }

    Ok(())
}

/// Generate and upload a key for the session's profile.
pub(crate) async fn provision_key(session: &Session) -> Result<()> {
    let profile = &session.profile;
    let title = key_title(&profile.ssh_prefix, Utc::now());
    let ttl = profile
        .ssh_key_ttl_hours
        .map(|hours| Duration::from_secs(hours.saturating_mul(3600)));

    println!("Generating SSH key '{title}'...");
    let pair = SshKeyProvisioner::new(&session.client)
        .provision(profile.ssh_path.clone(), profile.name.clone(), title, ttl)
        .await?;

    println!("SSH key added to your account.");
    println!();
    println!("  Private key: {}", pair.private_key_path.display());
    println!("  Public key:  {}", pair.public_key_path.display());

    Ok(())
}

pub(crate) fn print_cleanup(report: &CleanupReport) {
    if report.is_empty() {
        println!("No matching SSH keys to remove.");
        return;
    }

    for deletion in report.deleted() {
        println!("Removed SSH key '{}'", deletion.title);
    }
    for deletion in report.failed() {
        if let Err(e) = &deletion.result {
            println!("Could not remove SSH key '{}': {e}", deletion.title);
        }
    }
}
