//! git-auth - GitLab credentials and SSH keys for the command line
//!
//! Logs in to a GitLab instance with the OAuth device flow, keeps the
//! resulting tokens fresh, and provisions SSH keys for git access.

mod auth;
mod cli;
mod client;
mod config;
mod error;
mod ssh;

use std::io;

use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::settings::env;
use crate::error::{GitAuthError, Result};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("info,git_auth=debug")
    } else {
        EnvFilter::try_from_env(env::LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    // Run the command
    let result = tokio::select! {
        result = run(cli, &cancel) => result,
        () = cancel.cancelled() => Err(GitAuthError::Cancelled),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Auth { no_browser } => {
            cli::commands::handle_auth(profile, no_browser, cancel).await
        }
        Commands::Logout => cli::commands::handle_logout(profile),
        Commands::Status => cli::commands::handle_status(profile),
        Commands::AddKey => cli::commands::handle_add_key(profile).await,
        Commands::CleanKeys { key_prefix } => {
            cli::commands::handle_clean_keys(profile, key_prefix).await
        }
        Commands::MagicAuth { no_browser } => {
            cli::commands::handle_magic_auth(profile, no_browser, cancel).await
        }
        Commands::ListKeys { expired } => cli::commands::handle_list_keys(profile, expired).await,
        Commands::GenerateSshConfig => cli::commands::handle_generate_ssh_config(profile),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "git-auth", &mut io::stdout());
            Ok(())
        }
        Commands::Version => {
            println!("git-auth {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
