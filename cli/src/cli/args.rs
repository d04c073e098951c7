//! Command-line argument parsing.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// GitLab credentials and SSH keys from the command line.
///
/// Logs in with the OAuth device flow, keeps tokens fresh, and provisions
/// SSH keys for the configured GitLab instance.
#[derive(Parser, Debug)]
#[command(name = "git-auth")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Profile to use instead of the configured default.
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to GitLab, reusing stored credentials when they still work.
    Auth {
        /// Skip opening the browser automatically.
        #[arg(long)]
        no_browser: bool,
    },

    /// Remove stored credentials for the profile.
    Logout,

    /// Show which profiles have stored credentials.
    Status,

    /// Generate a new SSH key and add it to your GitLab account.
    AddKey,

    /// Delete SSH keys whose title starts with a prefix.
    CleanKeys {
        /// Title prefix to match (defaults to the profile's ssh-prefix).
        #[arg(short = 'x', long)]
        key_prefix: Option<String>,
    },

    /// Log in, remove old keys and add a fresh one.
    MagicAuth {
        /// Skip opening the browser automatically.
        #[arg(long)]
        no_browser: bool,
    },

    /// List the SSH keys on your GitLab account.
    ListKeys {
        /// Only show keys whose expiry date has passed.
        #[arg(long)]
        expired: bool,
    },

    /// Write a Host block for the profile into ~/.ssh/config.
    GenerateSshConfig,

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the version.
    Version,
}
