//! SSH client configuration command handler.

use crate::config::load_config;
use crate::config::paths::ssh_config_file;
use crate::error::Result;
use crate::ssh::{write_host_block, HostEntry};

/// Handle the `git-auth generate-ssh-config` command.
pub fn handle_generate_ssh_config(profile: Option<&str>) -> Result<()> {
    let profile = load_config()?.resolve_profile(profile)?;
    let entry = HostEntry::for_profile(&profile);
    let path = ssh_config_file()?;

    write_host_block(&path, &entry)?;

    println!("SSH config for '{}' written to {}", entry.host, path.display());
    Ok(())
}
