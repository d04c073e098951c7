//! Managed `Host` blocks in the user's OpenSSH client config.
//!
//! Each profile owns one block delimited by marker comments. Rewriting a
//! block replaces only the lines between its markers; everything else in the
//! file is preserved byte for byte.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::Profile;
use crate::error::{GitAuthError, Result};

/// One `Host` entry pointing ssh at a provisioned key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub host: String,
    pub host_name: String,
    pub port: u16,
    pub identity_file: PathBuf,
}

impl HostEntry {
    /// Entry for a profile's key, named after the profile.
    #[must_use]
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            host: profile.ssh_host.clone(),
            host_name: profile.ssh_host.clone(),
            port: profile.ssh_port,
            identity_file: profile.ssh_path.join(&profile.name),
        }
    }

    fn render(&self) -> String {
        format!(
            "Host {}\n    HostName {}\n    Port {}\n    IdentityFile {}\n",
            self.host,
            self.host_name,
            self.port,
            self.identity_file.display()
        )
    }

    fn markers(&self) -> (String, String) {
        (
            format!("# BEGIN GENERATED CONFIG FOR {}", self.host),
            format!("# END GENERATED CONFIG FOR {}", self.host),
        )
    }
}

/// Insert or replace the block for `entry` in `existing` config text.
///
/// # Errors
///
/// Returns [`GitAuthError::Config`] if the begin marker is present without a
/// matching end marker.
pub fn upsert_host_block(existing: &str, entry: &HostEntry) -> Result<String> {
    let (begin, end) = entry.markers();
    let body = entry.render();

    if let Some(start) = find_line(existing, &begin) {
        let after_begin = start + begin.len();
        let end_at = find_line(&existing[after_begin..], &end)
            .map(|offset| after_begin + offset)
            .ok_or_else(|| {
                GitAuthError::Config(format!("SSH config has '{begin}' without '{end}'"))
            })?;

        return Ok(format!(
            "{}\n{body}{}",
            &existing[..after_begin],
            &existing[end_at..]
        ));
    }

    let mut updated = existing.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push('\n');
    updated.push_str(&begin);
    updated.push('\n');
    updated.push_str(&body);
    updated.push_str(&end);
    updated.push('\n');
    Ok(updated)
}

/// Byte offset of the first line of `text` that is exactly `line`.
fn find_line(text: &str, line: &str) -> Option<usize> {
    text.match_indices(line).map(|(at, _)| at).find(|&at| {
        let rest = &text[at + line.len()..];
        let starts_line = at == 0 || text[..at].ends_with('\n');
        let ends_line = rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n");
        starts_line && ends_line
    })
}

/// Apply [`upsert_host_block`] to the file at `path`, creating it if needed.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or written.
pub fn write_host_block(path: &Path, entry: &HostEntry) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let updated = upsert_host_block(&existing, entry)?;
    if updated == existing {
        tracing::debug!(path = %path.display(), "SSH config already up to date");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, updated)?;

    tracing::info!(path = %path.display(), host = %entry.host, "SSH config updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn host_entry(host: &str, port: u16) -> HostEntry {
        HostEntry {
            host: host.to_string(),
            host_name: host.to_string(),
            port,
            identity_file: PathBuf::from("/home/me/.ssh/work"),
        }
    }

    fn entry(port: u16) -> HostEntry {
        host_entry("gitlab.example.com", port)
    }

    #[test]
    fn appends_block_to_empty_config() {
        let config = upsert_host_block("", &entry(22)).unwrap();

        assert_eq!(
            config,
            "\n# BEGIN GENERATED CONFIG FOR gitlab.example.com\n\
             Host gitlab.example.com\n    HostName gitlab.example.com\n    Port 22\n    \
             IdentityFile /home/me/.ssh/work\n\
             # END GENERATED CONFIG FOR gitlab.example.com\n"
        );
    }

    #[test]
    fn preserves_surrounding_content() {
        let before = "Host other\n    User git";
        let config = upsert_host_block(before, &entry(22)).unwrap();

        assert!(config.starts_with("Host other\n    User git\n\n# BEGIN"));
    }

    #[test]
    fn replaces_existing_block_only() {
        let first = upsert_host_block("Host a\n", &entry(22)).unwrap();
        let with_tail = format!("{first}Host z\n");

        let updated = upsert_host_block(&with_tail, &entry(2222)).unwrap();

        assert!(updated.starts_with("Host a\n"));
        assert!(updated.ends_with("# END GENERATED CONFIG FOR gitlab.example.com\nHost z\n"));
        assert!(updated.contains("Port 2222"));
        assert!(!updated.contains("Port 22\n"));
        assert_eq!(updated.matches("# BEGIN GENERATED CONFIG FOR").count(), 1);
    }

    #[test]
    fn upsert_is_idempotent() {
        let once = upsert_host_block("Host a\n", &entry(22)).unwrap();
        let twice = upsert_host_block(&once, &entry(22)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn host_named_as_prefix_of_another_keeps_both_blocks() {
        let internal = upsert_host_block("", &host_entry("gitlab.com.internal", 22)).unwrap();
        let both = upsert_host_block(&internal, &host_entry("gitlab.com", 22)).unwrap();

        assert!(both.starts_with(&internal));
        assert!(both.contains("Host gitlab.com.internal\n"));
        assert!(both.contains("Host gitlab.com\n"));
        assert_eq!(both.matches("# BEGIN GENERATED CONFIG FOR").count(), 2);
        assert_eq!(both.matches("# END GENERATED CONFIG FOR").count(), 2);

        let updated = upsert_host_block(&both, &host_entry("gitlab.com", 2222)).unwrap();
        assert!(updated.starts_with(&internal));
        assert!(updated.ends_with(
            "# BEGIN GENERATED CONFIG FOR gitlab.com\n\
             Host gitlab.com\n    HostName gitlab.com\n    Port 2222\n    \
             IdentityFile /home/me/.ssh/work\n\
             # END GENERATED CONFIG FOR gitlab.com\n"
        ));
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let broken = "# BEGIN GENERATED CONFIG FOR gitlab.example.com\nHost gitlab.example.com\n";
        let err = upsert_host_block(broken, &entry(22)).unwrap_err();
        assert!(matches!(err, GitAuthError::Config(_)));
    }

    #[test]
    fn writes_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".ssh").join("config");

        write_host_block(&path, &entry(22)).unwrap();
        write_host_block(&path, &entry(22)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("Host gitlab.example.com").count(), 1);
    }
}
