//! Local SSH key pair generation.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{LineEnding, PrivateKey};

use crate::error::{GitAuthError, Result};

/// RSA modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 4096;

const TITLE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Paths of a generated key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    /// Title used as the key comment and as the server-side key title.
    pub title: String,
}

/// Server-side title for a key created at `at`: `<prefix>-YYYYMMDD_HHMMSS`.
#[must_use]
pub fn key_title(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}", at.format(TITLE_TIMESTAMP_FORMAT))
}

/// Generate an RSA key pair as `<dir>/<key_name>` and `<dir>/<key_name>.pub`.
///
/// Existing files are overwritten. The private key is readable by the owner
/// only; the public key holds a single `ssh-rsa` line.
///
/// # Errors
///
/// Returns [`GitAuthError::KeyGeneration`] if key material cannot be produced
/// and an I/O error if either file cannot be written.
pub fn generate_pair(dir: &Path, key_name: &str, title: &str) -> Result<KeyPair> {
    generate_pair_with_bits(dir, key_name, title, DEFAULT_KEY_BITS)
}

pub(crate) fn generate_pair_with_bits(
    dir: &Path,
    key_name: &str,
    title: &str,
    bits: usize,
) -> Result<KeyPair> {
    create_key_dir(dir)?;

    let private_key_path = dir.join(key_name);
    let public_key_path = dir.join(format!("{key_name}.pub"));

    tracing::debug!(bits, path = %private_key_path.display(), "generating RSA key pair");
    let keypair = RsaKeypair::random(&mut OsRng, bits)?;
    let private_key = PrivateKey::new(KeypairData::from(keypair), title)?;

    let pem = private_key.to_openssh(LineEnding::LF)?;
    write_private_key(&private_key_path, pem.as_bytes())?;

    let public_line = private_key.public_key().to_openssh()?;
    let mut public_file = File::create(&public_key_path)?;
    public_file.write_all(public_line.as_bytes())?;
    public_file.write_all(b"\n")?;
    public_file.sync_all()?;

    Ok(KeyPair {
        private_key_path,
        public_key_path,
        title: title.to_string(),
    })
}

fn create_key_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .map_err(|e| GitAuthError::KeyGeneration(format!("{}: {e}", dir.display())))
}

/// Write the private key, tightening permissions before any key bytes land.
fn write_private_key(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // `mode` only applies to new files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
