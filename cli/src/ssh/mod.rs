//! SSH key generation, upload and client configuration.

pub mod config;
pub mod keys;
pub mod provisioner;

pub use config::{write_host_block, HostEntry};
pub use keys::key_title;
pub use provisioner::{CleanupReport, SshKeyProvisioner};
