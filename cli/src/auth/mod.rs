//! Authentication: token storage, device flow and credential resolution.

pub mod device_flow;
pub mod resolver;
pub mod store;
pub mod tokens;

pub use device_flow::{open_browser, poll_for_token, start_device_flow};
pub use resolver::CredentialResolver;
pub use store::{CredentialStore, FileTokenStore};
pub use tokens::{CredentialRecord, TokenResponse};
