//! GitLab HTTP client.

pub mod api;
mod middleware;
pub mod types;

pub use api::{ClientOptions, GitLabClient};
