//! CLI module for git-auth.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
