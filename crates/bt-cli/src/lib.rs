//! Build trace CLI library.
//!
//! This crate provides the CLI interface for replaying build events.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
