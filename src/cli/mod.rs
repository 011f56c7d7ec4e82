//! CLI module for pgbridge
//!
//! Provides command-line interface for:
//! - serve: Boot the store and engine, then serve HTTP (default)
//! - export: One-shot SQL dump of the store
//! - import: One-shot replay of a SQL script

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{export, import, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
