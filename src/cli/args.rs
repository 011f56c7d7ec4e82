//! CLI argument definitions using clap
//!
//! Commands:
//! - pgbridge [serve] [--host <addr>] [--port <port>] [--data-dir <dir>]
//! - pgbridge export [--data-dir <dir>] [--output <file>]
//! - pgbridge import [--data-dir <dir>] <file>
//!
//! Flags override the matching environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// HTTP/JSON access to an embedded PostgreSQL store
#[derive(Parser, Debug)]
#[command(name = "pgbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Parent directory of the store (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Write a SQL dump of the store without starting the server
    Export {
        /// Parent directory of the store (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replay a SQL script against the store without starting the server
    Import {
        /// Parent directory of the store (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Script to replay; `-` reads stdin
        file: PathBuf,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve {
            host: None,
            port: None,
            data_dir: None,
        }
    }
}

impl Command {
    /// Apply flag overrides on top of `config`
    pub fn apply(&self, config: &mut Config) {
        let data_dir = match self {
            Command::Serve {
                host,
                port,
                data_dir,
            } => {
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
                data_dir
            }
            Command::Export { data_dir, .. } | Command::Import { data_dir, .. } => data_dir,
        };
        if let Some(dir) = data_dir {
            config.data_dir = dir.clone();
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
