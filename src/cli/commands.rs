//! CLI command implementations
//!
//! Every command follows the same boot sequence before doing its work:
//! 1. Prepare the store directory (create, write check, stale lock)
//! 2. Start the embedded engine and open the session
//! 3. Bootstrap the schema
//!
//! Any failure before the work starts is fatal. The engine is stopped on
//! the way out whether the work succeeded or not.

use std::path::{Path, PathBuf};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dump;
use crate::engine::EmbeddedPostgres;
use crate::http_server::{AppState, HttpServer};
use crate::schema;
use crate::storage::StoreLocation;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_script, write_script};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let command = cli.command.unwrap_or_default();

    let mut config = Config::from_env();
    command.apply(&mut config);
    init_logging(&config.log_level)?;

    run_command(command, config)
}

/// Install the global tracing subscriber
fn init_logging(filter: &str) -> CliResult<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| CliError::config_error(format!("Invalid log filter '{}': {}", filter, e)))?;

    // A subscriber may already be installed when embedded in a host binary
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Run the appropriate command based on CLI args
pub fn run_command(command: Command, config: Config) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        match command {
            Command::Serve { .. } => serve(config).await,
            Command::Export { output, .. } => export(config, output).await,
            Command::Import { file, .. } => import(config, &file).await,
        }
    })
}

/// Store, engine and schema, ready for work
async fn boot(config: &Config) -> CliResult<(StoreLocation, EmbeddedPostgres)> {
    let location = StoreLocation::prepare(&config.data_dir)?;
    let engine = EmbeddedPostgres::open(&location, &config.engine).await?;

    if let Err(e) = schema::bootstrap(&engine.session()).await {
        stop(engine).await;
        return Err(e.into());
    }

    Ok((location, engine))
}

async fn stop(engine: EmbeddedPostgres) {
    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "engine shutdown failed");
    }
}

/// Serve HTTP until Ctrl-C or SIGTERM
pub async fn serve(config: Config) -> CliResult<()> {
    let (location, engine) = boot(&config).await?;

    let state = AppState::new(engine.session(), location.path());
    let server = HttpServer::with_config(config.server.clone(), state);
    info!(addr = %server.socket_addr(), data_dir = %location.path().display(), "starting server");

    let result = server
        .start(shutdown_signal())
        .await
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)));

    stop(engine).await;
    result
}

/// Dump the store to `output` (stdout when `None`)
pub async fn export(config: Config, output: Option<PathBuf>) -> CliResult<()> {
    let (_, engine) = boot(&config).await?;

    let result = dump::export(&engine.session()).await;
    stop(engine).await;

    let dump = result?;
    write_script(output.as_deref(), &dump.sql)?;
    info!(tables = dump.tables, rows = dump.rows, "export written");
    Ok(())
}

/// Replay the script at `file` against the store
pub async fn import(config: Config, file: &Path) -> CliResult<()> {
    let script = read_script(file)?;
    let (_, engine) = boot(&config).await?;

    let result = dump::import(&engine.session(), &script).await;
    stop(engine).await;

    result?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
