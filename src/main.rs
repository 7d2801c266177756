//! Strictly Chess - terminal client
//!
//! Loads configuration, wires the REST and push transports into a
//! session controller and hands it to the terminal UI.

#![warn(missing_docs)]

mod cli;
mod tui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, TransportArg};
use std::sync::Arc;
use strictly_chess::{
    ClientConfig, RemoteTransport, RestGameApi, ServerOracle, SessionController, WsConnector,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use tui::Opening;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    initialize_tracing(&cli.log_file)?;

    let config = load_config(&cli)?;
    info!(
        server_url = %config.server_url(),
        push_url = %config.push_url(),
        transport = %config.remote_transport(),
        "Configuration resolved"
    );

    let api = Arc::new(RestGameApi::new(config.server_url(), config.request_timeout())?);
    let oracle = Arc::new(ServerOracle::new(api.clone()));
    let connector = Arc::new(WsConnector::new(config.push_url().clone()));
    let controller = SessionController::new(config, api, oracle).with_connector(connector);

    let opening = match cli.command {
        None => Opening::Menu,
        Some(Command::Solo) => Opening::Solo,
        Some(Command::Host) => Opening::Host,
        Some(Command::Join { session_id }) => Opening::Join(session_id),
    };

    tui::run_tui(controller, opening).await
}

/// Config file, then environment, then flags.
#[instrument(skip(cli), fields(config_path = %cli.config.display()))]
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = if cli.config.exists() {
        ClientConfig::from_file(&cli.config)?
    } else {
        info!("Config file not found, using defaults");
        ClientConfig::default()
    }
    .with_env_overrides();

    if let Some(url) = &cli.server_url {
        config = config.with_server_url(url.clone());
    }
    if let Some(url) = &cli.push_url {
        config = config.with_push_url(url.clone());
    }
    if let Some(transport) = cli.transport {
        config = config.with_remote_transport(match transport {
            TransportArg::Direct => RemoteTransport::Direct,
            TransportArg::Push => RemoteTransport::Push,
        });
    }
    Ok(config)
}

/// Logs go to a file so they do not interfere with the TUI.
fn initialize_tracing(path: &std::path::Path) -> Result<()> {
    let log_file = std::fs::File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
