//! Command-line interface for strictly_chess.

use clap::{Parser, Subcommand, ValueEnum};

/// Strictly Chess - terminal client for a server-authoritative chess game
#[derive(Parser, Debug)]
#[command(name = "strictly_chess")]
#[command(about = "Play Fischer-random chess against a server or a remote opponent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file (optional)
    #[arg(short, long, default_value = "strictly_chess.toml")]
    pub config: std::path::PathBuf,

    /// Game server REST URL, overriding config and environment
    #[arg(long)]
    pub server_url: Option<String>,

    /// Push channel WebSocket URL, overriding config and environment
    #[arg(long)]
    pub push_url: Option<String>,

    /// Transport for remote sessions
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Log file (the terminal belongs to the board)
    #[arg(long, default_value = "strictly_chess.log")]
    pub log_file: std::path::PathBuf,

    /// Subcommand to run; opens the menu when absent
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play against the server
    Solo,

    /// Create a remote session and wait for an opponent
    Host,

    /// Join a remote session
    Join {
        /// Session id shared by the host
        session_id: String,
    },
}

/// Remote transport selectable from the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TransportArg {
    /// REST requests
    Direct,
    /// Push channel events
    Push,
}
