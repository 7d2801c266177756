//! Client configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::types::PieceKind;

/// Environment variable overriding [`ClientConfig::server_url`].
pub const SERVER_URL_ENV: &str = "STRICTLY_CHESS_SERVER_URL";
/// Environment variable overriding [`ClientConfig::push_url`].
pub const PUSH_URL_ENV: &str = "STRICTLY_CHESS_PUSH_URL";

/// How a remote session is negotiated and how its moves are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTransport {
    /// REST requests; the push channel only listens.
    #[display("direct")]
    Direct,
    /// Events on the push channel.
    #[default]
    #[display("push")]
    Push,
}

/// Settings for the session client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_server_url")]
    server_url: String,

    /// WebSocket URL of the push channel.
    #[serde(default = "default_push_url")]
    push_url: String,

    /// Reconciliation cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Transport for remote sessions.
    #[serde(default)]
    remote_transport: RemoteTransport,

    /// Piece chosen when a promoting move names none.
    #[serde(default = "default_promotion")]
    default_promotion: PieceKind,

    /// Ask the rules oracle before sending a move.
    #[serde(default)]
    precheck_legality: bool,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_push_url() -> String {
    "ws://127.0.0.1:5000/ws".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_promotion() -> PieceKind {
    PieceKind::Queen
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            push_url: default_push_url(),
            poll_interval_ms: default_poll_interval_ms(),
            remote_transport: RemoteTransport::default(),
            default_promotion: default_promotion(),
            precheck_legality: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(server_url = %config.server_url, transport = %config.remote_transport, "Config loaded");
        Ok(config)
    }

    /// Applies the URL environment overrides.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            debug!(%url, "Server URL from environment");
            self.server_url = url;
        }
        if let Ok(url) = std::env::var(PUSH_URL_ENV) {
            debug!(%url, "Push URL from environment");
            self.push_url = url;
        }
        self
    }

    /// Replaces the server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Replaces the push URL.
    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = url.into();
        self
    }

    /// Replaces the remote transport.
    pub fn with_remote_transport(mut self, transport: RemoteTransport) -> Self {
        self.remote_transport = transport;
        self
    }

    /// Replaces the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enables or disables the legality pre-check.
    pub fn with_precheck(mut self, enabled: bool) -> Self {
        self.precheck_legality = enabled;
        self
    }

    /// Reconciliation cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new("poll_interval_ms must be positive".to_string()));
        }
        if !self.default_promotion.is_promotion_target() {
            return Err(ConfigError::new(format!(
                "cannot promote to {}",
                self.default_promotion
            )));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
