//! Client error types.

use derive_more::{Display, Error};

/// What went wrong, following the client's error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ClientErrorKind {
    /// The server (or the local pre-check) refused a move. State is unchanged.
    #[display("Move rejected: {}", _0)]
    Validation(String),
    /// A join named a session the server does not know.
    #[display("Session not found: {}", _0)]
    SessionNotFound(String),
    /// A request or the push channel failed. Never retried automatically.
    #[display("Transport error: {}", _0)]
    Transport(String),
    /// A payload did not match the expected schema.
    #[display("Protocol error: {}", _0)]
    Protocol(String),
    /// The operation is not valid in the current session state.
    #[display("Invalid state: {}", _0)]
    InvalidState(String),
}

/// Client error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{} at {}:{}", kind, file, line)]
pub struct ClientError {
    /// Error classification and message.
    pub kind: ClientErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ClientError {
    /// Creates a new client error with caller location tracking.
    #[track_caller]
    pub fn new(kind: ClientErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a transport failure.
    #[track_caller]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Transport(message.into()))
    }

    /// Shorthand for a schema violation.
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Protocol(message.into()))
    }

    /// Shorthand for an operation attempted in the wrong state.
    #[track_caller]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::InvalidState(message.into()))
    }

    /// Message without location, suitable for the status line.
    pub fn user_message(&self) -> String {
        self.kind.to_string()
    }

    /// True for failures that end the push channel or a request.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::transport(format!("HTTP error: {}", err))
    }
}

impl From<serde_json::Error> for ClientError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    #[track_caller]
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::transport(format!("WebSocket error: {}", err))
    }
}
