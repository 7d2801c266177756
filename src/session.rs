//! Identity and lifecycle of the active game session.

use derive_more::Display;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::ClientError;
use crate::types::{SessionId, Winner};

/// Game mode chosen by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
pub enum SessionMode {
    /// No mode chosen yet.
    #[default]
    Unselected,
    /// Against the server's automated opponent.
    Solo,
    /// Remote play chosen, session not yet created or joined.
    HostPending,
    /// In a remote session (created or joined).
    JoinedRemote,
}

impl SessionMode {
    /// Whether this mode talks to a remote opponent.
    pub fn is_remote(self) -> bool {
        matches!(self, SessionMode::HostPending | SessionMode::JoinedRemote)
    }
}

/// Lifecycle stage of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
pub enum SessionStatus {
    /// Not playing yet: no mode, or waiting for a create/join acknowledgment.
    #[default]
    Pending,
    /// Moves are being played.
    Active,
    /// The game is over; waiting for the player to acknowledge.
    Terminal,
}

/// The single client-side game session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameSession {
    session_id: Option<SessionId>,
    mode: SessionMode,
    status: SessionStatus,
    winner: Option<Winner>,
}

impl GameSession {
    /// Remote session id, once acknowledged.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Chosen mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Lifecycle stage.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Result, once terminal.
    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// Whether moves can be submitted.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Starts a solo game.
    pub(crate) fn solo() -> Self {
        Self {
            mode: SessionMode::Solo,
            status: SessionStatus::Active,
            ..Self::default()
        }
    }

    /// Waits for a remote create or join.
    pub(crate) fn host_pending() -> Self {
        Self {
            mode: SessionMode::HostPending,
            ..Self::default()
        }
    }

    /// Records the acknowledged remote session. The id is immutable once set.
    #[instrument(skip(self), fields(current = ?self.session_id))]
    pub(crate) fn join_remote(&mut self, id: SessionId) -> Result<(), ClientError> {
        match &self.session_id {
            Some(existing) if *existing != id => {
                warn!(%existing, new = %id, "Refusing to replace session id");
                Err(ClientError::invalid_state(format!(
                    "session {} already assigned",
                    existing
                )))
            }
            _ => {
                debug!(session_id = %id, "Session acknowledged");
                self.session_id = Some(id);
                self.mode = SessionMode::JoinedRemote;
                self.status = SessionStatus::Active;
                Ok(())
            }
        }
    }

    /// Marks the game as over.
    pub(crate) fn finish(&mut self, winner: Winner) {
        self.status = SessionStatus::Terminal;
        self.winner = Some(winner);
    }
}
