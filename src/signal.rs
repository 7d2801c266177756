//! Messages flowing into and out of the session controller.

use derive_more::Display;

use crate::error::ClientError;
use crate::outcome::{MoveOutcome, SyncSnapshot};
use crate::protocol::ServerEvent;
use crate::session::GameSession;
use crate::types::{MoveIntent, SessionId, Square, Winner};

/// Activation counter. Signals carry the generation that produced them so a
/// late continuation from a torn-down session can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Display)]
pub struct Generation(u64);

impl Generation {
    /// The following generation.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Completed continuation reported back to the controller loop.
#[derive(Debug)]
pub enum SessionSignal {
    /// The listener received a subscribed event.
    Push {
        /// Producer's generation.
        generation: Generation,
        /// The event.
        event: ServerEvent,
    },
    /// The listener's channel ended.
    ChannelClosed {
        /// Producer's generation.
        generation: Generation,
        /// Why, if it failed.
        error: Option<ClientError>,
    },
    /// The scheduler finished a pull.
    Snapshot {
        /// Producer's generation.
        generation: Generation,
        /// Session that was pulled.
        session_id: SessionId,
        /// The validated snapshot or the failure.
        result: Result<SyncSnapshot, ClientError>,
    },
    /// The pipeline got a verdict on a move.
    MoveResult {
        /// Producer's generation.
        generation: Generation,
        /// The submitted move.
        intent: MoveIntent,
        /// The verdict or the failure.
        result: Result<MoveOutcome, ClientError>,
    },
}

impl SessionSignal {
    /// Generation that produced the signal.
    pub fn generation(&self) -> Generation {
        match self {
            SessionSignal::Push { generation, .. }
            | SessionSignal::ChannelClosed { generation, .. }
            | SessionSignal::Snapshot { generation, .. }
            | SessionSignal::MoveResult { generation, .. } => *generation,
        }
    }
}

/// User-visible notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Notification {
    /// The session changed mode or status.
    #[display("Session: {} / {}", _0.mode(), _0.status())]
    SessionChanged(GameSession),
    /// A move was refused.
    #[display("{}: {}", square, reason)]
    MoveRejected {
        /// Target square of the refused move, for flashing.
        square: Square,
        /// Reason.
        reason: String,
    },
    /// A join named an unknown session.
    #[display("Session not found: {}", _0)]
    SessionNotFound(String),
    /// A request or the channel failed.
    #[display("{}", _0)]
    TransportFailed(String),
    /// Anything else worth telling the player: a refused operation or a
    /// server-side error message.
    #[display("{}", _0)]
    Message(String),
    /// The game ended.
    #[display("Game over: {}", _0)]
    GameOver(Winner),
}
