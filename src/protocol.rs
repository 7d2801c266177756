//! Wire schema for the game server's REST endpoints and push channel.
//!
//! Everything here is loosely shaped on the wire. Conversion into
//! [`MoveOutcome`](crate::MoveOutcome) and [`SyncSnapshot`](crate::SyncSnapshot)
//! is where payloads are validated.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

use crate::board::Captures;
use crate::types::{PieceKind, SessionId, Side, Square, Winner};

/// Body of `POST /api/move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRequest {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
    /// Position the move is played from.
    pub fen: String,
    /// Promotion piece, if the move promotes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    /// Remote session the move belongs to (host mode).
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Status field of a move response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    /// Move applied.
    Success,
    /// Move refused.
    Rejected,
    /// Move applied and the game ended.
    GameOver,
    /// Older servers report refusals as `error`.
    Error,
}

/// Response of `POST /api/move`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    /// Outcome tag.
    pub status: Option<MoveStatus>,
    /// Position after the move.
    #[serde(alias = "positionEncoding")]
    pub fen: Option<String>,
    /// Side to move after the move.
    pub turn: Option<Side>,
    /// Ply after the move.
    pub ply_count: Option<u32>,
    /// Pieces captured by side A so far.
    pub captured_by_side_a: Option<Captures>,
    /// Pieces captured by side B so far.
    pub captured_by_side_b: Option<Captures>,
    /// Score of side A.
    pub score_a: Option<i32>,
    /// Score of side B.
    pub score_b: Option<i32>,
    /// Check flag.
    pub is_check: Option<bool>,
    /// Checkmate flag.
    pub is_checkmate: Option<bool>,
    /// Winner, on game over.
    pub winner: Option<Winner>,
    /// Human-readable reason, on rejection.
    pub message: Option<String>,
    /// The automated opponent's answer, when the server plays one in the same response.
    #[serde(alias = "aiMove")]
    pub reply_move: Option<String>,
}

/// Body of `POST /api/legal_moves`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegalMovesRequest {
    /// Position to evaluate.
    pub fen: String,
    /// Origin square.
    pub square: Square,
}

/// Response of `POST /api/legal_moves`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegalMovesResponse {
    /// Reachable target squares.
    pub moves: Vec<Square>,
}

/// Response of `GET /api/start_game`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartGameResponse {
    /// Starting position.
    #[serde(alias = "positionEncoding")]
    pub fen: String,
}

/// Response of `POST /api/start_multiplayer_game`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMultiplayerResponse {
    /// Newly created session.
    pub session_id: SessionId,
    /// Starting position.
    #[serde(alias = "positionEncoding")]
    pub fen: String,
}

/// Body of `POST /api/join_game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    /// Session to join.
    pub session_id: SessionId,
}

/// Status of a join response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// Joined.
    Success,
    /// Unknown session or full room.
    Error,
}

/// Response of `POST /api/join_game`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    /// Outcome tag.
    pub status: JoinStatus,
    /// Current position.
    #[serde(alias = "positionEncoding")]
    pub fen: Option<String>,
    /// Moves played so far.
    pub move_log: Option<Vec<String>>,
    /// Reason, on error.
    pub message: Option<String>,
}

/// Response of `GET /api/game_state/{sessionId}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    /// Server-side status, e.g. `active` or `game_over`.
    pub status: Option<String>,
    /// Session the state belongs to, when echoed.
    pub session_id: Option<SessionId>,
    /// Current position.
    #[serde(alias = "positionEncoding")]
    pub fen: String,
    /// Side to move.
    pub turn: Option<Side>,
    /// Every move played.
    #[serde(default)]
    pub move_log: Vec<String>,
    /// Current ply.
    pub ply_count: Option<u32>,
    /// Pieces captured by side A.
    pub captured_by_side_a: Option<Captures>,
    /// Pieces captured by side B.
    pub captured_by_side_b: Option<Captures>,
    /// Score of side A.
    pub score_a: Option<i32>,
    /// Score of side B.
    pub score_b: Option<i32>,
    /// Check flag.
    pub is_check: Option<bool>,
    /// Checkmate flag.
    pub is_checkmate: Option<bool>,
    /// Winner, once the game is over.
    pub winner: Option<Winner>,
}

impl GameStateResponse {
    /// Whether the server reports the game as finished.
    pub fn is_game_over(&self) -> bool {
        matches!(
            self.status.as_deref(),
            Some("game_over") | Some("finished") | Some("checkmate") | Some("stalemate")
        )
    }
}

/// Events the client emits on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Ask the server to open a new remote session.
    CreateGame,
    /// Join an existing session.
    JoinGame {
        /// Session to join.
        session_id: SessionId,
    },
    /// Play a move in a remote session.
    MakeMove {
        /// Session the move belongs to.
        session_id: SessionId,
        /// Origin and destination, e.g. `e7e8`.
        #[serde(rename = "move")]
        squares: String,
        /// Promotion piece, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        promotion: Option<PieceKind>,
    },
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// A session this client asked for was created.
    GameCreated {
        /// Assigned session.
        session_id: SessionId,
        /// Starting position.
        #[serde(alias = "positionEncoding")]
        fen: String,
    },
    /// This client joined a session.
    GameJoined {
        /// Joined session.
        session_id: SessionId,
        /// Current position.
        #[serde(alias = "positionEncoding")]
        fen: String,
    },
    /// A move was applied server-side.
    MoveMade {
        /// Session, when the server echoes it.
        #[serde(default)]
        session_id: Option<SessionId>,
        /// Position after the move.
        #[serde(alias = "positionEncoding")]
        fen: String,
        /// Side to move.
        #[serde(default)]
        turn: Option<Side>,
        /// Ply after the move.
        ply_count: u32,
        /// Notation of the move, when the server includes it.
        #[serde(default, rename = "move")]
        last_move: Option<String>,
    },
    /// The game ended.
    GameOver {
        /// Session, when the server echoes it.
        #[serde(default)]
        session_id: Option<SessionId>,
        /// Winner, absent on a draw.
        #[serde(default)]
        winner: Option<Winner>,
        /// Final position.
        #[serde(alias = "positionEncoding")]
        fen: String,
    },
    /// Hint that the client should re-pull the session.
    SyncGame {
        /// Session to re-pull.
        session_id: SessionId,
    },
    /// Channel-level failure, such as joining an unknown session.
    Error {
        /// Reason.
        message: String,
    },
}

/// Kinds of server events a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// `game_created`
    GameCreated,
    /// `game_joined`
    GameJoined,
    /// `move_made`
    MoveMade,
    /// `game_over`
    GameOver,
    /// `sync_game`
    SyncGame,
    /// `error`
    Error,
}

impl EventKind {
    /// Wire name of the event.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl ServerEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::GameCreated { .. } => EventKind::GameCreated,
            ServerEvent::GameJoined { .. } => EventKind::GameJoined,
            ServerEvent::MoveMade { .. } => EventKind::MoveMade,
            ServerEvent::GameOver { .. } => EventKind::GameOver,
            ServerEvent::SyncGame { .. } => EventKind::SyncGame,
            ServerEvent::Error { .. } => EventKind::Error,
        }
    }
}
