//! Request/response access to the game server.

mod rest;

pub use rest::RestGameApi;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::protocol::{
    GameStateResponse, JoinGameResponse, MoveRequest, MoveResponse, StartMultiplayerResponse,
};
use crate::types::{SessionId, Square};

/// Direct request/response operations the client consumes.
///
/// Every call suspends only its caller. Failures are returned, never retried.
#[async_trait]
pub trait GameApi: Send + Sync + std::fmt::Debug {
    /// Random Fischer setup for a new solo game.
    async fn setup(&self) -> Result<String, ClientError>;

    /// Fresh solo game after a finished one.
    async fn start_game(&self) -> Result<String, ClientError>;

    /// Submits a move and returns the raw verdict.
    async fn make_move(&self, request: &MoveRequest) -> Result<MoveResponse, ClientError>;

    /// Target squares reachable from `square`. Highlighting only.
    async fn legal_moves(&self, fen: &str, square: Square) -> Result<Vec<Square>, ClientError>;

    /// Opens a remote session hosted by this client.
    async fn start_multiplayer_game(&self) -> Result<StartMultiplayerResponse, ClientError>;

    /// Joins an existing remote session.
    async fn join_game(&self, session_id: &SessionId) -> Result<JoinGameResponse, ClientError>;

    /// Full state of a remote session.
    async fn game_state(&self, session_id: &SessionId) -> Result<GameStateResponse, ClientError>;
}
