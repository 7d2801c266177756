//! Validated results of a move submission and of a state pull.

use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{GameStateResponse, MoveResponse, MoveStatus};
use crate::store::BoardUpdate;
use crate::types::{MoveIntent, SessionId, Winner};

/// Server's verdict on a submitted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move was applied.
    Accepted {
        /// State after the move.
        update: BoardUpdate,
        /// Notation of the applied move.
        applied_move: String,
    },
    /// The move was refused. State is unchanged.
    Rejected {
        /// Reason shown to the player.
        reason: String,
    },
    /// The move ended the game.
    GameOver {
        /// Result of the game.
        winner: Winner,
        /// Final state.
        update: BoardUpdate,
    },
}

impl MoveOutcome {
    /// Message used when the server refuses without saying why.
    pub const DEFAULT_REJECTION: &'static str = "Invalid move.";

    /// Validates a move response.
    ///
    /// `previous_ply` is the store's ply when the move was submitted; it is
    /// the fallback version when the server omits `plyCount`.
    pub fn from_response(
        response: MoveResponse,
        intent: &MoveIntent,
        previous_ply: u32,
    ) -> Result<Self, ClientError> {
        let status = response.status.ok_or_else(|| {
            ClientError::protocol("move response without status")
        })?;

        if matches!(status, MoveStatus::Rejected | MoveStatus::Error) {
            let reason = response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| Self::DEFAULT_REJECTION.to_string());
            return Ok(MoveOutcome::Rejected { reason });
        }

        let fen = response
            .fen
            .clone()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ClientError::protocol("accepted move without position"))?;

        let applied_move = intent.notation();
        let mut new_moves = vec![applied_move.clone()];
        if let Some(reply) = response.reply_move.clone() {
            new_moves.push(reply);
        }
        let ply_count = response
            .ply_count
            .unwrap_or(previous_ply + new_moves.len() as u32);
        debug!(ply_count, previous_ply, ?new_moves, "Validated move response");

        let update = BoardUpdate {
            ply_count,
            position: fen,
            turn: response.turn,
            new_moves,
            move_log: None,
            captured_by_white: response.captured_by_side_a,
            captured_by_black: response.captured_by_side_b,
            score_white: response.score_a,
            score_black: response.score_b,
            is_check: response.is_check,
            is_checkmate: response.is_checkmate,
            terminal: status == MoveStatus::GameOver,
        };

        Ok(match status {
            MoveStatus::GameOver => MoveOutcome::GameOver {
                winner: response.winner.unwrap_or(Winner::Draw),
                update,
            },
            _ => MoveOutcome::Accepted {
                update,
                applied_move,
            },
        })
    }
}

/// Full session state pulled from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    /// Session the snapshot belongs to.
    pub session_id: SessionId,
    /// State as a board update carrying the full move log.
    pub board: BoardUpdate,
    /// Ply of the snapshot.
    pub ply_count: u32,
    /// Winner, if the server reports the game as over.
    pub winner: Option<Winner>,
}

impl SyncSnapshot {
    /// Validates a `game_state` response for `requested`.
    ///
    /// A response naming a different session is a protocol error.
    pub fn from_response(
        response: GameStateResponse,
        requested: &SessionId,
    ) -> Result<Self, ClientError> {
        if let Some(echoed) = &response.session_id
            && echoed != requested
        {
            return Err(ClientError::protocol(format!(
                "state for session {} returned for {}",
                echoed, requested
            )));
        }

        let ply_count = response.ply_count.unwrap_or(response.move_log.len() as u32);
        if ply_count as usize != response.move_log.len() {
            return Err(ClientError::protocol(format!(
                "snapshot ply {} does not match move log of {}",
                ply_count,
                response.move_log.len()
            )));
        }

        let terminal = response.is_game_over();
        let winner = terminal.then(|| response.winner.unwrap_or(Winner::Draw));

        Ok(Self {
            session_id: requested.clone(),
            board: BoardUpdate {
                ply_count,
                position: response.fen,
                turn: response.turn,
                new_moves: Vec::new(),
                move_log: Some(response.move_log),
                captured_by_white: response.captured_by_side_a,
                captured_by_black: response.captured_by_side_b,
                score_white: response.score_a,
                score_black: response.score_b,
                is_check: response.is_check,
                is_checkmate: response.is_checkmate,
                terminal,
            },
            ply_count,
            winner,
        })
    }

    /// Whether the server considers the game over.
    pub fn is_terminal(&self) -> bool {
        self.board.terminal
    }
}
