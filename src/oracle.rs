//! Non-authoritative rules oracle used for highlighting and move pre-checks.
//!
//! The server is the only judge of legality. The oracle is consulted to
//! highlight targets and, optionally, to skip a round trip for moves that are
//! obviously illegal.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::api::GameApi;
use crate::error::ClientError;
use crate::fen;
use crate::types::{MoveIntent, PieceKind, Side, Square};

/// Answers "where can the piece on this square go".
#[async_trait]
pub trait RulesOracle: Send + Sync + std::fmt::Debug {
    /// Squares reachable from `from` in `position`.
    async fn legal_targets(&self, position: &str, from: Square) -> Result<Vec<Square>, ClientError>;
}

/// Oracle backed by the server's `legal_moves` route.
#[derive(Debug, Clone)]
pub struct ServerOracle {
    api: Arc<dyn GameApi>,
}

impl ServerOracle {
    /// Creates an oracle that asks `api`.
    pub fn new(api: Arc<dyn GameApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RulesOracle for ServerOracle {
    #[instrument(skip(self, position), fields(from = %from))]
    async fn legal_targets(&self, position: &str, from: Square) -> Result<Vec<Square>, ClientError> {
        self.api.legal_moves(position, from).await
    }
}

/// Whether `intent` moves a pawn of the side to move onto its last rank.
pub fn is_promotion(position: &str, intent: &MoveIntent) -> bool {
    let Some((side, PieceKind::Pawn)) = fen::piece_at(position, intent.from) else {
        return false;
    };
    if fen::side_to_move(position).is_some_and(|to_move| to_move != side) {
        return false;
    }
    let (from_rank, to_rank) = match side {
        Side::White => (7, 8),
        Side::Black => (2, 1),
    };
    intent.from.rank() == from_rank && intent.to.rank() == to_rank
}

/// Fills in the promotion piece for promoting moves, and drops a stray one
/// from moves that do not promote.
#[instrument(skip(position), fields(intent = %intent))]
pub fn resolve_promotion(position: &str, intent: MoveIntent, default: PieceKind) -> MoveIntent {
    if is_promotion(position, &intent) {
        let kind = intent.promotion.unwrap_or(default);
        debug!(promotion = %kind, "Move promotes");
        intent.with_promotion(kind)
    } else {
        MoveIntent {
            promotion: None,
            ..intent
        }
    }
}
