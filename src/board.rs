//! Board state mirrored from the server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{PieceKind, Side};

/// Multiset of captured piece kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PieceKind>", into = "Vec<PieceKind>")]
pub struct Captures {
    counts: BTreeMap<PieceKind, u32>,
}

impl Captures {
    /// Creates an empty multiset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of captured pieces.
    pub fn len(&self) -> u32 {
        self.counts.values().sum()
    }

    /// True if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of captured pieces of `kind`.
    pub fn count(&self, kind: PieceKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// True if `self` contains at least every piece in `other`.
    pub fn covers(&self, other: &Captures) -> bool {
        other
            .counts
            .iter()
            .all(|(kind, count)| self.count(*kind) >= *count)
    }

    /// Material value of the captured pieces.
    pub fn score(&self) -> i32 {
        self.counts
            .iter()
            .map(|(kind, count)| kind.value() * *count as i32)
            .sum()
    }

    /// Captured pieces as a flat, ordered list.
    pub fn to_vec(&self) -> Vec<PieceKind> {
        self.counts
            .iter()
            .flat_map(|(kind, count)| std::iter::repeat_n(*kind, *count as usize))
            .collect()
    }
}

impl FromIterator<PieceKind> for Captures {
    fn from_iter<I: IntoIterator<Item = PieceKind>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for kind in iter {
            *counts.entry(kind).or_insert(0) += 1;
        }
        Self { counts }
    }
}

impl From<Vec<PieceKind>> for Captures {
    fn from(pieces: Vec<PieceKind>) -> Self {
        pieces.into_iter().collect()
    }
}

impl From<Captures> for Vec<PieceKind> {
    fn from(captures: Captures) -> Self {
        captures.to_vec()
    }
}

/// The client's mirror of the authoritative board.
///
/// Only [`GameStateStore`](crate::GameStateStore) mutates this; everyone else
/// gets clones or a watch receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardState {
    pub(crate) position: String,
    pub(crate) turn: Option<Side>,
    pub(crate) ply_count: u32,
    pub(crate) move_log: Vec<String>,
    pub(crate) captured_by_white: Captures,
    pub(crate) captured_by_black: Captures,
    pub(crate) score_white: i32,
    pub(crate) score_black: i32,
    pub(crate) is_check: bool,
    pub(crate) is_checkmate: bool,
    pub(crate) finished: bool,
}

impl BoardState {
    /// FEN of the current position. Empty before any session starts.
    pub fn position(&self) -> &str {
        &self.position
    }

    /// Side to move. `None` before a session starts and once the game is over.
    pub fn turn(&self) -> Option<Side> {
        self.turn
    }

    /// Number of half-moves applied; the version of this state.
    pub fn ply_count(&self) -> u32 {
        self.ply_count
    }

    /// Applied moves in order, in long algebraic notation.
    pub fn move_log(&self) -> &[String] {
        &self.move_log
    }

    /// Pieces captured by `side`.
    pub fn captured_by(&self, side: Side) -> &Captures {
        match side {
            Side::White => &self.captured_by_white,
            Side::Black => &self.captured_by_black,
        }
    }

    /// Score of `side`.
    pub fn score(&self, side: Side) -> i32 {
        match side {
            Side::White => self.score_white,
            Side::Black => self.score_black,
        }
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.is_check
    }

    /// Whether the position is checkmate.
    pub fn is_checkmate(&self) -> bool {
        self.is_checkmate
    }

    /// Whether a game-over update has been applied.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move log numbered for display, one entry per full move: `1. e2e4 e7e5`.
    pub fn numbered_moves(&self) -> Vec<String> {
        self.move_log
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| format!("{}. {}", i + 1, pair.join(" ")))
            .collect()
    }
}
