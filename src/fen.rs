//! Read-only helpers over FEN position strings.
//!
//! These never judge legality. They only answer "what sits on this square"
//! and "whose turn does the encoding say it is", which is enough for
//! promotion detection and for filling a missing `turn` field.

use tracing::instrument;

use crate::types::{PieceKind, Side, Square};

/// Piece placement field of a FEN string, if present.
#[instrument(level = "trace")]
fn placement(fen: &str) -> Option<&str> {
    fen.split_whitespace().next()
}

/// Returns the piece on `square`, or `None` if empty or unparseable.
#[instrument(level = "trace", fields(%square))]
pub fn piece_at(fen: &str, square: Square) -> Option<(Side, PieceKind)> {
    let rows: Vec<&str> = placement(fen)?.split('/').collect();
    if rows.len() != 8 {
        return None;
    }
    // FEN lists rank 8 first.
    let row = rows[8 - square.rank() as usize];
    let mut file = 0u8;
    for c in row.chars() {
        if let Some(skip) = c.to_digit(10) {
            file = file.saturating_add(skip as u8);
            continue;
        }
        if file == square.file() {
            let side = if c.is_ascii_uppercase() { Side::White } else { Side::Black };
            return PieceKind::from_char(c).map(|kind| (side, kind));
        }
        file = file.saturating_add(1);
        if file > square.file() {
            break;
        }
    }
    None
}

/// Side to move according to the active-color field.
#[instrument(level = "trace")]
pub fn side_to_move(fen: &str) -> Option<Side> {
    fen.split_whitespace().nth(1).and_then(Side::parse)
}
