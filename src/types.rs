//! Core domain types shared by every component of the client.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ClientError, ClientErrorKind};

/// One of the two sides of the board.
///
/// White is "side A" on the wire and always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Side {
    /// Side A, moves first.
    #[display("white")]
    White,
    /// Side B.
    #[display("black")]
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Side to move after `ply` half-moves from the initial position.
    pub fn from_ply(ply: u32) -> Self {
        if ply % 2 == 0 { Side::White } else { Side::Black }
    }

    /// Parses the side spellings used by the server and push channel.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "w" | "white" | "a" | "sidea" | "side_a" => Some(Side::White),
            "b" | "black" | "sideb" | "side_b" => Some(Side::Black),
            _ => None,
        }
    }
}

impl TryFrom<String> for Side {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Side::parse(&raw)
            .ok_or_else(|| ClientError::new(ClientErrorKind::Protocol(format!("unknown side '{}'", raw))))
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        match side {
            Side::White => "w".to_string(),
            Side::Black => "b".to_string(),
        }
    }
}

/// Result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Winner {
    /// One side won.
    #[display("{} wins", _0)]
    Side(Side),
    /// Drawn game (stalemate, repetition, agreement).
    #[display("draw")]
    Draw,
}

impl TryFrom<String> for Winner {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draw" | "none" | "" => Ok(Winner::Draw),
            other => Side::parse(other).map(Winner::Side).ok_or_else(|| {
                ClientError::new(ClientErrorKind::Protocol(format!("unknown winner '{}'", raw)))
            }),
        }
    }
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Side(Side::White) => "SideA".to_string(),
            Winner::Side(Side::Black) => "SideB".to_string(),
            Winner::Draw => "draw".to_string(),
        }
    }
}

/// Kind of chess piece, independent of color.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum PieceKind {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
}

impl PieceKind {
    /// Parses a FEN / UCI piece letter in either case.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Lowercase piece letter as used in UCI promotion suffixes.
    pub fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// Material value used for capture scores.
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight | PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    /// Whether a pawn may promote to this kind.
    pub fn is_promotion_target(self) -> bool {
        !matches!(self, PieceKind::Pawn | PieceKind::King)
    }
}

impl TryFrom<String> for PieceKind {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => PieceKind::from_char(c),
            _ => match raw.trim().to_ascii_lowercase().as_str() {
                "pawn" => Some(PieceKind::Pawn),
                "knight" => Some(PieceKind::Knight),
                "bishop" => Some(PieceKind::Bishop),
                "rook" => Some(PieceKind::Rook),
                "queen" => Some(PieceKind::Queen),
                "king" => Some(PieceKind::King),
                _ => None,
            },
        }
        .ok_or_else(|| ClientError::new(ClientErrorKind::Protocol(format!("unknown piece '{}'", raw))))
    }
}

impl From<PieceKind> for String {
    fn from(kind: PieceKind) -> Self {
        kind.to_char().to_string()
    }
}

/// A board square, `a1` through `h8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Creates a square from zero-based file and rank indices.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    /// Zero-based file index (`a` = 0).
    pub fn file(self) -> u8 {
        self.file
    }

    /// One-based rank number as printed on the board.
    pub fn rank(self) -> u8 {
        self.rank + 1
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let bytes = raw.trim().as_bytes();
        let invalid =
            || ClientError::new(ClientErrorKind::Validation(format!("invalid square '{}'", raw)));
        if bytes.len() != 2 {
            return Err(invalid());
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Square {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

/// A move the local player wants to make. Consumed once by the submission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
    /// Piece to promote to, if any.
    pub promotion: Option<PieceKind>,
}

impl MoveIntent {
    /// Creates a move without promotion.
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Sets the promotion piece.
    pub fn with_promotion(mut self, kind: PieceKind) -> Self {
        self.promotion = Some(kind);
        self
    }

    /// Origin and destination without the promotion suffix, e.g. `e7e8`.
    pub fn squares(&self) -> String {
        format!("{}{}", self.from, self.to)
    }

    /// Long algebraic notation recorded in the move log, e.g. `a2a4` or `e7e8q`.
    pub fn notation(&self) -> String {
        match self.promotion {
            Some(kind) => format!("{}{}", self.squares(), kind.to_char()),
            None => self.squares(),
        }
    }
}

impl std::fmt::Display for MoveIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.notation())
    }
}

impl FromStr for MoveIntent {
    type Err = ClientError;

    /// Parses `e2e4`, `e2-e4` or `e7e8q`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();
        if !compact.is_ascii() || (compact.len() != 4 && compact.len() != 5) {
            return Err(ClientError::new(ClientErrorKind::Validation(format!(
                "invalid move '{}'",
                raw
            ))));
        }
        let from: Square = compact[0..2].parse()?;
        let to: Square = compact[2..4].parse()?;
        let mut intent = MoveIntent::new(from, to);
        if let Some(c) = compact[4..].chars().next() {
            let kind = PieceKind::from_char(c)
                .filter(|k| k.is_promotion_target())
                .ok_or_else(|| {
                    ClientError::new(ClientErrorKind::Validation(format!(
                        "invalid promotion '{}'",
                        c
                    )))
                })?;
            intent = intent.with_promotion(kind);
        }
        Ok(intent)
    }
}

/// Opaque identifier of a remote session, assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id, rejecting blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ClientError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::new(ClientErrorKind::Validation(
                "session id must not be empty".to_string(),
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
