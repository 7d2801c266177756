//! Game state store: the single writer-facing mirror of the board.
//!
//! Push notifications, poll snapshots and move results all arrive here as a
//! [`StateUpdateEvent`]. Ordering is enforced by data, not locks: every update
//! carries the ply it describes, and [`reduce`] refuses anything behind the
//! current ply. Updates at the current ply overwrite the position fields; a
//! move log tail they contradict is replaced so the log always describes the
//! position. The same update applied twice is a no-op.

use derive_more::Display;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::board::{BoardState, Captures};
use crate::fen;
use crate::types::Side;

/// Which channel produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UpdateSource {
    /// Server-pushed notification.
    #[display("push")]
    Push,
    /// Periodic or forced full-state pull.
    #[display("poll")]
    Poll,
    /// Response to a submitted move.
    #[display("move_result")]
    MoveResult,
}

/// Validated payload shared by all update sources.
///
/// Optional fields mean "the source did not say"; the reducer keeps or
/// derives the current value instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardUpdate {
    /// Ply this update describes.
    pub ply_count: u32,
    /// FEN after the update.
    pub position: String,
    /// Side to move, if reported.
    pub turn: Option<Side>,
    /// Notation of the plies this update adds, oldest first.
    pub new_moves: Vec<String>,
    /// Complete move log, when the source has it (poll, join).
    pub move_log: Option<Vec<String>>,
    /// Pieces captured by side A.
    pub captured_by_white: Option<Captures>,
    /// Pieces captured by side B.
    pub captured_by_black: Option<Captures>,
    /// Score of side A.
    pub score_white: Option<i32>,
    /// Score of side B.
    pub score_black: Option<i32>,
    /// Check flag.
    pub is_check: Option<bool>,
    /// Checkmate flag.
    pub is_checkmate: Option<bool>,
    /// The game ended with this update.
    pub terminal: bool,
}

impl BoardUpdate {
    /// A ply-0 baseline: the starting position of a fresh session.
    pub fn baseline(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            ..Self::default()
        }
    }
}

/// Log entry for a ply the server applied without naming it.
pub const UNKNOWN_MOVE: &str = "?";

/// A tagged update from one of the three writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdateEvent {
    /// From the event stream listener.
    FromPush(BoardUpdate),
    /// From the reconciliation scheduler.
    FromPoll(BoardUpdate),
    /// From the move submission pipeline.
    FromMoveResult(BoardUpdate),
}

impl StateUpdateEvent {
    /// Ply carried by the update.
    pub fn ply_count(&self) -> u32 {
        self.update().ply_count
    }

    /// Channel the update came from.
    pub fn source(&self) -> UpdateSource {
        match self {
            StateUpdateEvent::FromPush(_) => UpdateSource::Push,
            StateUpdateEvent::FromPoll(_) => UpdateSource::Poll,
            StateUpdateEvent::FromMoveResult(_) => UpdateSource::MoveResult,
        }
    }

    /// The payload.
    pub fn update(&self) -> &BoardUpdate {
        match self {
            StateUpdateEvent::FromPush(u)
            | StateUpdateEvent::FromPoll(u)
            | StateUpdateEvent::FromMoveResult(u) => u,
        }
    }

    fn update_mut(&mut self) -> &mut BoardUpdate {
        match self {
            StateUpdateEvent::FromPush(u)
            | StateUpdateEvent::FromPoll(u)
            | StateUpdateEvent::FromMoveResult(u) => u,
        }
    }

    /// Rewrites the update to carry a full log: `known`, then the moves the
    /// update names, then [`UNKNOWN_MOVE`] for every ply it leaves unnamed.
    ///
    /// Only for sessions that have no full-state pull to recover the real
    /// notation from.
    #[instrument(skip(self, known), fields(known = known.len(), incoming = self.ply_count()))]
    pub fn with_unnamed_plies(mut self, known: &[String]) -> Self {
        let update = self.update_mut();
        let mut log: Vec<String> = known.iter().chain(update.new_moves.iter()).cloned().collect();
        log.resize(update.ply_count as usize, UNKNOWN_MOVE.to_string());
        debug!(unnamed = log.iter().filter(|m| m.as_str() == UNKNOWN_MOVE).count(), "Filled unnamed plies");
        update.move_log = Some(log);
        self
    }
}

/// What [`GameStateStore::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// State changed; subscribers were notified.
    Applied,
    /// Accepted, but identical to the current state.
    Unchanged,
    /// Discarded: older than the current state.
    Stale {
        /// Store ply.
        current: u32,
        /// Update ply.
        incoming: u32,
    },
    /// Discarded: its moves do not line up with the log (it skips plies it
    /// does not name, or names more than the log holds), so applying it would
    /// desynchronize the log. A full pull is needed.
    NeedsResync {
        /// Store ply.
        current: u32,
        /// Update ply.
        incoming: u32,
    },
}

/// Result of running the pure reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// The next state.
    Next(BoardState),
    /// Update is behind the current ply.
    Stale,
    /// Update skips plies it cannot name.
    NeedsResync,
}

/// Pure reducer: computes the state after `event`, or why it is refused.
#[instrument(level = "trace", skip_all, fields(source = %event.source(), incoming = event.ply_count(), current = state.ply_count))]
pub fn reduce(state: &BoardState, event: &StateUpdateEvent) -> Reduction {
    let update = event.update();
    let current = state.ply_count;
    let incoming = update.ply_count;

    if incoming < current {
        return Reduction::Stale;
    }

    let mut next = state.clone();
    let advanced = incoming > current;

    if advanced {
        let added = (incoming - current) as usize;
        match &update.move_log {
            Some(log) if log.len() == incoming as usize => {
                if !log.starts_with(&state.move_log) {
                    warn!(
                        source = %event.source(),
                        "Server move log diverges from local log, taking server's"
                    );
                }
                next.move_log = log.clone();
            }
            _ if update.new_moves.len() == added => {
                next.move_log.extend(update.new_moves.iter().cloned());
            }
            _ => return Reduction::NeedsResync,
        }
        next.ply_count = incoming;
    } else if let Some(log) = update
        .move_log
        .as_ref()
        .filter(|log| log.len() == incoming as usize)
    {
        if *log != state.move_log {
            warn!(
                source = %event.source(),
                "Server move log differs at the same ply, taking server's"
            );
            next.move_log = log.clone();
        }
    } else if !update.new_moves.is_empty() {
        // A different move landed on this ply, e.g. two submissions raced.
        let Some(tail) = state.move_log.len().checked_sub(update.new_moves.len()) else {
            return Reduction::NeedsResync;
        };
        if state.move_log[tail..] != update.new_moves[..] {
            warn!(
                source = %event.source(),
                replaced = ?&state.move_log[tail..],
                with = ?update.new_moves,
                "Same-ply update names other moves, replacing log tail"
            );
            next.move_log.truncate(tail);
            next.move_log.extend(update.new_moves.iter().cloned());
        }
    }

    next.position = update.position.clone();
    next.finished = update.terminal || (state.finished && !advanced);
    next.turn = if next.finished {
        None
    } else {
        update
            .turn
            .or_else(|| fen::side_to_move(&update.position))
            .or(Some(Side::from_ply(incoming)))
    };

    merge_captures(&mut next.captured_by_white, update.captured_by_white.as_ref(), event.source());
    merge_captures(&mut next.captured_by_black, update.captured_by_black.as_ref(), event.source());

    next.score_white = update
        .score_white
        .unwrap_or_else(|| next.captured_by_white.score());
    next.score_black = update
        .score_black
        .unwrap_or_else(|| next.captured_by_black.score());

    next.is_check = update
        .is_check
        .unwrap_or(if advanced { false } else { state.is_check });
    next.is_checkmate = update
        .is_checkmate
        .unwrap_or(if advanced { false } else { state.is_checkmate });

    Reduction::Next(next)
}

/// Captured multisets only grow. A report that would lose a piece is ignored.
#[instrument(level = "trace", skip(current, incoming))]
fn merge_captures(current: &mut Captures, incoming: Option<&Captures>, source: UpdateSource) {
    match incoming {
        Some(reported) if reported.covers(current) => *current = reported.clone(),
        Some(reported) => {
            warn!(
                %source,
                current = current.len(),
                reported = reported.len(),
                "Ignoring capture report that would shrink the captured set"
            );
        }
        None => {}
    }
}

/// Owner of the client's [`BoardState`].
#[derive(Debug)]
pub struct GameStateStore {
    state: BoardState,
    subscribers: watch::Sender<BoardState>,
}

impl GameStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (subscribers, _) = watch::channel(BoardState::default());
        Self {
            state: BoardState::default(),
            subscribers,
        }
    }

    /// Current state.
    pub fn current(&self) -> &BoardState {
        &self.state
    }

    /// Receiver that sees every state change.
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.subscribers.subscribe()
    }

    /// Applies an update under the staleness guard.
    ///
    /// Subscribers are notified before this returns, and only when the state
    /// actually changed.
    #[instrument(skip(self, event), fields(source = %event.source(), incoming = event.ply_count(), current = self.state.ply_count))]
    pub fn apply(&mut self, event: StateUpdateEvent) -> ApplyOutcome {
        let current = self.state.ply_count;
        let incoming = event.ply_count();
        match reduce(&self.state, &event) {
            Reduction::Stale => {
                debug!("Discarding stale update");
                ApplyOutcome::Stale { current, incoming }
            }
            Reduction::NeedsResync => {
                debug!("Update skips unnamed plies, full pull required");
                ApplyOutcome::NeedsResync { current, incoming }
            }
            Reduction::Next(next) if next == self.state => ApplyOutcome::Unchanged,
            Reduction::Next(next) => {
                debug!(ply = next.ply_count, "Applied update");
                self.state = next;
                self.subscribers.send_replace(self.state.clone());
                ApplyOutcome::Applied
            }
        }
    }

    /// Clears the board back to the pre-session state. Bypasses the guard.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        debug!("Resetting board state");
        self.state = BoardState::default();
        self.subscribers.send_replace(self.state.clone());
    }
}

impl Default for GameStateStore {
    fn default() -> Self {
        Self::new()
    }
}
