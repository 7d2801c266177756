//! Strictly Chess library - session client for a server-authoritative chess game
//!
//! The server owns the rules and the board. This crate keeps a faithful local
//! mirror of it, whatever order pushes, polls and move results arrive in.
//!
//! # Architecture
//!
//! - **Store**: [`GameStateStore`], the only place the board changes. Every
//!   update carries its ply; older updates are dropped, same-ply updates are
//!   idempotent.
//! - **Listener**: [`EventStreamListener`], a push channel scoped to the
//!   session and released on every exit path.
//! - **Scheduler**: [`ReconciliationScheduler`], periodic full-state pulls
//!   with at most one pull in flight.
//! - **Pipeline**: [`MoveSubmissionPipeline`], one submission path over a
//!   direct or push transport.
//! - **Controller**: [`SessionController`], the session state machine.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_chess::{ClientConfig, RestGameApi, ServerOracle, SessionController, WsConnector};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::default();
//! let api = Arc::new(RestGameApi::new(config.server_url(), config.request_timeout())?);
//! let oracle = Arc::new(ServerOracle::new(api.clone()));
//! let mut controller = SessionController::new(config.clone(), api, oracle)
//!     .with_connector(Arc::new(WsConnector::new(config.push_url().clone())));
//!
//! controller.choose_solo().await?;
//! controller.submit("e2e4".parse()?)?;
//! controller.step().await;
//! println!("{}", controller.board().position());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod board;
mod channel;
mod config;
mod controller;
mod error;
mod fen;
mod listener;
mod oracle;
mod outcome;
mod pipeline;
mod protocol;
mod scheduler;
mod session;
mod signal;
mod store;
mod types;

// Crate-level exports - Domain types
pub use board::{BoardState, Captures};
pub use types::{MoveIntent, PieceKind, SessionId, Side, Square, Winner};

// Crate-level exports - Errors and configuration
pub use config::{ClientConfig, ConfigError, PUSH_URL_ENV, RemoteTransport, SERVER_URL_ENV};
pub use error::{ClientError, ClientErrorKind};

// Crate-level exports - Transports
pub use api::{GameApi, RestGameApi};
pub use channel::{PushChannel, PushConnector, WsConnector, WsPushChannel};
pub use protocol::{
    ClientEvent, EventKind, GameStateResponse, JoinGameRequest, JoinGameResponse, JoinStatus,
    LegalMovesRequest, LegalMovesResponse, MoveRequest, MoveResponse, MoveStatus, ServerEvent,
    StartGameResponse, StartMultiplayerResponse,
};

// Crate-level exports - Components
pub use controller::SessionController;
pub use fen::{piece_at, side_to_move};
pub use listener::{EventStreamListener, ListenerGuard, PushSender};
pub use oracle::{RulesOracle, ServerOracle, is_promotion, resolve_promotion};
pub use outcome::{MoveOutcome, SyncSnapshot};
pub use pipeline::{MoveSubmissionPipeline, SubmitTransport};
pub use scheduler::{DEFAULT_POLL_INTERVAL, ReconciliationScheduler, SchedulerHandle};
pub use session::{GameSession, SessionMode, SessionStatus};
pub use signal::{Generation, Notification, SessionSignal};
pub use store::{
    ApplyOutcome, BoardUpdate, GameStateStore, Reduction, StateUpdateEvent, UNKNOWN_MOVE,
    UpdateSource, reduce,
};
