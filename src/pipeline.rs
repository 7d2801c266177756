//! Move submission pipeline.
//!
//! One pipeline serves every mode; only the transport differs. Submission is
//! fire-and-forget: the verdict comes back to the controller as a
//! [`SessionSignal::MoveResult`] and reaches the board through the store.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::api::GameApi;
use crate::board::BoardState;
use crate::error::ClientError;
use crate::listener::PushSender;
use crate::oracle::{self, RulesOracle};
use crate::outcome::MoveOutcome;
use crate::protocol::{ClientEvent, MoveRequest};
use crate::signal::{Generation, SessionSignal};
use crate::types::{MoveIntent, PieceKind, SessionId};

/// How moves reach the server.
#[derive(Debug, Clone)]
pub enum SubmitTransport {
    /// `POST /api/move`; the response carries the verdict.
    Direct(Arc<dyn GameApi>),
    /// `make_move` on the push channel; the verdict arrives as a push event.
    Push(PushSender),
}

impl SubmitTransport {
    /// Whether verdicts arrive on the push channel.
    pub fn is_push(&self) -> bool {
        matches!(self, SubmitTransport::Push(_))
    }
}

/// Submits move intents for one session activation.
#[derive(Debug)]
pub struct MoveSubmissionPipeline {
    transport: SubmitTransport,
    oracle: Option<Arc<dyn RulesOracle>>,
    default_promotion: PieceKind,
    generation: Generation,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl MoveSubmissionPipeline {
    /// Creates a pipeline. With an `oracle`, moves to squares the oracle does
    /// not list are refused locally without a round trip.
    pub fn new(
        transport: SubmitTransport,
        oracle: Option<Arc<dyn RulesOracle>>,
        default_promotion: PieceKind,
        generation: Generation,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        Self {
            transport,
            oracle,
            default_promotion,
            generation,
            signals,
        }
    }

    /// Transport in use.
    pub fn transport(&self) -> &SubmitTransport {
        &self.transport
    }

    /// Starts submitting `intent` against `board` and returns at once with
    /// the move as it will be sent, promotion resolved.
    #[instrument(skip(self, board), fields(intent = %intent, ply = board.ply_count(), push = self.transport.is_push()))]
    pub fn submit(
        &self,
        intent: MoveIntent,
        board: &BoardState,
        session_id: Option<&SessionId>,
    ) -> Result<MoveIntent, ClientError> {
        if self.transport.is_push() && session_id.is_none() {
            return Err(ClientError::invalid_state(
                "push submission needs a remote session",
            ));
        }

        let intent = oracle::resolve_promotion(board.position(), intent, self.default_promotion);
        let position = board.position().to_string();
        let previous_ply = board.ply_count();
        let session_id = session_id.cloned();
        let transport = self.transport.clone();
        let oracle = self.oracle.clone();
        let generation = self.generation;
        let signals = self.signals.clone();

        tokio::spawn(async move {
            let result =
                run_submission(transport, oracle, intent, position, previous_ply, session_id).await;
            let Some(result) = result else {
                return;
            };
            let signal = SessionSignal::MoveResult {
                generation,
                intent,
                result,
            };
            if signals.send(signal).is_err() {
                debug!("Controller gone, dropping move result");
            }
        });

        Ok(intent)
    }
}

/// Runs one submission. `None` means the verdict will arrive on the push
/// channel instead.
async fn run_submission(
    transport: SubmitTransport,
    oracle: Option<Arc<dyn RulesOracle>>,
    intent: MoveIntent,
    position: String,
    previous_ply: u32,
    session_id: Option<SessionId>,
) -> Option<Result<MoveOutcome, ClientError>> {
    if let Some(oracle) = oracle
        && let Some(refusal) = precheck(oracle.as_ref(), &position, &intent).await
    {
        return Some(Ok(refusal));
    }

    match transport {
        SubmitTransport::Direct(api) => {
            let request = MoveRequest {
                from: intent.from,
                to: intent.to,
                fen: position,
                promotion: intent.promotion,
                session_id,
            };
            let result = match api.make_move(&request).await {
                Ok(response) => MoveOutcome::from_response(response, &intent, previous_ply),
                Err(e) => Err(e),
            };
            if let Ok(outcome) = &result {
                info!(?outcome, "Move verdict");
            }
            Some(result)
        }
        SubmitTransport::Push(sender) => {
            let session_id = session_id?;
            let event = ClientEvent::MakeMove {
                session_id,
                squares: intent.squares(),
                promotion: intent.promotion,
            };
            match sender.send(event) {
                Ok(()) => {
                    debug!("Move sent on push channel");
                    None
                }
                Err(e) => Some(Err(e)),
            }
        }
    }
}

/// Refuses a move the oracle says cannot happen. An oracle failure lets the
/// move through; the server still decides.
async fn precheck(
    oracle: &dyn RulesOracle,
    position: &str,
    intent: &MoveIntent,
) -> Option<MoveOutcome> {
    match oracle.legal_targets(position, intent.from).await {
        Ok(targets) if targets.contains(&intent.to) => None,
        Ok(_) => {
            debug!(intent = %intent, "Pre-check refused move");
            Some(MoveOutcome::Rejected {
                reason: MoveOutcome::DEFAULT_REJECTION.to_string(),
            })
        }
        Err(e) => {
            warn!(error = %e, "Legality pre-check failed, submitting anyway");
            None
        }
    }
}
