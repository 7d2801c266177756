//! Session controller.
//!
//! The controller is the only state machine in the client. It owns the
//! [`GameStateStore`] and the session, and it activates and tears down the
//! listener, the scheduler and the submission pipeline as the session moves
//! through `Unselected -> {Solo, HostPending, JoinedRemote} -> Active ->
//! Terminal -> Unselected`.
//!
//! Background work never touches controller state directly. Listener events,
//! pull results and move verdicts come back as [`SessionSignal`]s, stamped
//! with the [`Generation`] that produced them. [`SessionController::handle_signal`]
//! drops anything from an earlier activation, so a late response for a
//! torn-down session cannot leak into the next one.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::api::GameApi;
use crate::board::BoardState;
use crate::channel::PushConnector;
use crate::config::{ClientConfig, RemoteTransport};
use crate::error::{ClientError, ClientErrorKind};
use crate::listener::{EventStreamListener, ListenerGuard, PushSender};
use crate::oracle::RulesOracle;
use crate::outcome::{MoveOutcome, SyncSnapshot};
use crate::pipeline::{MoveSubmissionPipeline, SubmitTransport};
use crate::protocol::{ClientEvent, JoinStatus, ServerEvent};
use crate::scheduler::{ReconciliationScheduler, SchedulerHandle};
use crate::session::{GameSession, SessionMode, SessionStatus};
use crate::signal::{Generation, Notification, SessionSignal};
use crate::store::{ApplyOutcome, BoardUpdate, GameStateStore, StateUpdateEvent};
use crate::types::{MoveIntent, SessionId, Square, Winner};

const NOTIFICATION_CAPACITY: usize = 64;

/// Drives one game session at a time.
#[derive(Debug)]
pub struct SessionController {
    config: ClientConfig,
    api: Arc<dyn GameApi>,
    connector: Option<Arc<dyn PushConnector>>,
    oracle: Arc<dyn RulesOracle>,
    store: GameStateStore,
    session: GameSession,
    generation: Generation,
    listener: Option<ListenerGuard>,
    scheduler: Option<SchedulerHandle>,
    pipeline: Option<MoveSubmissionPipeline>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    inbox: mpsc::UnboundedReceiver<SessionSignal>,
    notifications: broadcast::Sender<Notification>,
    /// Notation of submitted moves keyed by the ply they should produce, for
    /// push events that do not name the move. `None` when two different moves
    /// were submitted for the same ply.
    pending_moves: BTreeMap<u32, Option<String>>,
    pending_join: Option<SessionId>,
}

impl SessionController {
    /// Creates a controller with no push channel.
    pub fn new(config: ClientConfig, api: Arc<dyn GameApi>, oracle: Arc<dyn RulesOracle>) -> Self {
        let (signals, inbox) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            config,
            api,
            connector: None,
            oracle,
            store: GameStateStore::new(),
            session: GameSession::default(),
            generation: Generation::default(),
            listener: None,
            scheduler: None,
            pipeline: None,
            signals,
            inbox,
            notifications,
            pending_moves: BTreeMap::new(),
            pending_join: None,
        }
    }

    /// Adds the connector used to open push channels.
    pub fn with_connector(mut self, connector: Arc<dyn PushConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Current session.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Current board.
    pub fn board(&self) -> &BoardState {
        self.store.current()
    }

    /// Current activation.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receiver that sees every board change.
    pub fn subscribe_board(&self) -> watch::Receiver<BoardState> {
        self.store.subscribe()
    }

    /// Receiver for user-visible notifications.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Whether the session has a live push channel.
    pub fn has_push_channel(&self) -> bool {
        self.listener.is_some()
    }

    /// Whether a reconciliation loop is running.
    pub fn is_reconciling(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Starts a solo game against the server from a Fischer-random setup.
    #[instrument(skip(self))]
    pub async fn choose_solo(&mut self) -> Result<(), ClientError> {
        self.require_mode(SessionMode::Unselected, "start a solo game")?;
        self.start_solo(false).await
    }

    /// Chooses remote play; the session waits in `HostPending` for a create
    /// or join.
    #[instrument(skip(self))]
    pub async fn choose_remote(&mut self) -> Result<(), ClientError> {
        self.require_mode(SessionMode::Unselected, "choose remote play")?;
        self.enter_host_pending().await
    }

    /// Asks the server for a new remote session.
    #[instrument(skip(self), fields(transport = %self.config.remote_transport()))]
    pub async fn create_session(&mut self) -> Result<(), ClientError> {
        self.require_mode(SessionMode::HostPending, "create a session")?;
        match *self.config.remote_transport() {
            RemoteTransport::Push => {
                let sender = self.push_sender()?;
                sender
                    .send(ClientEvent::CreateGame)
                    .map_err(|e| self.surface(e))?;
                info!("Requested new session");
                Ok(())
            }
            RemoteTransport::Direct => {
                let response = self
                    .api
                    .start_multiplayer_game()
                    .await
                    .map_err(|e| self.surface(e))?;
                self.on_session_acknowledged(
                    response.session_id,
                    StateUpdateEvent::FromPoll(BoardUpdate {
                        move_log: Some(Vec::new()),
                        ..BoardUpdate::baseline(response.fen)
                    }),
                );
                Ok(())
            }
        }
    }

    /// Joins an existing remote session.
    ///
    /// A blank id is refused locally. An unknown id leaves the session in
    /// `HostPending` with no id.
    #[instrument(skip(self))]
    pub async fn join_session(&mut self, raw_id: &str) -> Result<(), ClientError> {
        self.require_mode(SessionMode::HostPending, "join a session")?;
        let session_id = SessionId::new(raw_id).map_err(|e| self.surface(e))?;

        match *self.config.remote_transport() {
            RemoteTransport::Push => {
                let sender = self.push_sender()?;
                sender
                    .send(ClientEvent::JoinGame {
                        session_id: session_id.clone(),
                    })
                    .map_err(|e| self.surface(e))?;
                info!(%session_id, "Requested join");
                self.pending_join = Some(session_id);
                Ok(())
            }
            RemoteTransport::Direct => {
                let response = self
                    .api
                    .join_game(&session_id)
                    .await
                    .map_err(|e| self.surface(e))?;
                if response.status == JoinStatus::Error {
                    debug!(message = ?response.message, "Join refused");
                    return Err(self.surface(ClientError::new(ClientErrorKind::SessionNotFound(
                        session_id.to_string(),
                    ))));
                }
                let fen = response
                    .fen
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| self.surface(ClientError::protocol("join response without position")))?;
                let log = response.move_log.unwrap_or_default();
                self.on_session_acknowledged(
                    session_id,
                    StateUpdateEvent::FromPoll(BoardUpdate {
                        ply_count: log.len() as u32,
                        move_log: Some(log),
                        ..BoardUpdate::baseline(fen)
                    }),
                );
                Ok(())
            }
        }
    }

    /// Submits a move. The verdict arrives later as a signal.
    #[instrument(skip(self), fields(intent = %intent))]
    pub fn submit(&mut self, intent: MoveIntent) -> Result<(), ClientError> {
        if !self.session.is_active() {
            return Err(self.surface(ClientError::invalid_state("no game in progress")));
        }
        let Some(pipeline) = &self.pipeline else {
            return Err(self.surface(ClientError::invalid_state("no game in progress")));
        };
        let board = self.store.current();
        let sent = pipeline
            .submit(intent, board, self.session.session_id())
            .map_err(|e| self.surface(e))?;
        let notation = sent.notation();
        match self.pending_moves.entry(board.ply_count() + 1) {
            Entry::Vacant(slot) => {
                slot.insert(Some(notation));
            }
            Entry::Occupied(mut slot) if slot.get().as_ref() != Some(&notation) => {
                debug!(ply = *slot.key(), "Competing submissions for one ply");
                slot.insert(None);
            }
            Entry::Occupied(_) => {}
        }
        Ok(())
    }

    /// Target squares to highlight for the piece on `square`. Read-only.
    #[instrument(skip(self), fields(square = %square))]
    pub async fn highlights(&self, square: Square) -> Result<Vec<Square>, ClientError> {
        let board = self.store.current();
        if board.position().is_empty() || board.is_finished() {
            return Ok(Vec::new());
        }
        self.oracle.legal_targets(board.position(), square).await
    }

    /// Abandons the session and returns to `Unselected`.
    #[instrument(skip(self))]
    pub async fn reset(&mut self) {
        info!(mode = %self.session.mode(), "Resetting session");
        self.teardown().await;
        self.store.reset();
        self.session = GameSession::default();
        self.announce_session();
    }

    /// Acknowledges a finished game and starts over in the same mode: a new
    /// solo game, or a fresh `HostPending` for remote play.
    #[instrument(skip(self))]
    pub async fn acknowledge_game_over(&mut self) -> Result<(), ClientError> {
        if self.session.status() != SessionStatus::Terminal {
            return Err(self.surface(ClientError::invalid_state("the game is not over")));
        }
        let mode = self.session.mode();
        self.reset().await;
        if mode.is_remote() {
            self.enter_host_pending().await
        } else {
            self.start_solo(true).await
        }
    }

    /// Waits for the next signal from background work.
    pub async fn recv_signal(&mut self) -> Option<SessionSignal> {
        self.inbox.recv().await
    }

    /// Waits for one signal and handles it.
    pub async fn step(&mut self) -> bool {
        match self.recv_signal().await {
            Some(signal) => {
                self.handle_signal(signal).await;
                true
            }
            None => false,
        }
    }

    /// Handles every signal already queued, without waiting.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.inbox.try_recv() {
            self.handle_signal(signal).await;
            handled += 1;
        }
        handled
    }

    /// Routes a signal to its handler. Signals from an earlier activation
    /// are dropped.
    #[instrument(skip(self, signal), fields(generation = %signal.generation(), current = %self.generation))]
    pub async fn handle_signal(&mut self, signal: SessionSignal) {
        if signal.generation() != self.generation {
            debug!("Discarding signal from an earlier activation");
            return;
        }
        match signal {
            SessionSignal::Push { event, .. } => self.handle_push(event).await,
            SessionSignal::ChannelClosed { error, .. } => self.handle_channel_closed(error),
            SessionSignal::Snapshot {
                session_id, result, ..
            } => self.handle_snapshot(session_id, result).await,
            SessionSignal::MoveResult { intent, result, .. } => {
                self.handle_move_result(intent, result).await
            }
        }
    }

    async fn start_solo(&mut self, rematch: bool) -> Result<(), ClientError> {
        let fetched = if rematch {
            self.api.start_game().await
        } else {
            self.api.setup().await
        };
        let position = fetched.map_err(|e| self.surface(e))?;

        self.generation = self.generation.next();
        self.store.reset();
        self.apply(StateUpdateEvent::FromPoll(BoardUpdate {
            move_log: Some(Vec::new()),
            ..BoardUpdate::baseline(position)
        }));
        self.session = GameSession::solo();

        if let Some(connector) = self.connector.clone() {
            match EventStreamListener::activate(
                connector.as_ref(),
                self.generation,
                self.signals.clone(),
            )
            .await
            {
                Ok(guard) => self.listener = Some(guard),
                Err(e) => warn!(error = %e, "Solo game continues without push channel"),
            }
        }

        self.pipeline = Some(self.new_pipeline(SubmitTransport::Direct(self.api.clone())));
        info!(rematch, "Solo game started");
        self.announce_session();
        Ok(())
    }

    async fn enter_host_pending(&mut self) -> Result<(), ClientError> {
        self.generation = self.generation.next();
        self.store.reset();
        let needs_push = *self.config.remote_transport() == RemoteTransport::Push;

        match self.connector.clone() {
            Some(connector) => {
                match EventStreamListener::activate(
                    connector.as_ref(),
                    self.generation,
                    self.signals.clone(),
                )
                .await
                {
                    Ok(guard) => self.listener = Some(guard),
                    Err(e) if needs_push => return Err(self.surface(e)),
                    Err(e) => warn!(error = %e, "Remote play continues without push channel"),
                }
            }
            None if needs_push => {
                return Err(self.surface(ClientError::invalid_state(
                    "push transport configured without a push channel",
                )));
            }
            None => {}
        }

        self.session = GameSession::host_pending();
        info!("Waiting for a session");
        self.announce_session();
        Ok(())
    }

    /// The server assigned or confirmed a session: load its board and start
    /// reconciling.
    fn on_session_acknowledged(&mut self, session_id: SessionId, initial: StateUpdateEvent) {
        if let Err(e) = self.session.join_remote(session_id.clone()) {
            self.surface(e);
            return;
        }
        self.pending_join = None;
        self.store.reset();
        self.apply(initial);

        self.scheduler = Some(ReconciliationScheduler::start(
            self.api.clone(),
            session_id.clone(),
            self.config.poll_interval(),
            self.generation,
            self.signals.clone(),
        ));

        let transport = match (*self.config.remote_transport(), &self.listener) {
            (RemoteTransport::Push, Some(listener)) => SubmitTransport::Push(listener.sender()),
            _ => SubmitTransport::Direct(self.api.clone()),
        };
        self.pipeline = Some(self.new_pipeline(transport));

        info!(%session_id, "Remote session active");
        self.announce_session();
    }

    async fn handle_push(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::GameCreated { session_id, fen } => {
                if self.session.mode() != SessionMode::HostPending || self.pending_join.is_some() {
                    debug!(%session_id, "Ignoring unrequested game_created");
                    return;
                }
                self.on_session_acknowledged(
                    session_id,
                    StateUpdateEvent::FromPush(BoardUpdate::baseline(fen)),
                );
            }
            ServerEvent::GameJoined { session_id, fen } => {
                if self.pending_join.as_ref() != Some(&session_id) {
                    debug!(%session_id, "Ignoring unrequested game_joined");
                    return;
                }
                self.on_session_acknowledged(
                    session_id,
                    StateUpdateEvent::FromPush(BoardUpdate::baseline(fen)),
                );
            }
            ServerEvent::MoveMade {
                session_id,
                fen,
                turn,
                ply_count,
                last_move,
            } => {
                if !self.accepts_session_event(session_id.as_ref()) {
                    return;
                }
                let current = self.store.current().ply_count();
                let new_moves = if ply_count == current + 1 {
                    last_move
                        .or_else(|| self.pending_moves.get(&ply_count).cloned().flatten())
                        .into_iter()
                        .collect()
                } else {
                    Vec::new()
                };
                self.apply(StateUpdateEvent::FromPush(BoardUpdate {
                    ply_count,
                    position: fen,
                    turn,
                    new_moves,
                    ..BoardUpdate::default()
                }));
            }
            ServerEvent::GameOver {
                session_id,
                winner,
                fen,
            } => {
                if !self.accepts_session_event(session_id.as_ref()) {
                    return;
                }
                let ply_count = self.store.current().ply_count();
                self.apply(StateUpdateEvent::FromPush(BoardUpdate {
                    ply_count,
                    position: fen,
                    terminal: true,
                    ..BoardUpdate::default()
                }));
                self.enter_terminal(winner.unwrap_or(Winner::Draw)).await;
            }
            ServerEvent::SyncGame { session_id } => {
                match (&self.scheduler, self.session.session_id()) {
                    (Some(scheduler), Some(current)) if *current == session_id => {
                        scheduler.resync_now()
                    }
                    _ => debug!(%session_id, "Ignoring sync_game for another session"),
                }
            }
            ServerEvent::Error { message } => {
                if let Some(requested) = self.pending_join.take() {
                    warn!(%requested, %message, "Join refused");
                    self.notify(Notification::SessionNotFound(requested.to_string()));
                } else {
                    warn!(%message, "Server error on push channel");
                    self.pending_moves.clear();
                    self.notify(Notification::Message(message));
                }
            }
        }
    }

    fn handle_channel_closed(&mut self, error: Option<ClientError>) {
        self.listener = None;
        if let Some(error) = error {
            warn!(error = %error, "Push channel lost");
            self.notify(Notification::TransportFailed(error.user_message()));
        }
        let on_push = self
            .pipeline
            .as_ref()
            .is_some_and(|p| p.transport().is_push());
        if on_push {
            info!("Falling back to direct move submission");
            self.pipeline = Some(self.new_pipeline(SubmitTransport::Direct(self.api.clone())));
        }
    }

    async fn handle_snapshot(
        &mut self,
        session_id: SessionId,
        result: Result<SyncSnapshot, ClientError>,
    ) {
        if self.session.session_id() != Some(&session_id) || !self.session.is_active() {
            debug!(%session_id, "Discarding snapshot for another session");
            return;
        }
        match result {
            Err(e) => {
                warn!(error = %e, "Reconciliation pull failed");
                self.notify(Notification::TransportFailed(e.user_message()));
            }
            Ok(snapshot) => {
                let winner = snapshot.winner;
                self.apply(StateUpdateEvent::FromPoll(snapshot.board));
                if let Some(winner) = winner {
                    self.enter_terminal(winner).await;
                }
            }
        }
    }

    async fn handle_move_result(
        &mut self,
        intent: MoveIntent,
        result: Result<MoveOutcome, ClientError>,
    ) {
        match result {
            Err(e) => {
                warn!(error = %e, %intent, "Move submission failed");
                self.forget_pending(&intent);
                self.notify(Notification::TransportFailed(e.user_message()));
            }
            Ok(MoveOutcome::Rejected { reason }) => {
                info!(%intent, %reason, "Move rejected");
                self.forget_pending(&intent);
                self.notify(Notification::MoveRejected {
                    square: intent.to,
                    reason,
                });
            }
            Ok(MoveOutcome::Accepted {
                update,
                applied_move,
            }) => {
                debug!(%applied_move, ply = update.ply_count, "Move accepted");
                self.apply(StateUpdateEvent::FromMoveResult(update));
            }
            Ok(MoveOutcome::GameOver { winner, update }) => {
                self.apply(StateUpdateEvent::FromMoveResult(update));
                self.enter_terminal(winner).await;
            }
        }
    }

    async fn enter_terminal(&mut self, winner: Winner) {
        if self.session.status() == SessionStatus::Terminal {
            return;
        }
        info!(%winner, "Game over");
        self.teardown().await;
        self.session.finish(winner);
        self.notify(Notification::GameOver(winner));
        self.announce_session();
    }

    /// Stops the scheduler, closes the listener and retires the generation.
    async fn teardown(&mut self) {
        self.generation = self.generation.next();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.pipeline = None;
        self.pending_moves.clear();
        self.pending_join = None;
        if let Some(listener) = self.listener.take() {
            listener.close().await;
        }
    }

    /// Applies an update; a gap in the log triggers an immediate pull.
    ///
    /// Without a scheduler there is nothing to pull, so the server's position
    /// is kept and the unnamed plies are logged as unknown.
    fn apply(&mut self, event: StateUpdateEvent) -> ApplyOutcome {
        let unpullable = self.scheduler.is_none().then(|| event.clone());
        let mut outcome = self.store.apply(event);
        if let ApplyOutcome::NeedsResync { current, incoming } = outcome {
            if let Some(scheduler) = &self.scheduler {
                scheduler.resync_now();
            } else if let Some(event) = unpullable {
                warn!(current, incoming, "Board skipped plies and nothing can re-pull it");
                let known = self.store.current().move_log().to_vec();
                outcome = self.store.apply(event.with_unnamed_plies(&known));
                if outcome == ApplyOutcome::Applied {
                    self.notify(Notification::Message(
                        "The server played moves it did not name; the move list has gaps."
                            .to_string(),
                    ));
                }
            }
        }
        let next_ply = self.store.current().ply_count() + 1;
        self.pending_moves = self.pending_moves.split_off(&next_ply);
        outcome
    }

    fn forget_pending(&mut self, intent: &MoveIntent) {
        let notation = intent.notation();
        self.pending_moves
            .retain(|_, pending| pending.as_ref() != Some(&notation));
    }

    fn accepts_session_event(&self, session_id: Option<&SessionId>) -> bool {
        let accepted = self.session.mode() == SessionMode::JoinedRemote
            && self.session.is_active()
            && session_id.is_none_or(|id| self.session.session_id() == Some(id));
        if !accepted {
            debug!(?session_id, "Ignoring event outside the active remote session");
        }
        accepted
    }

    fn new_pipeline(&self, transport: SubmitTransport) -> MoveSubmissionPipeline {
        let oracle = self
            .config
            .precheck_legality()
            .then(|| self.oracle.clone());
        MoveSubmissionPipeline::new(
            transport,
            oracle,
            *self.config.default_promotion(),
            self.generation,
            self.signals.clone(),
        )
    }

    fn push_sender(&self) -> Result<PushSender, ClientError> {
        self.listener
            .as_ref()
            .map(ListenerGuard::sender)
            .ok_or_else(|| self.surface(ClientError::transport("push channel is not open")))
    }

    fn require_mode(&self, expected: SessionMode, action: &str) -> Result<(), ClientError> {
        if self.session.mode() == expected {
            return Ok(());
        }
        Err(self.surface(ClientError::invalid_state(format!(
            "cannot {} in mode {}",
            action,
            self.session.mode()
        ))))
    }

    fn announce_session(&self) {
        self.notify(Notification::SessionChanged(self.session.clone()));
    }

    fn notify(&self, notification: Notification) {
        debug!(%notification, "Notify");
        // No receivers is fine.
        let _ = self.notifications.send(notification);
    }

    /// Reports a failure to the player and hands it back to the caller.
    fn surface(&self, error: ClientError) -> ClientError {
        warn!(error = %error, "Operation failed");
        let notification = match &error.kind {
            ClientErrorKind::SessionNotFound(id) => Notification::SessionNotFound(id.clone()),
            ClientErrorKind::Transport(_) | ClientErrorKind::Protocol(_) => {
                Notification::TransportFailed(error.user_message())
            }
            ClientErrorKind::Validation(_) | ClientErrorKind::InvalidState(_) => {
                Notification::Message(error.user_message())
            }
        };
        self.notify(notification);
        error
    }
}
