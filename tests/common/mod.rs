//! In-memory fakes of the server for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use strictly_chess::{
    ClientConfig, ClientError, ClientEvent, EventKind, GameApi, GameStateResponse,
    JoinGameResponse, JoinStatus, MoveRequest, MoveResponse, MoveStatus, Notification,
    PushChannel, PushConnector, RemoteTransport, ServerEvent, ServerOracle, SessionController,
    SessionId, Side, Square, StartMultiplayerResponse,
};

/// Fischer-random start used throughout the tests.
pub const E0: &str = "bnrqkrnb/pppppppp/8/8/8/8/PPPPPPPP/BNRQKRNB w - - 0 1";
/// After a2a4.
pub const E1: &str = "bnrqkrnb/pppppppp/8/8/P7/8/1PPPPPPP/BNRQKRNB b - - 0 1";
/// After a2a4 a7a5.
pub const E2: &str = "bnrqkrnb/1ppppppp/8/p7/P7/8/1PPPPPPP/BNRQKRNB w - - 0 2";
/// Some final position.
pub const EF: &str = "bnr1krnb/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/BNRQKRNB w - - 1 3";

/// Scripted REST server.
#[derive(Debug, Default)]
pub struct FakeApi {
    script: Mutex<ApiScript>,
    state_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Debug, Default)]
struct ApiScript {
    setup_fen: String,
    start_fen: String,
    start_game_calls: usize,
    move_responses: VecDeque<MoveResponse>,
    move_requests: Vec<MoveRequest>,
    move_delay: Duration,
    legal: Vec<Square>,
    multiplayer: Option<StartMultiplayerResponse>,
    joinable: HashMap<SessionId, JoinGameResponse>,
    state: Option<GameStateResponse>,
    state_delay: Duration,
}

impl FakeApi {
    /// A server whose setup and new-game positions are [`E0`].
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        {
            let mut script = api.script.lock().expect("lock");
            script.setup_fen = E0.to_string();
            script.start_fen = E0.to_string();
        }
        Arc::new(api)
    }

    pub fn set_setup_fen(&self, fen: &str) {
        self.script.lock().expect("lock").setup_fen = fen.to_string();
    }

    pub fn queue_move(&self, response: MoveResponse) {
        self.script
            .lock()
            .expect("lock")
            .move_responses
            .push_back(response);
    }

    pub fn set_move_delay(&self, delay: Duration) {
        self.script.lock().expect("lock").move_delay = delay;
    }

    pub fn set_legal(&self, squares: &[&str]) {
        self.script.lock().expect("lock").legal = squares
            .iter()
            .map(|s| s.parse().expect("square"))
            .collect();
    }

    pub fn set_multiplayer(&self, session_id: &str, fen: &str) {
        self.script.lock().expect("lock").multiplayer = Some(StartMultiplayerResponse {
            session_id: SessionId::new(session_id).expect("id"),
            fen: fen.to_string(),
        });
    }

    pub fn add_joinable(&self, session_id: &str, fen: &str, moves: &[&str]) {
        self.script.lock().expect("lock").joinable.insert(
            SessionId::new(session_id).expect("id"),
            JoinGameResponse {
                status: JoinStatus::Success,
                fen: Some(fen.to_string()),
                move_log: Some(moves.iter().map(|m| m.to_string()).collect()),
                message: None,
            },
        );
    }

    pub fn set_state(&self, state: GameStateResponse) {
        self.script.lock().expect("lock").state = Some(state);
    }

    pub fn set_state_delay(&self, delay: Duration) {
        self.script.lock().expect("lock").state_delay = delay;
    }

    pub fn move_requests(&self) -> Vec<MoveRequest> {
        self.script.lock().expect("lock").move_requests.clone()
    }

    pub fn start_game_calls(&self) -> usize {
        self.script.lock().expect("lock").start_game_calls
    }

    pub fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameApi for FakeApi {
    async fn setup(&self) -> Result<String, ClientError> {
        Ok(self.script.lock().expect("lock").setup_fen.clone())
    }

    async fn start_game(&self) -> Result<String, ClientError> {
        let mut script = self.script.lock().expect("lock");
        script.start_game_calls += 1;
        Ok(script.start_fen.clone())
    }

    async fn make_move(&self, request: &MoveRequest) -> Result<MoveResponse, ClientError> {
        let (response, delay) = {
            let mut script = self.script.lock().expect("lock");
            script.move_requests.push(request.clone());
            (script.move_responses.pop_front(), script.move_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response.ok_or_else(|| ClientError::transport("no scripted move response"))
    }

    async fn legal_moves(&self, _fen: &str, _square: Square) -> Result<Vec<Square>, ClientError> {
        Ok(self.script.lock().expect("lock").legal.clone())
    }

    async fn start_multiplayer_game(&self) -> Result<StartMultiplayerResponse, ClientError> {
        self.script
            .lock()
            .expect("lock")
            .multiplayer
            .clone()
            .ok_or_else(|| ClientError::transport("server unavailable"))
    }

    async fn join_game(&self, session_id: &SessionId) -> Result<JoinGameResponse, ClientError> {
        let script = self.script.lock().expect("lock");
        Ok(script
            .joinable
            .get(session_id)
            .cloned()
            .unwrap_or(JoinGameResponse {
                status: JoinStatus::Error,
                fen: None,
                move_log: None,
                message: Some("Game not found".to_string()),
            }))
    }

    async fn game_state(&self, _session_id: &SessionId) -> Result<GameStateResponse, ClientError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.script.lock().expect("lock").state_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("lock")
            .state
            .clone()
            .ok_or_else(|| ClientError::transport("no state"))
    }
}

/// Accepted move response.
pub fn accepted(fen: &str, turn: Side, ply: u32) -> MoveResponse {
    MoveResponse {
        status: Some(MoveStatus::Success),
        fen: Some(fen.to_string()),
        turn: Some(turn),
        ply_count: Some(ply),
        ..MoveResponse::default()
    }
}

/// Rejected move response.
pub fn rejected(message: &str) -> MoveResponse {
    MoveResponse {
        status: Some(MoveStatus::Rejected),
        message: Some(message.to_string()),
        ..MoveResponse::default()
    }
}

/// Full state of `session` after `moves`.
pub fn state(session: &str, fen: &str, moves: &[&str]) -> GameStateResponse {
    GameStateResponse {
        status: Some("active".to_string()),
        session_id: Some(SessionId::new(session).expect("id")),
        fen: fen.to_string(),
        turn: None,
        move_log: moves.iter().map(|m| m.to_string()).collect(),
        ply_count: Some(moves.len() as u32),
        captured_by_side_a: None,
        captured_by_side_b: None,
        score_a: None,
        score_b: None,
        is_check: None,
        is_checkmate: None,
        winner: None,
    }
}

/// What happened on the fake push channels.
#[derive(Debug, Clone, Default)]
pub struct PushRecord {
    pub connects: usize,
    pub subscribed: HashSet<EventKind>,
    pub unsubscribed: HashSet<EventKind>,
    pub sent: Vec<ClientEvent>,
    pub closed: usize,
}

/// Push server the test drives by hand.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    record: Arc<Mutex<PushRecord>>,
    server: Arc<Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>>,
    refuse: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose server is down.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Pushes `event` on the open channel.
    pub fn push(&self, event: ServerEvent) {
        self.server
            .lock()
            .expect("lock")
            .as_ref()
            .expect("channel open")
            .send(event)
            .expect("listener alive");
    }

    /// Server side hangs up.
    pub fn hang_up(&self) {
        self.server.lock().expect("lock").take();
    }

    pub fn record(&self) -> PushRecord {
        self.record.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PushConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn PushChannel>, ClientError> {
        if self.refuse {
            return Err(ClientError::transport("connection refused"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.server.lock().expect("lock") = Some(tx);
        self.record.lock().expect("lock").connects += 1;
        Ok(Box::new(FakeChannel {
            record: self.record.clone(),
            events: rx,
            subscribed: HashSet::new(),
        }))
    }
}

struct FakeChannel {
    record: Arc<Mutex<PushRecord>>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    subscribed: HashSet<EventKind>,
}

#[async_trait]
impl PushChannel for FakeChannel {
    fn subscribe(&mut self, kind: EventKind) {
        self.subscribed.insert(kind);
        self.record.lock().expect("lock").subscribed.insert(kind);
    }

    fn unsubscribe(&mut self, kind: EventKind) {
        self.subscribed.remove(&kind);
        self.record.lock().expect("lock").unsubscribed.insert(kind);
    }

    async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        self.record.lock().expect("lock").sent.push(event.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, ClientError>> {
        loop {
            let event = self.events.recv().await?;
            if self.subscribed.contains(&event.kind()) {
                return Some(Ok(event));
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.record.lock().expect("lock").closed += 1;
        Ok(())
    }
}

/// Config for tests: a poll interval long enough that only the first,
/// immediate pull happens.
pub fn test_config(transport: RemoteTransport) -> ClientConfig {
    ClientConfig::default()
        .with_remote_transport(transport)
        .with_poll_interval(Duration::from_secs(60))
}

/// Builds a controller against the fakes.
pub fn controller(
    api: &Arc<FakeApi>,
    connector: Option<&FakeConnector>,
    config: ClientConfig,
) -> SessionController {
    let oracle = Arc::new(ServerOracle::new(api.clone()));
    let controller = SessionController::new(config, api.clone(), oracle);
    match connector {
        Some(connector) => controller.with_connector(Arc::new(connector.clone())),
        None => controller,
    }
}

/// Handles signals until none arrives for a short while.
pub async fn pump(controller: &mut SessionController) {
    while let Ok(Some(signal)) =
        tokio::time::timeout(Duration::from_millis(50), controller.recv_signal()).await
    {
        controller.handle_signal(signal).await;
    }
}

/// Every notification received so far.
pub fn drain(notifications: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        seen.push(notification);
    }
    seen
}

pub fn session_id(raw: &str) -> SessionId {
    SessionId::new(raw).expect("id")
}
