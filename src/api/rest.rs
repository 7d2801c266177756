//! HTTP implementation of [`GameApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::GameApi;
use crate::error::ClientError;
use crate::protocol::{
    GameStateResponse, JoinGameRequest, JoinGameResponse, LegalMovesRequest, LegalMovesResponse,
    MoveRequest, MoveResponse, StartGameResponse, StartMultiplayerResponse,
};
use crate::types::{SessionId, Square};

/// Type-safe HTTP client for the game server's `/api` routes.
#[derive(Debug, Clone)]
pub struct RestGameApi {
    base_url: String,
    client: reqwest::Client,
}

impl RestGameApi {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:5000`).
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        info!("Created REST game client");
        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Reads a JSON body. Rejections arrive with 4xx codes and a JSON body,
    /// so the body is parsed before the status is judged.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, body = %body, "Server response");

        match serde_json::from_str::<T>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => {
                warn!(status = %status, "Request failed");
                Err(ClientError::transport(format!("HTTP {}: {}", status, body)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl GameApi for RestGameApi {
    #[instrument(skip(self))]
    async fn setup(&self) -> Result<String, ClientError> {
        debug!("Fetching random setup");
        let response = self.client.get(self.url("setup")).send().await?;
        // The setup route returns the FEN as a bare JSON string.
        Self::read_json::<String>(response).await
    }

    #[instrument(skip(self))]
    async fn start_game(&self) -> Result<String, ClientError> {
        debug!("Starting new solo game");
        let response = self.client.get(self.url("start_game")).send().await?;
        let started: StartGameResponse = Self::read_json(response).await?;
        Ok(started.fen)
    }

    #[instrument(skip(self, request), fields(from = %request.from, to = %request.to))]
    async fn make_move(&self, request: &MoveRequest) -> Result<MoveResponse, ClientError> {
        info!("Submitting move");
        let response = self
            .client
            .post(self.url("move"))
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    #[instrument(skip(self, fen))]
    async fn legal_moves(&self, fen: &str, square: Square) -> Result<Vec<Square>, ClientError> {
        let request = LegalMovesRequest {
            fen: fen.to_string(),
            square,
        };
        let response = self
            .client
            .post(self.url("legal_moves"))
            .json(&request)
            .send()
            .await?;
        let legal: LegalMovesResponse = Self::read_json(response).await?;
        debug!(count = legal.moves.len(), "Got legal targets");
        Ok(legal.moves)
    }

    #[instrument(skip(self))]
    async fn start_multiplayer_game(&self) -> Result<StartMultiplayerResponse, ClientError> {
        info!("Creating remote session");
        let response = self
            .client
            .post(self.url("start_multiplayer_game"))
            .send()
            .await?;
        Self::read_json(response).await
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn join_game(&self, session_id: &SessionId) -> Result<JoinGameResponse, ClientError> {
        info!("Joining remote session");
        let request = JoinGameRequest {
            session_id: session_id.clone(),
        };
        let response = self
            .client
            .post(self.url("join_game"))
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn game_state(&self, session_id: &SessionId) -> Result<GameStateResponse, ClientError> {
        debug!("Pulling session state");
        let response = self
            .client
            .get(self.url(&format!("game_state/{}", session_id)))
            .send()
            .await?;
        Self::read_json(response).await
    }
}
