//! WebSocket push channel carrying JSON `{"event", "data"}` frames.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, warn};

use super::{PushChannel, PushConnector};
use crate::error::ClientError;
use crate::protocol::{ClientEvent, EventKind, ServerEvent};

/// Connects [`WsPushChannel`]s to a fixed URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for `url` (e.g. `ws://127.0.0.1:5000/ws`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<Box<dyn PushChannel>, ClientError> {
        info!("Opening push channel");
        let (stream, response) = connect_async(self.url.as_str()).await?;
        debug!(status = %response.status(), "Push channel handshake complete");
        Ok(Box::new(WsPushChannel {
            stream,
            subscribed: HashSet::new(),
        }))
    }
}

/// Push channel over a WebSocket stream.
pub struct WsPushChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    subscribed: HashSet<EventKind>,
}

#[async_trait]
impl PushChannel for WsPushChannel {
    fn subscribe(&mut self, kind: EventKind) {
        debug!(kind = kind.name(), "Subscribing");
        self.subscribed.insert(kind);
    }

    fn unsubscribe(&mut self, kind: EventKind) {
        debug!(kind = kind.name(), "Unsubscribing");
        self.subscribed.remove(&kind);
    }

    async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let json = serde_json::to_string(event)?;
        debug!(frame = %json, "Sending push event");
        self.stream.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, ClientError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(reason) => {
                    debug!(?reason, "Server closed push channel");
                    return None;
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                _ => continue,
            };
            match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) if self.subscribed.contains(&event.kind()) => return Some(Ok(event)),
                Ok(event) => {
                    debug!(kind = event.kind().name(), "Dropping unsubscribed event");
                }
                Err(e) => {
                    warn!(error = %e, frame = %text, "Malformed push frame");
                    return Some(Err(e.into()));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        info!("Closing push channel");
        self.subscribed.clear();
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            // Closing an already-closed socket is not a failure.
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
