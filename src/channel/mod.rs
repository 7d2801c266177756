//! Bidirectional push channel between client and server.

mod ws;

pub use ws::{WsConnector, WsPushChannel};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::protocol::{ClientEvent, EventKind, ServerEvent};

/// Opens push channels. One channel per session; never shared.
#[async_trait]
pub trait PushConnector: Send + Sync + std::fmt::Debug {
    /// Connects a new channel.
    async fn connect(&self) -> Result<Box<dyn PushChannel>, ClientError>;
}

/// An open push channel.
///
/// `recv` only yields events of subscribed kinds. A protocol error from
/// `recv` is a single bad frame; a transport error means the channel is gone.
#[async_trait]
pub trait PushChannel: Send {
    /// Starts delivering events of `kind`.
    fn subscribe(&mut self, kind: EventKind);

    /// Stops delivering events of `kind`.
    fn unsubscribe(&mut self, kind: EventKind);

    /// Emits an event to the server.
    async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError>;

    /// Next subscribed event, or `None` once the server closed the channel.
    async fn recv(&mut self) -> Option<Result<ServerEvent, ClientError>>;

    /// Closes the channel.
    async fn close(&mut self) -> Result<(), ClientError>;
}
