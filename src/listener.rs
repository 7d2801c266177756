//! Event stream listener: owns the session's push channel.
//!
//! The channel lives inside a background task. Every way out of that task
//! (shutdown, server close, transport error, controller gone) goes through
//! [`release`], which unsubscribes every kind and closes the channel.

use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{PushChannel, PushConnector};
use crate::error::ClientError;
use crate::protocol::{ClientEvent, EventKind};
use crate::signal::{Generation, SessionSignal};

/// How long [`ListenerGuard::close`] waits for the channel to shut down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Cloneable handle for emitting events on the session's channel.
#[derive(Debug, Clone)]
pub struct PushSender {
    commands: mpsc::UnboundedSender<ClientEvent>,
}

impl PushSender {
    /// Queues `event` for the channel.
    pub fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.commands
            .send(event)
            .map_err(|_| ClientError::transport("push channel is closed"))
    }
}

/// Opens push channels and spawns their listener tasks.
#[derive(Debug)]
pub struct EventStreamListener;

impl EventStreamListener {
    /// Connects a channel, subscribes to every event kind and starts
    /// forwarding events to `signals`.
    #[instrument(skip_all, fields(%generation))]
    pub async fn activate(
        connector: &dyn PushConnector,
        generation: Generation,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Result<ListenerGuard, ClientError> {
        let mut channel = connector.connect().await?;
        for kind in EventKind::iter() {
            channel.subscribe(kind);
        }
        info!("Listener active");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(channel, command_rx, shutdown_rx, signals, generation));

        Ok(ListenerGuard {
            commands,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }
}

/// Scoped ownership of a listener. Dropping it shuts the channel down.
#[derive(Debug)]
pub struct ListenerGuard {
    commands: mpsc::UnboundedSender<ClientEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerGuard {
    /// Handle for emitting events.
    pub fn sender(&self) -> PushSender {
        PushSender {
            commands: self.commands.clone(),
        }
    }

    /// Shuts the channel down and waits until it is released.
    #[instrument(skip(self))]
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Listener released"),
                Ok(Err(e)) => error!(error = %e, "Listener task failed"),
                Err(_) => warn!("Listener did not release in time"),
            }
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            debug!("Listener guard dropped, signalling shutdown");
            let _ = shutdown.send(());
        }
    }
}

/// Listener loop.
async fn run(
    mut channel: Box<dyn PushChannel>,
    mut commands: mpsc::UnboundedReceiver<ClientEvent>,
    mut shutdown: oneshot::Receiver<()>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    generation: Generation,
) {
    let failure: Option<ClientError> = loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Shutdown requested");
                break None;
            }

            command = commands.recv() => {
                let Some(event) = command else {
                    debug!("Command senders dropped");
                    break None;
                };
                if let Err(e) = channel.send(&event).await {
                    error!(error = %e, "Push send failed");
                    break Some(e);
                }
            }

            incoming = channel.recv() => {
                match incoming {
                    Some(Ok(event)) => {
                        debug!(kind = event.kind().name(), "Push event");
                        if signals.send(SessionSignal::Push { generation, event }).is_err() {
                            debug!("Controller gone");
                            break None;
                        }
                    }
                    Some(Err(e)) if e.is_transport() => {
                        error!(error = %e, "Push channel failed");
                        break Some(e);
                    }
                    Some(Err(e)) => warn!(error = %e, "Skipping bad push frame"),
                    None => {
                        info!("Server closed push channel");
                        break Some(ClientError::transport("server closed the push channel"));
                    }
                }
            }
        }
    };

    release(channel.as_mut()).await;

    if let Some(error) = failure {
        let _ = signals.send(SessionSignal::ChannelClosed {
            generation,
            error: Some(error),
        });
    }
}

/// Unsubscribes every kind and closes the channel.
async fn release(channel: &mut dyn PushChannel) {
    for kind in EventKind::iter() {
        channel.unsubscribe(kind);
    }
    if let Err(e) = channel.close().await {
        warn!(error = %e, "Error closing push channel");
    }
}
