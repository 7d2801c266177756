//! Reconciliation scheduler: periodic full-state pulls for remote sessions.

use futures::future::OptionFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use crate::api::GameApi;
use crate::error::ClientError;
use crate::outcome::SyncSnapshot;
use crate::signal::{Generation, SessionSignal};
use crate::types::SessionId;

/// Default pull cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

type Pull = Pin<Box<dyn Future<Output = Result<SyncSnapshot, ClientError>> + Send>>;

/// Starts reconciliation loops.
#[derive(Debug)]
pub struct ReconciliationScheduler;

impl ReconciliationScheduler {
    /// Starts pulling `session_id` every `interval`. The first pull happens
    /// immediately.
    #[instrument(skip(api, signals), fields(session_id = %session_id, %generation))]
    pub fn start(
        api: Arc<dyn GameApi>,
        session_id: SessionId,
        interval: Duration,
        generation: Generation,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> SchedulerHandle {
        info!(interval_ms = interval.as_millis() as u64, "Starting reconciliation");
        let resync = Arc::new(Notify::new());
        let task = tokio::spawn(run(
            api,
            session_id,
            interval,
            generation,
            signals,
            resync.clone(),
        ));
        SchedulerHandle { resync, task }
    }
}

/// Running scheduler. Stopping or dropping it cancels the timer at once.
#[derive(Debug)]
pub struct SchedulerHandle {
    resync: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Requests an out-of-band pull, outside the regular cadence.
    pub fn resync_now(&self) {
        debug!("Out-of-band pull requested");
        self.resync.notify_one();
    }

    /// Cancels the timer and any pull in flight.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        debug!("Stopping reconciliation");
        self.task.abort();
    }
}

fn pull(api: Arc<dyn GameApi>, session_id: SessionId) -> Pull {
    Box::pin(async move {
        let response = api.game_state(&session_id).await?;
        SyncSnapshot::from_response(response, &session_id)
    })
}

async fn run(
    api: Arc<dyn GameApi>,
    session_id: SessionId,
    interval: Duration,
    generation: Generation,
    signals: mpsc::UnboundedSender<SessionSignal>,
    resync: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: Option<Pull> = None;
    let mut resync_pending = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    debug!("Pull still in flight, skipping tick");
                } else {
                    in_flight = Some(pull(api.clone(), session_id.clone()));
                }
            }

            _ = resync.notified() => {
                if in_flight.is_some() {
                    resync_pending = true;
                } else {
                    in_flight = Some(pull(api.clone(), session_id.clone()));
                }
            }

            Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                if let Err(e) = &result {
                    debug!(error = %e, "Pull failed");
                }
                let signal = SessionSignal::Snapshot {
                    generation,
                    session_id: session_id.clone(),
                    result,
                };
                if signals.send(signal).is_err() {
                    debug!("Controller gone, stopping reconciliation");
                    return;
                }
                if resync_pending {
                    resync_pending = false;
                    in_flight = Some(pull(api.clone(), session_id.clone()));
                }
            }
        }
    }
}
