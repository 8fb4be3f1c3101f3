//! PollerActor - Drives collection, alerting and broadcast on a fixed interval
//!
//! ```text
//! Timer tick ─► MetricsSource::collect ─┬─► AlertHandle::submit (never blocks)
//!     ↑                                 └─► BroadcastHub::broadcast (if anyone listens)
//!     └─── Commands (PollNow, Shutdown)
//! ```
//!
//! A failed collection skips the tick entirely; the next tick starts fresh.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::collector::MetricsSource;

use super::alert::AlertHandle;
use super::hub::BroadcastHub;
use super::messages::PollerCommand;

pub struct PollerActor {
    source: Arc<dyn MetricsSource>,
    hub: BroadcastHub,
    alerts: AlertHandle,
    command_rx: mpsc::Receiver<PollerCommand>,
    interval_duration: Duration,
}

impl PollerActor {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        hub: BroadcastHub,
        alerts: AlertHandle,
        command_rx: mpsc::Receiver<PollerCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            source,
            hub,
            alerts,
            command_rx,
            interval_duration,
        }
    }

    #[instrument(skip(self), fields(interval_secs = self.interval_duration.as_secs()))]
    pub async fn run(mut self) {
        debug!("starting poller");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        error!("poll failed: {e:#}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.poll().await;
                            let _ = respond_to.send(result);
                        }

                        PollerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("poller stopped");
    }

    async fn poll(&self) -> Result<()> {
        let snapshot = self
            .source
            .collect()
            .await
            .context("failed to collect metrics")?;

        self.alerts.submit(snapshot.clone());

        let subscribers = self.hub.subscriber_count().await?;
        if subscribers == 0 {
            trace!("no subscribers, skipping broadcast");
            return Ok(());
        }

        let payload = serde_json::to_string(&snapshot).context("failed to serialize snapshot")?;
        self.hub.broadcast(payload).await?;
        trace!(subscribers, "broadcast snapshot");

        Ok(())
    }
}

/// Handle for controlling a PollerActor
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    pub fn spawn(
        source: Arc<dyn MetricsSource>,
        hub: BroadcastHub,
        alerts: AlertHandle,
        interval_duration: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = PollerActor::new(source, hub, alerts, cmd_rx, interval_duration);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run one poll immediately and wait for its result.
    pub async fn poll_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
