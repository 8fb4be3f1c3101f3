//! AlertActor - Evaluates snapshots and dispatches alerts
//!
//! Alert delivery can take as long as the outbound client's full retry budget,
//! so it runs on its own task. The poll loop hands snapshots over through a
//! bounded queue and never waits on a sink.
//!
//! ```text
//! Poller ──try_send──► [snapshot queue] ──► Evaluator ──► Dispatcher ──► sinks
//!                                                          (cooldown)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::Snapshot;
use crate::evaluator::Evaluator;
use crate::notify::{DispatchOutcome, Dispatcher};

use super::messages::{AlertCommand, AlertStats};

const SNAPSHOT_BUFFER: usize = 4;

/// Actor owning the evaluator and the dispatcher
pub struct AlertActor {
    evaluator: Evaluator,
    dispatcher: Arc<Dispatcher>,
    command_rx: mpsc::Receiver<AlertCommand>,
    snapshot_rx: mpsc::Receiver<Snapshot>,
    stats: AlertStats,
    dropped: Arc<AtomicU64>,
}

impl AlertActor {
    pub fn new(
        evaluator: Evaluator,
        dispatcher: Arc<Dispatcher>,
        command_rx: mpsc::Receiver<AlertCommand>,
        snapshot_rx: mpsc::Receiver<Snapshot>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            evaluator,
            dispatcher,
            command_rx,
            snapshot_rx,
            stats: AlertStats::default(),
            dropped,
        }
    }

    #[instrument(skip(self), name = "alert_actor")]
    pub async fn run(mut self) {
        debug!("starting alert actor");

        loop {
            tokio::select! {
                Some(snapshot) = self.snapshot_rx.recv() => {
                    self.handle_snapshot(&snapshot).await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AlertCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats());
                        }

                        AlertCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("all channels closed, shutting down");
                    break;
                }
            }
        }

        debug!("alert actor stopped");
    }

    fn stats(&self) -> AlertStats {
        AlertStats {
            dropped_snapshots: self.dropped.load(Ordering::Relaxed),
            ..self.stats
        }
    }

    async fn handle_snapshot(&mut self, snapshot: &Snapshot) {
        self.stats.evaluations += 1;

        let alerts = self.evaluator.evaluate(snapshot);
        trace!(count = alerts.len(), "evaluated snapshot");

        for alert in alerts {
            self.stats.alerts_raised += 1;
            let message = alert.message(&snapshot.host.hostname);

            match self.dispatcher.notify(&message).await {
                DispatchOutcome::Dispatched { failed, .. } => {
                    self.stats.dispatched += 1;
                    if !failed.is_empty() {
                        warn!(resource = %alert.resource, failed = failed.len(), "alert partially delivered");
                    }
                }
                DispatchOutcome::Suppressed { .. } => {
                    self.stats.suppressed += 1;
                }
            }
        }
    }
}

/// Handle for feeding and controlling an AlertActor
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
    snapshot_tx: mpsc::Sender<Snapshot>,
    dropped: Arc<AtomicU64>,
}

impl AlertHandle {
    pub fn spawn(evaluator: Evaluator, dispatcher: Arc<Dispatcher>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let dropped = Arc::new(AtomicU64::new(0));

        let actor = AlertActor::new(evaluator, dispatcher, cmd_rx, snapshot_rx, dropped.clone());
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            snapshot_tx,
            dropped,
        }
    }

    /// Queue a snapshot for evaluation without waiting.
    ///
    /// Returns `false` when the snapshot was dropped.
    pub fn submit(&self, snapshot: Snapshot) -> bool {
        match self.snapshot_tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("alert queue full, skipping evaluation for this snapshot");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("alert actor is gone, snapshot not evaluated");
                false
            }
        }
    }

    pub async fn stats(&self) -> Result<AlertStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AlertCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
