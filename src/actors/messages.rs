//! Message types for actor communication
//!
//! Every actor owns a bounded mpsc command queue. Queries carry a oneshot
//! `respond_to` sender for the reply.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// Opaque identifier of one streaming subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Work items processed, in order, by the hub coordinator
#[derive(Debug)]
pub enum HubCommand {
    Subscribe {
        id: SubscriberId,
        sender: mpsc::Sender<Arc<str>>,
    },

    /// Remove the subscriber and close its queue
    Unsubscribe { id: SubscriberId },

    /// Copy the message to every registered subscriber
    Broadcast { message: Arc<str> },

    Count { respond_to: oneshot::Sender<usize> },

    Shutdown,
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    GetStats {
        respond_to: oneshot::Sender<AlertStats>,
    },

    /// Stop after the snapshot currently being evaluated
    Shutdown,
}

/// Running totals kept by the alert actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    /// Snapshots evaluated
    pub evaluations: u64,
    /// Resources found over threshold
    pub alerts_raised: u64,
    /// Alerts that passed the cooldown and reached the sinks
    pub dispatched: u64,
    /// Alerts dropped inside the cooldown window
    pub suppressed: u64,
    /// Snapshots dropped because the alert queue was full
    pub dropped_snapshots: u64,
}

/// Commands that can be sent to the PollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Collect, evaluate and broadcast immediately, bypassing the timer
    PollNow {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    Shutdown,
}
