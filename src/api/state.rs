//! API shared state

use std::sync::Arc;

use crate::actors::BroadcastHub;
use crate::collector::MetricsSource;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Source for on-demand snapshots
    pub source: Arc<dyn MetricsSource>,

    /// Hub feeding the streaming endpoint
    pub hub: BroadcastHub,
}

impl ApiState {
    pub fn new(source: Arc<dyn MetricsSource>, hub: BroadcastHub) -> Self {
        Self { source, hub }
    }
}
