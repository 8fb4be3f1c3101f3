//! Cooldown-gated alert fan-out
//!
//! The [`Dispatcher`] holds the sinks and the time of the last authorized
//! dispatch behind a single lock. A notification arriving inside the cooldown
//! window is dropped, otherwise every sink is invoked in registration order.

pub mod discord;

pub use discord::DiscordSink;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::fetch::FetchError;

/// Failure reported by a single sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request rejected: {0}")]
    Request(#[from] FetchError),

    #[error("delivery failed after {attempts} attempt(s) (status {status:?}): {reason}")]
    Delivery {
        status: Option<u16>,
        attempts: u32,
        reason: String,
    },
}

/// Stable identifier of a sink implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Discord,
    Log,
    Custom(&'static str),
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Discord => f.write_str("discord"),
            SinkKind::Log => f.write_str("log"),
            SinkKind::Custom(name) => f.write_str(name),
        }
    }
}

/// A destination for alert messages
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn kind(&self) -> SinkKind;

    async fn deliver(&self, message: &str) -> Result<(), SinkError>;
}

/// Writes alerts to the process log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Log
    }

    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        warn!(target: "delphos::alert", "{message}");
        Ok(())
    }
}

/// What a call to [`Dispatcher::notify`] decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Inside the cooldown window; nothing was sent
    Suppressed { remaining: Duration },
    /// Every sink was invoked
    Dispatched {
        delivered: usize,
        failed: Vec<(SinkKind, String)>,
    },
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }
}

struct DispatcherState {
    last_dispatch: Option<Instant>,
    sinks: Vec<Arc<dyn AlertSink>>,
}

pub struct Dispatcher {
    cooldown: Duration,
    state: Mutex<DispatcherState>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: Mutex::new(DispatcherState {
                last_dispatch: None,
                sinks: Vec::new(),
            }),
        }
    }

    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.state.get_mut().sinks.push(Arc::new(sink));
        self
    }

    pub async fn add_sink(&self, sink: Arc<dyn AlertSink>) {
        let mut state = self.state.lock().await;
        debug!(sink = %sink.kind(), "registering alert sink");
        state.sinks.push(sink);
    }

    pub async fn sink_count(&self) -> usize {
        self.state.lock().await.sinks.len()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Send `message` to every sink unless the cooldown window is still open.
    ///
    /// The lock is held across sink invocation so concurrent callers observe
    /// a single, atomic cooldown decision.
    #[instrument(skip_all)]
    pub async fn notify(&self, message: &str) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(last) = state.last_dispatch {
            let elapsed = now.duration_since(last);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                debug!(
                    remaining_ms = remaining.as_millis() as u64,
                    "alert suppressed by cooldown"
                );
                return DispatchOutcome::Suppressed { remaining };
            }
        }

        let mut delivered = 0;
        let mut failed = Vec::new();
        for sink in &state.sinks {
            match sink.deliver(message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(sink = %sink.kind(), "failed to deliver alert: {e}");
                    failed.push((sink.kind(), e.to_string()));
                }
            }
        }

        state.last_dispatch = Some(now);
        info!(delivered, failed = failed.len(), "alert dispatched");

        DispatchOutcome::Dispatched { delivered, failed }
    }
}
