//! BroadcastHub - single-writer pub-sub for streaming subscribers
//!
//! One coordinator task owns the subscriber set. Callers only enqueue
//! [`HubCommand`]s on a single FIFO queue, so a subscription registered before
//! a broadcast is enqueued is always part of that broadcast.
//!
//! ```text
//! subscribe ─┐
//! unsubscribe├─► command queue ─► coordinator ─┬─► subscriber queue ─► SSE stream
//! broadcast ─┘                                 ├─► subscriber queue ─► SSE stream
//!                                              └─► ...
//! ```
//!
//! Each subscriber has a bounded queue. Delivery uses `try_send`: when a
//! subscriber's queue is full the newest message is dropped for that subscriber
//! only, so one stalled client never holds up the others.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

use super::messages::{HubCommand, SubscriberId};

const COMMAND_BUFFER: usize = 256;

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("hub has not been started")]
    NotStarted,

    #[error("hub is already running")]
    AlreadyStarted,

    #[error("hub stopped")]
    Stopped,
}

/// Coordinator task owning the subscriber set
struct HubActor {
    command_rx: mpsc::Receiver<HubCommand>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
}

impl HubActor {
    #[instrument(skip(self), name = "hub")]
    async fn run(mut self) {
        debug!("starting broadcast hub");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                HubCommand::Subscribe { id, sender } => {
                    self.subscribers.insert(id, sender);
                    debug!(subscriber = %id, total = self.subscribers.len(), "client connected");
                }

                HubCommand::Unsubscribe { id } => {
                    // dropping the sender closes the subscriber's stream
                    if self.subscribers.remove(&id).is_some() {
                        debug!(subscriber = %id, total = self.subscribers.len(), "client disconnected");
                    } else {
                        trace!(subscriber = %id, "unsubscribe for unknown subscriber");
                    }
                }

                HubCommand::Broadcast { message } => self.broadcast(message),

                HubCommand::Count { respond_to } => {
                    let _ = respond_to.send(self.subscribers.len());
                }

                HubCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        self.subscribers.clear();
        debug!("broadcast hub stopped");
    }

    fn broadcast(&mut self, message: Arc<str>) {
        trace!(subscribers = self.subscribers.len(), "broadcasting message");

        self.subscribers
            .retain(|id, sender| match sender.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %id, "subscriber queue full, dropping message");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, "subscriber went away, removing");
                    false
                }
            });
    }
}

struct HubInner {
    state: AtomicU8,
    next_id: AtomicU64,
    subscriber_buffer: usize,
    command_tx: mpsc::Sender<HubCommand>,
    pending: Mutex<Option<mpsc::Receiver<HubCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the broadcast hub; cheap to clone and share
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("state", &self.inner.state.load(Ordering::Acquire))
            .field("subscriber_buffer", &self.inner.subscriber_buffer)
            .finish()
    }
}

impl BroadcastHub {
    /// Create a hub whose subscribers each buffer up to `subscriber_buffer`
    /// messages. Nothing runs until [`start`](Self::start).
    pub fn new(subscriber_buffer: usize) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        Self {
            inner: Arc::new(HubInner {
                state: AtomicU8::new(CREATED),
                next_id: AtomicU64::new(1),
                subscriber_buffer: subscriber_buffer.max(1),
                command_tx,
                pending: Mutex::new(Some(command_rx)),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the coordinator. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), HubError> {
        if let Err(state) = self.inner.state.compare_exchange(
            CREATED,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match state {
                RUNNING => HubError::AlreadyStarted,
                _ => HubError::Stopped,
            });
        }

        let command_rx = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(HubError::AlreadyStarted)?;

        let actor = HubActor {
            command_rx,
            subscribers: HashMap::new(),
        };
        let task = tokio::spawn(actor.run());
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);

        Ok(())
    }

    /// Terminate the coordinator and close every subscriber stream.
    pub async fn stop(&self) -> Result<(), HubError> {
        let previous = self.inner.state.swap(STOPPED, Ordering::AcqRel);
        match previous {
            CREATED => {
                debug!("hub stopped before it was started");
                return Ok(());
            }
            STOPPED => return Err(HubError::Stopped),
            _ => {}
        }

        let _ = self.inner.command_tx.send(HubCommand::Shutdown).await;

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == RUNNING
    }

    /// Register a new subscriber. Every broadcast issued after this returns
    /// is delivered to it.
    pub async fn subscribe(&self) -> Result<Subscription, HubError> {
        self.ensure_running()?;

        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.subscriber_buffer);

        self.send(HubCommand::Subscribe { id, sender }).await?;

        Ok(Subscription {
            id,
            receiver,
            command_tx: self.inner.command_tx.clone(),
        })
    }

    /// Remove a subscriber; its stream ends once buffered messages are read.
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<(), HubError> {
        self.ensure_running()?;
        self.send(HubCommand::Unsubscribe { id }).await
    }

    pub async fn broadcast(&self, message: impl Into<Arc<str>>) -> Result<(), HubError> {
        self.ensure_running()?;
        self.send(HubCommand::Broadcast {
            message: message.into(),
        })
        .await
    }

    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        self.ensure_running()?;

        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Count { respond_to: tx }).await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    fn ensure_running(&self) -> Result<(), HubError> {
        match self.inner.state.load(Ordering::Acquire) {
            RUNNING => Ok(()),
            CREATED => Err(HubError::NotStarted),
            _ => Err(HubError::Stopped),
        }
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| HubError::Stopped)
    }
}

/// Inbound side of one subscriber
///
/// Yields every message broadcast after registration. Dropping it unregisters
/// the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<str>>,
    command_tx: mpsc::Sender<HubCommand>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message, `None` once the hub closed this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Arc<str>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.id;
        match self.command_tx.try_send(HubCommand::Unsubscribe { id }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let command_tx = self.command_tx.clone();
                    runtime.spawn(async move {
                        let _ = command_tx.send(command).await;
                    });
                }
            }
        }
    }
}
