//! Long-running tasks of the hub
//!
//! Each actor runs as an independent tokio task and is driven through a
//! cloneable handle that talks to it over an mpsc command queue.
//!
//! ```text
//!                  ┌──────────────┐
//!                  │ PollerActor  │ ◄── PollNow / Shutdown
//!                  └──────┬───────┘
//!            try_send     │      broadcast
//!        ┌────────────────┴─────────────────┐
//!        ▼                                  ▼
//! ┌──────────────┐                  ┌───────────────┐
//! │ AlertActor   │                  │ BroadcastHub  │
//! │ (evaluate +  │                  │ (coordinator) │
//! │  dispatch)   │                  └───────┬───────┘
//! └──────────────┘                          │ one queue per subscriber
//!                                    ┌──────┼──────┐
//!                                    ▼      ▼      ▼
//!                                  SSE    SSE    SSE
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: every actor has a bounded mpsc command channel
//! 2. **Queries**: oneshot channels carry replies back to the caller
//! 3. **Fan-out**: the hub copies each broadcast into per-subscriber queues

pub mod alert;
pub mod hub;
pub mod messages;
pub mod poller;

pub use alert::AlertHandle;
pub use hub::{BroadcastHub, HubError, Subscription};
pub use messages::{AlertStats, SubscriberId};
pub use poller::PollerHandle;
