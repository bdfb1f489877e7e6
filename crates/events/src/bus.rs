//! Backplane publishing/subscription abstraction (mechanics only).
//!
//! The backplane carries [`RoomEnvelope`]s between every server instance and
//! every open socket. It is intentionally **lossy**:
//!
//! - **No persistence**: the store is the source of truth; clients re-fetch on reconnect
//! - **Broadcast semantics**: each subscription sees every envelope published after it subscribed
//! - **No room routing**: subscribers filter by their own joined rooms
//!
//! A subscriber that falls behind skips envelopes instead of blocking publishers.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::RoomEnvelope;

#[derive(Debug, Error)]
pub enum BackplaneError {
    #[error("backplane transport error: {0}")]
    Transport(String),

    #[error("failed to serialize envelope: {0}")]
    Serialize(String),
}

/// A subscription to the backplane.
///
/// Designed for a single consumer task (one per socket connection).
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<RoomEnvelope>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<RoomEnvelope>) -> Self {
        Self { receiver }
    }

    /// Wait for the next envelope. Returns `None` once the backplane is gone.
    ///
    /// Envelopes missed because this subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<RoomEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "realtime subscriber lagged; frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive, used by tests and drain loops.
    pub fn try_recv(&mut self) -> Option<RoomEnvelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Pub/sub transport for room-addressed frames.
///
/// `publish()` failing is never fatal to the mutation that triggered it;
/// callers log and move on.
pub trait Backplane: Send + Sync {
    fn publish(&self, envelope: RoomEnvelope) -> Result<(), BackplaneError>;

    fn subscribe(&self) -> Subscription;
}

impl<B> Backplane for Arc<B>
where
    B: Backplane + ?Sized,
{
    fn publish(&self, envelope: RoomEnvelope) -> Result<(), BackplaneError> {
        (**self).publish(envelope)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
