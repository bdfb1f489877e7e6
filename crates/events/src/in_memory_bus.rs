//! In-process backplane for single-instance deployments and tests.

use tokio::sync::broadcast;

use crate::bus::{Backplane, BackplaneError, Subscription};
use crate::RoomEnvelope;

/// Broadcast-channel backplane.
///
/// - No IO
/// - Publishing with no subscribers is not an error
#[derive(Debug, Clone)]
pub struct InMemoryBackplane {
    sender: broadcast::Sender<RoomEnvelope>,
}

impl InMemoryBackplane {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

impl Backplane for InMemoryBackplane {
    fn publish(&self, envelope: RoomEnvelope) -> Result<(), BackplaneError> {
        // Err only means nobody is listening right now.
        let _ = self.sender.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }
}
