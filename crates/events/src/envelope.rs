use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskforge_core::TenantId;

use crate::{Room, ServerFrame};

/// A server frame addressed to one room.
///
/// This is the unit carried by the backplane. Delivery is best-effort: a
/// connection that is not listening when it is published never sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEnvelope {
    message_id: Uuid,
    room: Room,
    frame: ServerFrame,
}

impl RoomEnvelope {
    pub fn new(room: Room, frame: ServerFrame) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            room,
            frame,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn room(&self) -> Room {
        self.room
    }

    pub fn tenant_id(&self) -> TenantId {
        self.room.tenant_id()
    }

    pub fn frame(&self) -> &ServerFrame {
        &self.frame
    }

    pub fn into_frame(self) -> ServerFrame {
        self.frame
    }
}
