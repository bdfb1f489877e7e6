use std::collections::HashSet;

use thiserror::Error;

use taskforge_core::{TenantId, UserId};

use crate::{Room, RoomEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("room belongs to another tenant")]
    ForeignTenant,

    #[error("cannot join another user's room")]
    ForeignUser,

    #[error("not authorized to join this project")]
    ProjectDenied,
}

/// The rooms a single verified connection has joined.
///
/// Identity comes from the verified session, never from the client frames.
/// Outgoing envelopes are delivered only when both the room and its tenant
/// match this connection.
#[derive(Debug, Clone)]
pub struct RoomSet {
    tenant_id: TenantId,
    user_id: UserId,
    rooms: HashSet<Room>,
}

impl RoomSet {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            tenant_id,
            user_id,
            rooms: HashSet::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Join `room` after checking it against the session identity.
    ///
    /// Project rooms also need a project-level access decision, which the
    /// caller passes in as `project_readable`; it is ignored for other rooms.
    pub fn join(&mut self, room: Room, project_readable: bool) -> Result<(), JoinError> {
        if room.tenant_id() != self.tenant_id {
            return Err(JoinError::ForeignTenant);
        }
        match room {
            Room::Tenant { .. } => {}
            Room::User { user_id, .. } if user_id != self.user_id => {
                return Err(JoinError::ForeignUser);
            }
            Room::User { .. } => {}
            Room::Project { .. } if !project_readable => return Err(JoinError::ProjectDenied),
            Room::Project { .. } => {}
        }
        self.rooms.insert(room);
        Ok(())
    }

    pub fn leave(&mut self, room: &Room) -> bool {
        self.rooms.remove(room)
    }

    pub fn contains(&self, room: &Room) -> bool {
        self.rooms.contains(room)
    }

    /// Membership filter only. Access that can change after a join (project
    /// membership, user status) is re-checked by the socket before delivery.
    pub fn accepts(&self, envelope: &RoomEnvelope) -> bool {
        envelope.tenant_id() == self.tenant_id && self.rooms.contains(&envelope.room())
    }
}
