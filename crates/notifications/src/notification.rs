use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskforge_core::{Entity, NotificationId, TenantId, TenantScoped, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskUpdated,
    TaskComment,
    ProjectAdded,
    ProjectUpdated,
    UserInvited,
    UserJoined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Task,
    Project,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResource {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
}

/// An in-app notification, addressed to exactly one recipient in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub read: bool,
    pub related_resource: RelatedResource,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Mark as read. Returns `true` only when the flag actually flipped.
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.read;
        self.read = true;
        changed
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Notification {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationFilter {
    pub read: Option<bool>,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        self.read.is_none_or(|r| n.read == r)
    }
}
