use serde::{Deserialize, Serialize};

use taskforge_core::{ProjectId, UserId};

/// Client → server frames: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinTenant,
    #[serde(rename_all = "camelCase")]
    JoinProject { project_id: ProjectId },
    /// `user_id` is optional and, when present, must name the session user.
    #[serde(rename_all = "camelCase")]
    JoinUserRoom {
        #[serde(default)]
        user_id: Option<UserId>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveProject { project_id: ProjectId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerEvent {
    TaskUpdated,
    TaskAssigned,
    ProjectUpdated,
    Notification,
    /// Acknowledges a successful join/leave.
    Joined,
    Left,
    Error,
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: ServerEvent,
    pub data: serde_json::Value,
}

impl ServerFrame {
    pub fn new(event: ServerEvent, data: serde_json::Value) -> Self {
        Self { event, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ServerEvent::Error, serde_json::json!({ "message": message.into() }))
    }
}
