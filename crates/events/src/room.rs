use serde::{Deserialize, Serialize};

use taskforge_core::{ProjectId, TenantId, UserId};

/// A named real-time subscription group.
///
/// Every room is qualified by its tenant, so two tenants can never share a
/// room even when ids collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Room {
    Tenant { tenant_id: TenantId },
    Project { tenant_id: TenantId, project_id: ProjectId },
    User { tenant_id: TenantId, user_id: UserId },
}

impl Room {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Room::Tenant { tenant_id }
    }

    pub fn project(tenant_id: TenantId, project_id: ProjectId) -> Self {
        Room::Project {
            tenant_id,
            project_id,
        }
    }

    pub fn user(tenant_id: TenantId, user_id: UserId) -> Self {
        Room::User { tenant_id, user_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        match *self {
            Room::Tenant { tenant_id }
            | Room::Project { tenant_id, .. }
            | Room::User { tenant_id, .. } => tenant_id,
        }
    }
}

impl core::fmt::Display for Room {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Room::Tenant { tenant_id } => write!(f, "tenant:{tenant_id}"),
            Room::Project {
                tenant_id,
                project_id,
            } => write!(f, "project:{tenant_id}:{project_id}"),
            Room::User { tenant_id, user_id } => write!(f, "user:{tenant_id}:{user_id}"),
        }
    }
}
