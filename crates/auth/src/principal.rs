use serde::{Deserialize, Serialize};

use taskforge_core::{TenantId, UserId};

use crate::{Role, User};

/// The authenticated identity a request acts as.
///
/// Built by the identity gate from a verified session and the stored user;
/// every authorization decision takes one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, tenant_id: TenantId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.tenant_id, user.role)
    }
}
