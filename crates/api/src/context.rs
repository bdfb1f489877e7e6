use taskforge_auth::{Actor, User};
use taskforge_core::{TenantId, UserId};
use taskforge_tenants::Tenant;

/// Tenant context for a request, attached by the tenant gate.
///
/// Present on every tenant-scoped route; the tenant is active.
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant: Tenant,
}

impl TenantContext {
    pub fn new(tenant: Tenant) -> Self {
        Self { tenant }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }
}

/// Verified session identity, attached by the identity gate.
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    user: User,
}

impl PrincipalContext {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn actor(&self) -> Actor {
        Actor::from(&self.user)
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn into_user(self) -> User {
        self.user
    }
}
