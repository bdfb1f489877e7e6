use serde::Deserialize;

use taskforge_auth::UserProfile;
use taskforge_core::{TenantId, UserId};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The signed-in user. Built from the `{ token, user }` login/register body.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Session {
    pub fn tenant_id(&self) -> TenantId {
        self.user.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Bearer token plus tenant header.
    pub fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.token)
            .header(TENANT_HEADER, self.tenant_id().to_string())
    }
}
