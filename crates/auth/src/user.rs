//! User entity for identity management.
//!
//! Users are tenant-scoped: the same email may exist in several tenants as
//! distinct users, but `(email, tenant_id)` is unique. The credential is kept
//! on the stored entity only; API responses use [`UserProfile`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskforge_core::error::require_text;
use taskforge_core::{DomainError, DomainResult, Entity, TenantId, TenantScoped, UserId};

use crate::{AuthError, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    /// Can authenticate.
    #[default]
    Active,
    /// Created by an invitation; becomes `Active` on first login.
    Invited,
    /// Cannot authenticate.
    Disabled,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Invited => write!(f, "Invited"),
            UserStatus::Disabled => write!(f, "Disabled"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// How a user proves their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// Argon2 PHC hash of a local password.
    Password { hash: String },
    /// Authenticated by an external identity provider; no local password.
    External { provider: String, subject: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub credential: Credential,
}

pub const MAX_NAME_CHARS: usize = 50;

impl User {
    pub fn create(new: NewUser, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: UserId::new(),
            tenant_id: new.tenant_id,
            name: require_text("name", &new.name, MAX_NAME_CHARS)?,
            email: normalize_email(&new.email)?,
            role: new.role,
            status: new.status,
            avatar: new.avatar,
            credential: new.credential,
            created_at: now,
        })
    }

    pub fn is_external(&self) -> bool {
        matches!(self.credential, Credential::External { .. })
    }

    /// The local password hash, or `ExternalAccount` for provider-only users.
    pub fn password_hash(&self) -> Result<&str, AuthError> {
        match &self.credential {
            Credential::Password { hash } => Ok(hash),
            Credential::External { .. } => Err(AuthError::ExternalAccount),
        }
    }

    /// Reject users that may not hold a session.
    pub fn ensure_can_sign_in(&self) -> Result<(), AuthError> {
        match self.status {
            UserStatus::Disabled => Err(AuthError::AccountDisabled),
            UserStatus::Active | UserStatus::Invited => Ok(()),
        }
    }

    /// Role changes are admin operations and never apply to the caller.
    pub fn change_role(&mut self, actor: UserId, role: Role) -> DomainResult<()> {
        if actor == self.id {
            return Err(DomainError::validation("You cannot update your own role"));
        }
        self.role = role;
        Ok(())
    }

    pub fn update_details(&mut self, name: Option<&str>, email: Option<&str>) -> DomainResult<()> {
        if let Some(name) = name {
            self.name = require_text("name", name, MAX_NAME_CHARS)?;
        }
        if let Some(email) = email {
            self.email = normalize_email(email)?;
        }
        Ok(())
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            status: self.status,
            avatar: self.avatar.clone(),
            external_auth: self.is_external(),
            created_at: self.created_at,
        }
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for User {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Public view of a user. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub external_auth: bool,
    pub created_at: DateTime<Utc>,
}

/// Trim + lowercase an email address and check its shape.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation("Please provide a valid email"))
    }
}
