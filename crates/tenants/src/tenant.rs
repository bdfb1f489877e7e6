use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskforge_core::error::require_text;
use taskforge_core::{DomainError, DomainResult, Entity, TenantId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant
// ─────────────────────────────────────────────────────────────────────────────

/// An isolated organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Globally unique, lowercase `[a-z0-9-]`.
    pub slug: String,
    pub plan: Plan,
    pub active: bool,
    pub max_users: u32,
    pub owner: Option<UserId>,
    pub logo: Option<String>,
    pub custom_domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
}

pub const MAX_NAME_CHARS: usize = 50;
pub const DEFAULT_MAX_USERS: u32 = 5;

impl Tenant {
    pub fn create(new: NewTenant, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = require_text("tenant name", &new.name, MAX_NAME_CHARS)?;
        let slug = new.slug.trim().to_lowercase();
        validate_slug(&slug)?;

        Ok(Self {
            id: TenantId::new(),
            name,
            slug,
            plan: Plan::default(),
            active: true,
            max_users: DEFAULT_MAX_USERS,
            owner: None,
            logo: None,
            custom_domain: None,
            created_at: now,
        })
    }

    pub fn summary(&self) -> TenantSummary {
        TenantSummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            plan: self.plan,
        }
    }
}

impl Entity for Tenant {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub plan: Plan,
}

pub fn validate_slug(slug: &str) -> DomainResult<()> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 63
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');

    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(
            "slug may only contain lowercase letters, digits and single inner hyphens",
        ))
    }
}

/// Derive a slug from a display name: lowercase ASCII alphanumerics, runs of
/// anything else collapsed into one hyphen. Empty input yields `"workspace"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(48);
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("workspace");
    }
    slug
}
