//! Entity traits: identity + tenant ownership.

use crate::TenantId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity owned by exactly one tenant.
///
/// Stores key every tenant-owned record by `(tenant_id, id)`; lookups from a
/// different tenant behave exactly like a missing record.
pub trait TenantScoped: Entity {
    fn tenant_id(&self) -> TenantId;
}
