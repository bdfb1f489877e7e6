//! Tenant directory: organizations and their plan/activity state.

pub mod tenant;

pub use tenant::{NewTenant, Plan, Tenant, TenantSummary, slugify, validate_slug};
