//! `taskforge-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model, and pagination.

pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use entity::{Entity, TenantScoped};
pub use error::{DomainError, DomainResult};
pub use id::{NotificationId, ProjectId, TaskId, TenantId, UserId};
pub use page::{Page, PageRequest};
