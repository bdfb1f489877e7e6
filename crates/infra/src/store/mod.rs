//! Tenant-scoped document repositories.
//!
//! Every read and write of a tenant-owned document takes the acting tenant id
//! explicitly. A document owned by another tenant is reported exactly like a
//! missing one (`Ok(None)` / `Ok(false)`), so callers surface `NotFound` and
//! never confirm cross-tenant existence.
//!
//! Two backends implement the same traits:
//! - [`InMemoryStore`]: `RwLock`ed maps for tests/dev
//! - [`PgDocumentStore`]: one JSONB `documents` table in Postgres

use async_trait::async_trait;
use thiserror::Error;

use taskforge_auth::User;
use taskforge_core::{NotificationId, ProjectId, TaskId, TenantId, UserId};
use taskforge_notifications::{Notification, NotificationFilter};
use taskforge_projects::{Project, ProjectFilter, Task, TaskFilter};
use taskforge_tenants::Tenant;

pub mod in_memory;
pub mod postgres;
pub mod tenant_collection;

pub use in_memory::InMemoryStore;
pub use postgres::PgDocumentStore;
pub use tenant_collection::TenantCollection;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed (connection, lock poisoning, query error).
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored document could not be (de)serialized.
    #[error("document serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    async fn insert_tenant(&self, tenant: &Tenant) -> StoreResult<()>;
    async fn get_tenant(&self, id: TenantId) -> StoreResult<Option<Tenant>>;
    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>>;
    async fn update_tenant(&self, tenant: &Tenant) -> StoreResult<()>;
    async fn delete_tenant(&self, id: TenantId) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when `(tenant_id, email)` is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>>;
    /// Every user with this email in any tenant, oldest first.
    async fn find_users_by_email(&self, email: &str) -> StoreResult<Vec<User>>;
    async fn find_user_by_external(&self, provider: &str, subject: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, tenant_id: TenantId) -> StoreResult<Vec<User>>;
    /// Fails with `Conflict` when the new email collides within the tenant.
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<Option<Project>>;
    /// Matching projects, newest first.
    async fn list_projects(&self, tenant_id: TenantId, filter: &ProjectFilter) -> StoreResult<Vec<Project>>;
    async fn update_project(&self, project: &Project) -> StoreResult<()>;
    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;
    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<Option<Task>>;
    /// Matching tasks, newest first.
    async fn list_tasks(&self, tenant_id: TenantId, filter: &TaskFilter) -> StoreResult<Vec<Task>>;
    async fn update_task(&self, task: &Task) -> StoreResult<()>;
    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<bool>;
    /// Cascade used by project deletion. Returns the number of tasks removed.
    async fn delete_tasks_for_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;
    /// The recipient's notifications, newest first.
    async fn list_notifications(
        &self,
        tenant_id: TenantId,
        recipient: UserId,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>>;
    async fn count_unread(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64>;
    /// Mark the given notifications read. Returns how many actually flipped.
    async fn mark_read(&self, tenant_id: TenantId, recipient: UserId, ids: &[NotificationId]) -> StoreResult<u64>;
    async fn mark_all_read(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64>;
    async fn delete_notification(&self, tenant_id: TenantId, recipient: UserId, id: NotificationId) -> StoreResult<bool>;
    async fn clear_notifications(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64>;
}

/// Everything the application needs from persistence.
pub trait Store:
    TenantRepository + UserRepository + ProjectRepository + TaskRepository + NotificationRepository
{
}

impl<S> Store for S where
    S: TenantRepository + UserRepository + ProjectRepository + TaskRepository + NotificationRepository
{
}
