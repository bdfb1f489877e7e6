//! Postgres document store.
//!
//! Every entity is stored as a JSONB body in a single `documents` table keyed
//! by `(collection, tenant_id, id)`. Tenants use their own id as `tenant_id`.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |---|---|---|
//! | unique violation | `23505` | `Conflict` |
//! | any other database/pool error | - | `Backend` |
//! | JSON body that no longer matches the type | - | `Serialization` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use taskforge_auth::User;
use taskforge_core::{NotificationId, ProjectId, TaskId, TenantId, UserId};
use taskforge_notifications::{Notification, NotificationFilter};
use taskforge_projects::{Project, ProjectFilter, Task, TaskFilter};
use taskforge_tenants::Tenant;

use super::{
    NotificationRepository, ProjectRepository, StoreError, StoreResult, TaskRepository, TenantRepository,
    UserRepository,
};

const TENANTS: &str = "tenants";
const USERS: &str = "users";
const PROJECTS: &str = "projects";
const TASKS: &str = "tasks";
const NOTIFICATIONS: &str = "notifications";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        tenant_id UUID NOT NULL,
        id UUID NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, tenant_id, id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS documents_tenant_slug
        ON documents ((body->>'slug'))
        WHERE collection = 'tenants'
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS documents_user_email
        ON documents (tenant_id, (body->>'email'))
        WHERE collection = 'users'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS documents_tenant_listing
        ON documents (collection, tenant_id, created_at DESC)
    "#,
];

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the table and indexes if they are missing.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn insert_doc<T: Serialize + Sync>(
        &self,
        collection: &str,
        tenant_id: Uuid,
        id: Uuid,
        created_at: DateTime<Utc>,
        body: &T,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, tenant_id, id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(collection)
        .bind(tenant_id)
        .bind(id)
        .bind(to_json(body)?)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_doc", e))?;
        Ok(())
    }

    async fn update_doc<T: Serialize + Sync>(
        &self,
        collection: &str,
        tenant_id: Uuid,
        id: Uuid,
        body: &T,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE documents SET body = $4
            WHERE collection = $1 AND tenant_id = $2 AND id = $3
            "#,
        )
        .bind(collection)
        .bind(tenant_id)
        .bind(id)
        .bind(to_json(body)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_doc", e))?;
        Ok(())
    }

    async fn get_doc<T: DeserializeOwned>(&self, collection: &str, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<T>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND id = $3
            "#,
        )
        .bind(collection)
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_doc", e))?;

        row.map(|r| decode_row(&r)).transpose()
    }

    /// Every document of `collection` in the tenant, newest first.
    async fn list_docs<T: DeserializeOwned>(&self, collection: &str, tenant_id: Uuid) -> StoreResult<Vec<T>> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND tenant_id = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(collection)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_docs", e))?;

        rows.iter().map(decode_row).collect()
    }

    async fn delete_doc(&self, collection: &str, tenant_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND id = $3
            "#,
        )
        .bind(collection)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_doc", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn to_json<T: Serialize>(body: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_row<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> StoreResult<T> {
    let body: serde_json::Value = row
        .try_get("body")
        .map_err(|e| map_sqlx_error("decode_row", e))?;
    serde_json::from_value(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[async_trait]
impl TenantRepository for PgDocumentStore {
    async fn insert_tenant(&self, tenant: &Tenant) -> StoreResult<()> {
        let id = *tenant.id.as_uuid();
        self.insert_doc(TENANTS, id, id, tenant.created_at, tenant).await
    }

    async fn get_tenant(&self, id: TenantId) -> StoreResult<Option<Tenant>> {
        let id = *id.as_uuid();
        self.get_doc(TENANTS, id, id).await
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND body->>'slug' = $2
            "#,
        )
        .bind(TENANTS)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_tenant_by_slug", e))?;
        row.map(|r| decode_row(&r)).transpose()
    }

    async fn update_tenant(&self, tenant: &Tenant) -> StoreResult<()> {
        let id = *tenant.id.as_uuid();
        self.update_doc(TENANTS, id, id, tenant).await
    }

    async fn delete_tenant(&self, id: TenantId) -> StoreResult<bool> {
        let id = *id.as_uuid();
        self.delete_doc(TENANTS, id, id).await
    }
}

#[async_trait]
impl UserRepository for PgDocumentStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.insert_doc(USERS, *user.tenant_id.as_uuid(), *user.id.as_uuid(), user.created_at, user)
            .await
    }

    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        self.get_doc(USERS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }

    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND body->>'email' = $3
            "#,
        )
        .bind(USERS)
        .bind(*tenant_id.as_uuid())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.map(|r| decode_row(&r)).transpose()
    }

    async fn find_users_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND body->>'email' = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(USERS)
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_users_by_email", e))?;
        rows.iter().map(decode_row).collect()
    }

    async fn find_user_by_external(&self, provider: &str, subject: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1
              AND body->'credential'->>'kind' = 'external'
              AND body->'credential'->>'provider' = $2
              AND body->'credential'->>'subject' = $3
            LIMIT 1
            "#,
        )
        .bind(USERS)
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_external", e))?;
        row.map(|r| decode_row(&r)).transpose()
    }

    async fn list_users(&self, tenant_id: TenantId) -> StoreResult<Vec<User>> {
        self.list_docs(USERS, *tenant_id.as_uuid()).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.update_doc(USERS, *user.tenant_id.as_uuid(), *user.id.as_uuid(), user).await
    }

    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<bool> {
        self.delete_doc(USERS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }
}

#[async_trait]
impl ProjectRepository for PgDocumentStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.insert_doc(
            PROJECTS,
            *project.tenant_id.as_uuid(),
            *project.id.as_uuid(),
            project.created_at,
            project,
        )
        .await
    }

    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<Option<Project>> {
        self.get_doc(PROJECTS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }

    async fn list_projects(&self, tenant_id: TenantId, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        let projects: Vec<Project> = self.list_docs(PROJECTS, *tenant_id.as_uuid()).await?;
        Ok(projects.into_iter().filter(|p| filter.matches(p)).collect())
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        self.update_doc(PROJECTS, *project.tenant_id.as_uuid(), *project.id.as_uuid(), project)
            .await
    }

    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<bool> {
        self.delete_doc(PROJECTS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }
}

#[async_trait]
impl TaskRepository for PgDocumentStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.insert_doc(TASKS, *task.tenant_id.as_uuid(), *task.id.as_uuid(), task.created_at, task)
            .await
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<Option<Task>> {
        self.get_doc(TASKS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }

    async fn list_tasks(&self, tenant_id: TenantId, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let tasks: Vec<Task> = self.list_docs(TASKS, *tenant_id.as_uuid()).await?;
        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    async fn update_task(&self, task: &Task) -> StoreResult<()> {
        self.update_doc(TASKS, *task.tenant_id.as_uuid(), *task.id.as_uuid(), task).await
    }

    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<bool> {
        self.delete_doc(TASKS, *tenant_id.as_uuid(), *id.as_uuid()).await
    }

    async fn delete_tasks_for_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND body->>'projectId' = $3
            "#,
        )
        .bind(TASKS)
        .bind(*tenant_id.as_uuid())
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_tasks_for_project", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationRepository for PgDocumentStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.insert_doc(
            NOTIFICATIONS,
            *notification.tenant_id.as_uuid(),
            *notification.id.as_uuid(),
            notification.created_at,
            notification,
        )
        .await
    }

    async fn list_notifications(
        &self,
        tenant_id: TenantId,
        recipient: UserId,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND body->>'recipient' = $3
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(recipient.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_notifications", e))?;

        let items = rows
            .iter()
            .map(decode_row::<Notification>)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(items.into_iter().filter(|n| filter.matches(n)).collect())
    }

    async fn count_unread(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS unread FROM documents
            WHERE collection = $1 AND tenant_id = $2
              AND body->>'recipient' = $3
              AND (body->>'read')::boolean = false
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(recipient.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_unread", e))?;
        let unread: i64 = row.try_get("unread").map_err(|e| map_sqlx_error("count_unread", e))?;
        Ok(unread as u64)
    }

    async fn mark_read(&self, tenant_id: TenantId, recipient: UserId, ids: &[NotificationId]) -> StoreResult<u64> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE documents SET body = jsonb_set(body, '{read}', 'true'::jsonb)
            WHERE collection = $1 AND tenant_id = $2
              AND body->>'recipient' = $3
              AND id = ANY($4)
              AND (body->>'read')::boolean = false
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(recipient.to_string())
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_read", e))?;
        Ok(result.rows_affected())
    }

    async fn mark_all_read(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET body = jsonb_set(body, '{read}', 'true'::jsonb)
            WHERE collection = $1 AND tenant_id = $2
              AND body->>'recipient' = $3
              AND (body->>'read')::boolean = false
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(recipient.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_all_read", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, tenant_id: TenantId, recipient: UserId, id: NotificationId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND id = $3 AND body->>'recipient' = $4
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .bind(recipient.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_notification", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_notifications(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND tenant_id = $2 AND body->>'recipient' = $3
            "#,
        )
        .bind(NOTIFICATIONS)
        .bind(*tenant_id.as_uuid())
        .bind(recipient.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("clear_notifications", e))?;
        Ok(result.rows_affected())
    }
}
