//! In-memory document store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use taskforge_auth::{Credential, User};
use taskforge_core::{NotificationId, ProjectId, TaskId, TenantId, UserId};
use taskforge_notifications::{Notification, NotificationFilter};
use taskforge_projects::{Project, ProjectFilter, Task, TaskFilter};
use taskforge_tenants::Tenant;

use super::{
    NotificationRepository, ProjectRepository, StoreError, StoreResult, TaskRepository,
    TenantCollection, TenantRepository, UserRepository,
};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    users: TenantCollection<UserId, User>,
    projects: TenantCollection<ProjectId, Project>,
    tasks: TenantCollection<TaskId, Task>,
    notifications: TenantCollection<NotificationId, Notification>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("tenant directory lock poisoned".into())
}

/// Newest first, ties broken by id (UUIDv7, time ordered).
fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn insert_tenant(&self, tenant: &Tenant) -> StoreResult<()> {
        let mut map = self.tenants.write().map_err(|_| poisoned())?;
        if map.values().any(|t| t.slug == tenant.slug) {
            return Err(StoreError::Conflict(format!("tenant slug '{}' is taken", tenant.slug)));
        }
        map.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn get_tenant(&self, id: TenantId) -> StoreResult<Option<Tenant>> {
        Ok(self.tenants.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let map = self.tenants.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|t| t.slug == slug).cloned())
    }

    async fn update_tenant(&self, tenant: &Tenant) -> StoreResult<()> {
        let mut map = self.tenants.write().map_err(|_| poisoned())?;
        if map.values().any(|t| t.slug == tenant.slug && t.id != tenant.id) {
            return Err(StoreError::Conflict(format!("tenant slug '{}' is taken", tenant.slug)));
        }
        if let Some(slot) = map.get_mut(&tenant.id) {
            *slot = tenant.clone();
        }
        Ok(())
    }

    async fn delete_tenant(&self, id: TenantId) -> StoreResult<bool> {
        Ok(self.tenants.write().map_err(|_| poisoned())?.remove(&id).is_some())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut map = self.users.write()?;
        let taken = map
            .iter()
            .any(|((t, _), u)| *t == user.tenant_id && u.email == user.email);
        if taken {
            return Err(StoreError::Conflict("email already registered in tenant".into()));
        }
        map.insert((user.tenant_id, user.id), user.clone());
        Ok(())
    }

    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        self.users.get(tenant_id, &id)
    }

    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.list(tenant_id)?.into_iter().find(|u| u.email == email))
    }

    async fn find_users_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        let mut found: Vec<User> = self
            .users
            .read()?
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect();
        found.sort_by_key(|u| (u.created_at, u.id));
        Ok(found)
    }

    async fn find_user_by_external(&self, provider: &str, subject: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()?
            .values()
            .find(|u| {
                matches!(&u.credential, Credential::External { provider: p, subject: s }
                    if p == provider && s == subject)
            })
            .cloned())
    }

    async fn list_users(&self, tenant_id: TenantId) -> StoreResult<Vec<User>> {
        let mut users = self.users.list(tenant_id)?;
        newest_first(&mut users, |u| (u.created_at, u.id));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut map = self.users.write()?;
        let taken = map
            .iter()
            .any(|((t, id), u)| *t == user.tenant_id && *id != user.id && u.email == user.email);
        if taken {
            return Err(StoreError::Conflict("email already registered in tenant".into()));
        }
        if let Some(slot) = map.get_mut(&(user.tenant_id, user.id)) {
            *slot = user.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<bool> {
        self.users.remove(tenant_id, &id)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.projects.upsert(project.tenant_id, project.id, project.clone())
    }

    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<Option<Project>> {
        self.projects.get(tenant_id, &id)
    }

    async fn list_projects(&self, tenant_id: TenantId, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .list(tenant_id)?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        newest_first(&mut projects, |p| (p.created_at, p.id));
        Ok(projects)
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        self.projects.replace(project.tenant_id, project.id, project.clone())?;
        Ok(())
    }

    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> StoreResult<bool> {
        self.projects.remove(tenant_id, &id)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks.upsert(task.tenant_id, task.id, task.clone())
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<Option<Task>> {
        self.tasks.get(tenant_id, &id)
    }

    async fn list_tasks(&self, tenant_id: TenantId, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .list(tenant_id)?
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        newest_first(&mut tasks, |t| (t.created_at, t.id));
        Ok(tasks)
    }

    async fn update_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks.replace(task.tenant_id, task.id, task.clone())?;
        Ok(())
    }

    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> StoreResult<bool> {
        self.tasks.remove(tenant_id, &id)
    }

    async fn delete_tasks_for_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        self.tasks.remove_where(tenant_id, |t| t.project_id == project_id)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.notifications
            .upsert(notification.tenant_id, notification.id, notification.clone())
    }

    async fn list_notifications(
        &self,
        tenant_id: TenantId,
        recipient: UserId,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let mut items: Vec<Notification> = self
            .notifications
            .list(tenant_id)?
            .into_iter()
            .filter(|n| n.recipient == recipient && filter.matches(n))
            .collect();
        newest_first(&mut items, |n| (n.created_at, n.id));
        Ok(items)
    }

    async fn count_unread(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        Ok(self
            .notifications
            .list(tenant_id)?
            .iter()
            .filter(|n| n.recipient == recipient && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, tenant_id: TenantId, recipient: UserId, ids: &[NotificationId]) -> StoreResult<u64> {
        self.notifications.update_where(tenant_id, |n| {
            n.recipient == recipient && ids.contains(&n.id) && n.mark_read()
        })
    }

    async fn mark_all_read(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        self.notifications
            .update_where(tenant_id, |n| n.recipient == recipient && n.mark_read())
    }

    async fn delete_notification(&self, tenant_id: TenantId, recipient: UserId, id: NotificationId) -> StoreResult<bool> {
        let removed = self
            .notifications
            .remove_where(tenant_id, |n| n.id == id && n.recipient == recipient)?;
        Ok(removed > 0)
    }

    async fn clear_notifications(&self, tenant_id: TenantId, recipient: UserId) -> StoreResult<u64> {
        self.notifications.remove_where(tenant_id, |n| n.recipient == recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskforge_auth::{NewUser, Role, UserStatus};
    use taskforge_notifications::{NotificationType, RelatedResource, ResourceType};
    use taskforge_tenants::NewTenant;

    fn tenant(slug: &str) -> Tenant {
        Tenant::create(
            NewTenant {
                name: "Acme".into(),
                slug: slug.into(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn user(tenant_id: TenantId, email: &str) -> User {
        User::create(
            NewUser {
                tenant_id,
                name: "Ada".into(),
                email: email.into(),
                role: Role::TeamMember,
                status: UserStatus::Active,
                avatar: None,
                credential: Credential::Password { hash: "h".into() },
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn notification(tenant_id: TenantId, recipient: UserId) -> Notification {
        Notification {
            id: NotificationId::new(),
            tenant_id,
            kind: NotificationType::TaskAssigned,
            title: "t".into(),
            message: "m".into(),
            recipient,
            sender: None,
            read: false,
            related_resource: RelatedResource {
                resource_type: ResourceType::Task,
                resource_id: uuid::Uuid::now_v7(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tenant_slug_is_unique() {
        let store = InMemoryStore::new();
        store.insert_tenant(&tenant("acme")).await.unwrap();
        assert!(matches!(
            store.insert_tenant(&tenant("acme")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn email_is_unique_per_tenant_only() {
        let store = InMemoryStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        store.insert_user(&user(a, "ada@example.com")).await.unwrap();
        store.insert_user(&user(b, "ada@example.com")).await.unwrap();
        assert!(matches!(
            store.insert_user(&user(a, "ada@example.com")).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.find_users_by_email("ada@example.com").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn users_are_invisible_across_tenants() {
        let store = InMemoryStore::new();
        let u = user(TenantId::new(), "ada@example.com");
        store.insert_user(&u).await.unwrap();
        assert!(store.get_user(TenantId::new(), u.id).await.unwrap().is_none());
        assert!(!store.delete_user(TenantId::new(), u.id).await.unwrap());
    }

    #[tokio::test]
    async fn mark_read_counts_only_flips() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let me = UserId::new();
        let mine = notification(tenant_id, me);
        let theirs = notification(tenant_id, UserId::new());
        store.insert_notification(&mine).await.unwrap();
        store.insert_notification(&theirs).await.unwrap();

        let ids = [mine.id, theirs.id];
        assert_eq!(store.mark_read(tenant_id, me, &ids).await.unwrap(), 1);
        assert_eq!(store.mark_read(tenant_id, me, &ids).await.unwrap(), 0);
        assert_eq!(store.count_unread(tenant_id, me).await.unwrap(), 0);

        let untouched = store
            .list_notifications(tenant_id, theirs.recipient, &NotificationFilter::default())
            .await
            .unwrap();
        assert!(!untouched[0].read);
    }

    #[tokio::test]
    async fn recipient_cannot_delete_foreign_notification() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let n = notification(tenant_id, UserId::new());
        store.insert_notification(&n).await.unwrap();
        assert!(!store.delete_notification(tenant_id, UserId::new(), n.id).await.unwrap());
        assert!(store.delete_notification(tenant_id, n.recipient, n.id).await.unwrap());
    }
}
