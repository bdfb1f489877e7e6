use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::Map;

use taskforge_core::{PageRequest, ProjectId, TaskId, TenantId, UserId};
use taskforge_events::ServerEvent;
use taskforge_notifications::NotificationDraft;
use taskforge_projects::{
    can_create_task, task_access, NewTask, Project, ProjectFilter, Task, TaskChange, TaskFilter, TaskPatch,
    TaskStatus,
};

use crate::app::dto::{self, ValidJson};
use crate::app::errors::ApiError;
use crate::app::notify;
use crate::app::routes::projects::ensure_tenant_users;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/comments", post(add_comment))
}

pub async fn list_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TaskListQuery>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    let assigned_to = if query.my_tasks.unwrap_or(false) {
        Some(actor.user_id)
    } else {
        query
            .assigned_to
            .as_deref()
            .map(|raw| raw.parse::<UserId>())
            .transpose()?
    };
    let filter = TaskFilter {
        project: query.project.as_deref().map(|raw| raw.parse::<ProjectId>()).transpose()?,
        status: query.status,
        priority: query.priority,
        assigned_to,
    };

    let mut tasks = services.store.list_tasks(tenant.tenant_id(), &filter).await?;
    if !actor.is_admin() {
        let projects: HashMap<ProjectId, Project> = services
            .store
            .list_projects(tenant.tenant_id(), &ProjectFilter::default())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        tasks.retain(|task| {
            projects
                .get(&task.project_id)
                .is_some_and(|project| task_access(&actor, project, task).read)
        });
    }

    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE).slice(tasks);
    Ok(dto::paged(page, Map::new()))
}

pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    let tenant_id = tenant.tenant_id();

    let project_id: ProjectId = dto::parse_id(&body.project, "Project")?;
    let project = services
        .store
        .get_project(tenant_id, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !can_create_task(&actor, &project) {
        return Err(ApiError::forbidden("Not authorized to create tasks in this project"));
    }
    ensure_tenant_users(&services, tenant_id, body.assigned_to).await?;

    let now = Utc::now();
    let task = Task::create(
        tenant_id,
        actor.user_id,
        NewTask {
            project_id,
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            due_date: body.due_date,
            assigned_to: body.assigned_to,
            attachments: body.attachments.into_iter().map(|a| a.into_attachment(now)).collect(),
            tags: body.tags,
        },
        now,
    )?;
    services.store.insert_task(&task).await?;
    tracing::info!(task_id = %task.id, project_id = %project.id, "task created");

    notify::push_to_project(&services, tenant_id, project.id, ServerEvent::TaskUpdated, &task);
    if let Some(assignee) = task.assigned_to {
        notify::deliver(
            &services,
            tenant_id,
            NotificationDraft::task_assigned(&task, &project, assignee, actor.user_id),
        )
        .await;
        notify::push_to_user(&services, tenant_id, assignee, ServerEvent::TaskAssigned, &task);
    }

    Ok(dto::created(task))
}


pub async fn get_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (task, project) = load_with_project(&services, tenant.tenant_id(), &id).await?;
    if !task_access(&principal.actor(), &project, &task).read {
        return Err(ApiError::not_found("Task"));
    }
    Ok(dto::ok(task))
}

pub async fn update_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateTaskRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    let tenant_id = tenant.tenant_id();

    let (mut task, project) = load_with_project(&services, tenant_id, &id).await?;
    let access = task_access(&actor, &project, &task);
    if !access.read {
        return Err(ApiError::not_found("Task"));
    }
    if !access.write {
        return Err(ApiError::forbidden("Not authorized to update this task"));
    }
    ensure_tenant_users(&services, tenant_id, body.assigned_to.flatten()).await?;

    let change = task.apply(
        TaskPatch {
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            due_date: body.due_date,
            assigned_to: body.assigned_to,
            tags: body.tags,
        },
        Utc::now(),
    )?;
    if !change.fields_changed {
        return Ok(dto::ok(task));
    }

    services.store.update_task(&task).await?;
    tracing::info!(task_id = %task.id, status = %task.status, "task updated");

    let drafts = update_drafts(&task, &project, &change, actor.user_id);
    notify::deliver_all(&services, tenant_id, drafts).await;

    notify::push_to_project(&services, tenant_id, project.id, ServerEvent::TaskUpdated, &task);
    if let Some(assignee) = change.reassigned_to {
        notify::push_to_user(&services, tenant_id, assignee, ServerEvent::TaskAssigned, &task);
    }

    Ok(dto::ok(task))
}

pub async fn delete_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let (task, project) = load_with_project(&services, tenant_id, &id).await?;
    if !task_access(&principal.actor(), &project, &task).delete {
        return Err(ApiError::forbidden("Not authorized to delete this task"));
    }

    services.store.delete_task(tenant_id, task.id).await?;
    tracing::info!(task_id = %task.id, project_id = %project.id, "task deleted");

    notify::push_to_project(
        &services,
        tenant_id,
        project.id,
        ServerEvent::TaskUpdated,
        &serde_json::json!({ "id": task.id, "deleted": true }),
    );
    Ok(dto::ok(serde_json::json!({})))
}

pub async fn add_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::CommentRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    let tenant_id = tenant.tenant_id();

    let (mut task, project) = load_with_project(&services, tenant_id, &id).await?;
    let access = task_access(&actor, &project, &task);
    if !access.read {
        return Err(ApiError::not_found("Task"));
    }
    if !access.write {
        return Err(ApiError::forbidden("Not authorized to comment on this task"));
    }

    let comment = task.add_comment(actor.user_id, &body.text, Utc::now())?.clone();
    services.store.update_task(&task).await?;

    if let Some(assignee) = task.assigned_to.filter(|a| *a != actor.user_id) {
        notify::deliver(
            &services,
            tenant_id,
            NotificationDraft::task_comment(&task, &project, &comment.text, assignee, actor.user_id),
        )
        .await;
    }
    notify::push_to_project(&services, tenant_id, project.id, ServerEvent::TaskUpdated, &task);

    Ok(dto::created(task.comments))
}

/// A task and its project. Either one missing reads as "Task not found".
async fn load_with_project(
    services: &AppServices,
    tenant_id: TenantId,
    raw_id: &str,
) -> Result<(Task, Project), ApiError> {
    let id: TaskId = dto::parse_id(raw_id, "Task")?;
    let task = services
        .store
        .get_task(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    let project = services
        .store
        .get_project(tenant_id, task.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok((task, project))
}

/// Notifications owed for one task update, in delivery order.
fn update_drafts(task: &Task, project: &Project, change: &TaskChange, updater: UserId) -> Vec<NotificationDraft> {
    let mut drafts = Vec::new();

    if let Some(assignee) = change.reassigned_to {
        drafts.push(NotificationDraft::task_assigned(task, project, assignee, updater));
    } else if change.status_changed.is_some() {
        if let Some(assignee) = task.assigned_to.filter(|a| *a != updater) {
            drafts.push(NotificationDraft::task_status_changed(task, project, assignee, updater));
        }
    }

    if change.status_changed == Some(TaskStatus::Done)
        && project.manager != updater
        && drafts.iter().all(|d| d.recipient != project.manager)
    {
        drafts.push(NotificationDraft::task_completed(task, project, project.manager, updater));
    }

    drafts
}
