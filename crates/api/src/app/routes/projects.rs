use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::Map;

use taskforge_auth::{authorize, Actor, Role};
use taskforge_core::{PageRequest, ProjectId, TenantId, UserId};
use taskforge_events::ServerEvent;
use taskforge_notifications::NotificationDraft;
use taskforge_projects::{project_access, NewProject, Project, ProjectChange, ProjectFilter, ProjectPatch};

use crate::app::dto::{self, ValidJson};
use crate::app::errors::ApiError;
use crate::app::notify;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", get(get_project).put(update_project).delete(delete_project))
}

pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ProjectListQuery>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    let filter = ProjectFilter {
        status: query.status,
        priority: query.priority,
        // Admins see every project of the tenant.
        viewer: (!actor.is_admin()).then_some(actor),
    };

    let projects = services.store.list_projects(tenant.tenant_id(), &filter).await?;
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE).slice(projects);
    Ok(dto::paged(page, Map::new()))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::CreateProjectRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, Role::MANAGERS)?;

    let manager = body.manager.unwrap_or(actor.user_id);
    ensure_tenant_users(&services, tenant.tenant_id(), std::iter::once(manager).chain(body.members.iter().copied()))
        .await?;

    let project = Project::create(
        tenant.tenant_id(),
        NewProject {
            name: body.name,
            description: body.description,
            start_date: body.start_date,
            end_date: body.end_date,
            status: body.status,
            priority: body.priority,
            manager,
            members: body.members,
            tags: body.tags,
        },
        Utc::now(),
    )?;
    services.store.insert_project(&project).await?;
    tracing::info!(tenant_id = %project.tenant_id, project_id = %project.id, "project created");

    let drafts = project
        .members
        .iter()
        .filter(|m| **m != actor.user_id)
        .map(|m| NotificationDraft::project_added(&project, *m, actor.user_id))
        .collect();
    notify::deliver_all(&services, tenant.tenant_id(), drafts).await;

    Ok(dto::created(project))
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let project = load_readable(&services, tenant.tenant_id(), &principal.actor(), &id).await?;
    Ok(dto::ok(project))
}

pub async fn update_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateProjectRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, Role::MANAGERS)?;

    let mut project = load_readable(&services, tenant.tenant_id(), &actor, &id).await?;
    if !project_access(&actor, &project).write {
        return Err(ApiError::forbidden("Not authorized to update this project"));
    }

    let referenced: Vec<UserId> = body
        .manager
        .into_iter()
        .chain(body.members.iter().flatten().copied())
        .collect();
    ensure_tenant_users(&services, tenant.tenant_id(), referenced).await?;

    let previous_members = project.members.clone();
    let change = project.apply(
        ProjectPatch {
            name: body.name,
            description: body.description,
            start_date: body.start_date,
            end_date: body.end_date,
            status: body.status,
            priority: body.priority,
            manager: body.manager,
            members: body.members,
            tags: body.tags,
        },
        Utc::now(),
    )?;

    if change.fields_changed {
        services.store.update_project(&project).await?;
        tracing::info!(project_id = %project.id, "project updated");

        let drafts = update_drafts(&project, &previous_members, &change, actor.user_id);
        notify::deliver_all(&services, tenant.tenant_id(), drafts).await;
        notify::push_to_project(&services, tenant.tenant_id(), project.id, ServerEvent::ProjectUpdated, &project);
    }

    Ok(dto::ok(project))
}

pub async fn delete_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, Role::MANAGERS)?;

    let project = load_readable(&services, tenant.tenant_id(), &actor, &id).await?;
    if !project_access(&actor, &project).delete {
        return Err(ApiError::forbidden("Not authorized to delete this project"));
    }

    let removed = services
        .store
        .delete_tasks_for_project(tenant.tenant_id(), project.id)
        .await?;
    services.store.delete_project(tenant.tenant_id(), project.id).await?;
    tracing::info!(project_id = %project.id, tasks_removed = removed, "project deleted");

    Ok(dto::ok(serde_json::json!({})))
}

/// Load a project the actor may read. Anything else is reported as missing.
pub(crate) async fn load_readable(
    services: &AppServices,
    tenant_id: TenantId,
    actor: &Actor,
    raw_id: &str,
) -> Result<Project, ApiError> {
    let id: ProjectId = dto::parse_id(raw_id, "Project")?;
    match services.store.get_project(tenant_id, id).await? {
        Some(project) if project_access(actor, &project).read => Ok(project),
        _ => Err(ApiError::not_found("Project")),
    }
}

/// Every referenced user must belong to the acting tenant.
pub(crate) async fn ensure_tenant_users(
    services: &AppServices,
    tenant_id: TenantId,
    ids: impl IntoIterator<Item = UserId>,
) -> Result<(), ApiError> {
    for id in ids {
        if services.store.get_user(tenant_id, id).await?.is_none() {
            return Err(ApiError::validation(format!("User {id} is not part of this organization")));
        }
    }
    Ok(())
}

/// `project_added` for new members, `project_updated` for the ones already there.
fn update_drafts(
    project: &Project,
    previous_members: &[UserId],
    change: &ProjectChange,
    actor: UserId,
) -> Vec<NotificationDraft> {
    let added = change
        .added_members
        .iter()
        .filter(|m| **m != actor)
        .map(|m| NotificationDraft::project_added(project, *m, actor));
    let existing = project
        .members
        .iter()
        .filter(|m| **m != actor && previous_members.contains(m))
        .map(|m| NotificationDraft::project_updated(project, *m, actor));
    added.chain(existing).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use taskforge_notifications::NotificationType;

    fn project(members: Vec<UserId>) -> Project {
        let now = Utc::now();
        Project::create(
            TenantId::new(),
            NewProject {
                name: "Apollo".into(),
                description: "Moonshot".into(),
                start_date: now,
                end_date: now + Duration::days(30),
                status: None,
                priority: None,
                manager: UserId::new(),
                members,
                tags: vec![],
            },
            now,
        )
        .unwrap()
    }

    #[test]
    fn update_drafts_split_new_and_existing_members_and_skip_the_actor() {
        let (old, actor, new) = (UserId::new(), UserId::new(), UserId::new());
        let mut p = project(vec![old, actor]);
        let previous = p.members.clone();
        let change = p
            .apply(
                ProjectPatch {
                    members: Some(vec![old, actor, new]),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        let drafts = update_drafts(&p, &previous, &change, actor);
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().any(|d| d.recipient == new && d.kind == NotificationType::ProjectAdded));
        assert!(drafts.iter().any(|d| d.recipient == old && d.kind == NotificationType::ProjectUpdated));
        assert!(drafts.iter().all(|d| d.recipient != actor));
    }
}
