use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::Response,
    routing::get,
    Router,
};
use serde_json::Map;

use taskforge_auth::{authorize, Role, User, UserProfile};
use taskforge_core::{TenantId, UserId};

use crate::app::dto::{self, ValidJson};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Response, ApiError> {
    let users: Vec<UserProfile> = services
        .store
        .list_users(tenant.tenant_id())
        .await?
        .iter()
        .map(User::profile)
        .collect();
    Ok(dto::list(users))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user = load_user(&services, tenant.tenant_id(), &id).await?;
    Ok(dto::ok(user.profile()))
}

/// Admin-only role/status change. Admins never change their own.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateUserRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, ADMIN_ONLY)?;

    let mut user = load_user(&services, tenant.tenant_id(), &id).await?;
    if user.id == actor.user_id {
        return Err(ApiError::validation("You cannot update your own role"));
    }
    if let Some(role) = body.role {
        user.change_role(actor.user_id, role)?;
    }
    if let Some(status) = body.status {
        user.status = status;
    }
    services.store.update_user(&user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, status = %user.status, "user updated by admin");

    Ok(dto::ok(user.profile()))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, ADMIN_ONLY)?;

    let user = load_user(&services, tenant.tenant_id(), &id).await?;
    if user.id == actor.user_id {
        return Err(ApiError::validation("You cannot delete yourself"));
    }
    services.store.delete_user(tenant.tenant_id(), user.id).await?;
    tracing::info!(user_id = %user.id, "user deleted");

    Ok(dto::message("User deleted successfully", Map::new()))
}

async fn load_user(services: &AppServices, tenant_id: TenantId, raw_id: &str) -> Result<User, ApiError> {
    let id: UserId = dto::parse_id(raw_id, "User")?;
    services
        .store
        .get_user(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}
