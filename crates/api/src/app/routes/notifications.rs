use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Map};

use taskforge_core::{NotificationId, PageRequest};
use taskforge_notifications::NotificationFilter;

use crate::app::dto::{self, ValidJson};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub const DEFAULT_PAGE_SIZE: u32 = 15;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
        .route("/clear-all", delete(clear_all))
        .route("/:id", delete(delete_notification))
}

/// The caller's notifications, newest first, with their unread count.
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::NotificationListQuery>,
) -> Result<Response, ApiError> {
    let (tenant_id, me) = (tenant.tenant_id(), principal.user_id());
    let filter = NotificationFilter { read: query.read };

    let items = services.store.list_notifications(tenant_id, me, &filter).await?;
    let unread = services.store.count_unread(tenant_id, me).await?;

    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE).slice(items);
    let mut extra = Map::new();
    extra.insert("unreadCount".into(), json!(unread));
    Ok(dto::paged(page, extra))
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::MarkReadRequest>,
) -> Result<Response, ApiError> {
    let ids = body
        .ids
        .iter()
        .map(|raw| raw.parse::<NotificationId>())
        .collect::<Result<Vec<_>, _>>()?;

    let count = services
        .store
        .mark_read(tenant.tenant_id(), principal.user_id(), &ids)
        .await?;
    Ok(counted(format!("{count} notifications marked as read"), count))
}

pub async fn mark_all_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let count = services
        .store
        .mark_all_read(tenant.tenant_id(), principal.user_id())
        .await?;
    Ok(counted("All notifications marked as read", count))
}

pub async fn clear_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let count = services
        .store
        .clear_notifications(tenant.tenant_id(), principal.user_id())
        .await?;
    Ok(counted("All notifications cleared", count))
}

/// Only the recipient may delete; anyone else sees "not found".
pub async fn delete_notification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: NotificationId = dto::parse_id(&id, "Notification")?;
    let deleted = services
        .store
        .delete_notification(tenant.tenant_id(), principal.user_id(), id)
        .await?;
    if !deleted {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(dto::ok(json!({})))
}

fn counted(message: impl Into<String>, count: u64) -> Response {
    let mut extra = Map::new();
    extra.insert("count".into(), json!(count));
    dto::message(message, extra)
}
