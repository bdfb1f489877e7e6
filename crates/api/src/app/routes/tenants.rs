use axum::{extract::Extension, response::Response, routing::get, Router};

use crate::app::dto;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(own_tenant))
        .route("/current", get(current_tenant))
}

/// Directory entry of the caller's own tenant. Other tenants are never listed.
pub async fn own_tenant(Extension(tenant): Extension<TenantContext>) -> Response {
    dto::list(vec![tenant.tenant().summary()])
}

pub async fn current_tenant(Extension(tenant): Extension<TenantContext>) -> Response {
    dto::ok(tenant.tenant())
}
