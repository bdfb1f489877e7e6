use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::app::services::AppServices;
use crate::middleware::{api_rate_limit, auth_rate_limit, identity_gate, tenant_gate};

pub mod auth;
pub mod notifications;
pub mod projects;
pub mod realtime;
pub mod system;
pub mod tasks;
pub mod tenants;
pub mod users;

/// Everything under `/api/v1`.
pub fn router(services: Arc<AppServices>) -> Router {
    // Rate limit runs first (outermost), then the tenant gate, then identity.
    let gated = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/update", put(auth::update_details))
        .route("/auth/updatepassword", put(auth::update_password))
        .route("/auth/invite", post(auth::invite))
        .nest("/tenants", tenants::router())
        .nest("/users", users::router())
        .nest("/projects", projects::router())
        .nest("/tasks", tasks::router())
        .nest("/notifications", notifications::router())
        .route("/realtime", get(realtime::connect))
        .layer(from_fn_with_state(services.clone(), identity_gate))
        .layer(from_fn_with_state(services.clone(), tenant_gate))
        .layer(from_fn_with_state(services.clone(), api_rate_limit));

    let credentials = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(services, auth_rate_limit));

    Router::new()
        .merge(credentials)
        .route("/auth/logout", post(auth::logout).get(auth::logout))
        .route("/auth/google", get(auth::google_start))
        .route("/auth/google/callback", get(auth::google_callback))
        .merge(gated)
}
