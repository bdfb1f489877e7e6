//! HTTP application wiring.
//!
//! - `services.rs`: process-scoped handles (store, mailer, identity provider, backplane)
//! - `routes/`: HTTP handlers, one file per resource
//! - `dto.rs`: request bodies and the response envelope
//! - `errors.rs`: the error taxonomy and its HTTP mapping
//! - `notify.rs`: notification/push/email fan-out shared by handlers

use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::TENANT_HEADER;

pub mod dto;
pub mod errors;
pub mod notify;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// Build the full HTTP router.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let cors = cors_layer(&services.config.cors_origins);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router(services.clone()))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(Extension(services)),
        )
}

/// Credentialed CORS for the configured client origins only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static(TENANT_HEADER)])
        .allow_credentials(true)
}

async fn route_not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "Route not found")
}
