//! API error taxonomy and its HTTP mapping.
//!
//! Every failure leaves a handler as an [`ApiError`]. Internal causes of
//! `Upstream` errors are logged and never written to the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use taskforge_auth::{AuthError, AuthzError};
use taskforge_core::DomainError;
use taskforge_infra::{MailError, OAuthError, StoreError};

use crate::rate_limit::RateLimited;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Tenant ID is required")]
    TenantRequired,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Tenant is inactive")]
    TenantInactive,

    #[error("{0}")]
    NotFound(String),

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Store, mail or identity provider failure. The text is for logs only.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

pub const NOT_AUTHORIZED: &str = "Not authorized to access this route";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthenticated(NOT_AUTHORIZED.into())
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthenticated(INVALID_CREDENTIALS.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn upstream(cause: impl std::fmt::Display) -> Self {
        Self::Upstream(cause.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::TenantRequired => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::TenantInactive => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::TenantNotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::TenantRequired => "tenant_required",
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::TenantInactive => "tenant_inactive",
            ApiError::NotFound(_) => "not_found",
            ApiError::TenantNotFound => "tenant_not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited => "rate_limited",
            ApiError::Upstream(_) => "upstream_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Upstream(cause) => {
                tracing::error!(error = %cause, "request failed on an upstream dependency");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        json_error(self.status(), self.code(), message)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::InvalidId(msg) => ApiError::Validation(msg),
            DomainError::NotFound(what) => ApiError::not_found(what),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::conflict("Duplicate field value entered"),
            other => ApiError::upstream(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::AccountDisabled | AuthError::ExternalAccount => {
                ApiError::invalid_credentials()
            }
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => ApiError::unauthenticated(),
            AuthError::Crypto(msg) => ApiError::Upstream(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(role) => {
                ApiError::Forbidden(format!("User role {role} is not authorized to access this route"))
            }
        }
    }
}

impl From<RateLimited> for ApiError {
    fn from(_: RateLimited) -> Self {
        ApiError::RateLimited
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::upstream(err)
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        ApiError::upstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn upstream_never_echoes_the_cause() {
        let (status, json) = body(ApiError::from(StoreError::Backend(
            "connection refused: 10.0.0.3:5432".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json,
            json!({"success": false, "error": "upstream_error", "message": "Server error"})
        );
    }

    #[tokio::test]
    async fn store_conflicts_hide_index_details() {
        let (status, json) = body(ApiError::from(StoreError::Conflict(
            "database error in insert_doc: duplicate key documents_user_email".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!json["message"].as_str().unwrap().contains("documents_user_email"));
    }

    #[tokio::test]
    async fn rate_limited_is_429_with_the_envelope() {
        let (status, json) = body(ApiError::from(RateLimited)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["error"], "rate_limited");
        assert_eq!(json["success"], false);
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(ApiError::TenantRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::TenantInactive.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::TenantNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::invalid_credentials().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(DomainError::not_found("Project")).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn external_account_login_is_indistinguishable() {
        let a = ApiError::from(AuthError::ExternalAccount).to_string();
        let b = ApiError::from(AuthError::InvalidCredentials).to_string();
        assert_eq!(a, b);
    }
}
