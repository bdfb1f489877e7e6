//! Request gates.
//!
//! - [`tenant_gate`]: resolves the acting tenant (header, cookie, then session)
//!   and attaches a [`TenantContext`]
//! - [`identity_gate`]: verifies the session token and attaches a
//!   [`PrincipalContext`]; must run after the tenant gate
//! - [`auth_rate_limit`] / [`api_rate_limit`]: per-client request budgets
//!
//! Any gate short-circuits with an [`ApiError`]; no handler runs after a
//! failed gate.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use taskforge_auth::SessionClaims;
use taskforge_core::TenantId;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};
use crate::cookies::{read_cookie, SESSION_COOKIE, TENANT_COOKIE};

pub const TENANT_HEADER: &str = "x-tenant-id";

pub async fn auth_rate_limit(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    services.auth_limiter.check(client_ip(&req))?;
    Ok(next.run(req).await)
}

pub async fn api_rate_limit(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    services.api_limiter.check(client_ip(&req))?;
    Ok(next.run(req).await)
}

/// Peer address from the connection. Servers built without connect info
/// share one budget.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn tenant_gate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant = resolve_tenant(&services, req.headers()).await?;
    req.extensions_mut().insert(tenant);
    Ok(next.run(req).await)
}

pub async fn identity_gate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or_else(ApiError::unauthenticated)?;
    let claims = services.tokens.verify(token, Utc::now())?;

    let tenant_id = req
        .extensions()
        .get::<TenantContext>()
        .map(TenantContext::tenant_id)
        .ok_or_else(ApiError::unauthenticated)?;

    // A session only acts inside the tenant it was issued for.
    if claims.tenant_id != tenant_id {
        tracing::debug!(%tenant_id, token_tenant = %claims.tenant_id, "session tenant mismatch");
        return Err(ApiError::unauthenticated());
    }

    let user = services
        .store
        .get_user(tenant_id, claims.sub)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;
    user.ensure_can_sign_in().map_err(|_| ApiError::unauthenticated())?;

    req.extensions_mut().insert(PrincipalContext::new(user));
    Ok(next.run(req).await)
}

/// Resolve the acting tenant.
///
/// Priority: `x-tenant-id` header, `tenantId` cookie, then the verified
/// session token.
pub async fn resolve_tenant(services: &AppServices, headers: &HeaderMap) -> Result<TenantContext, ApiError> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| read_cookie(headers, TENANT_COOKIE).map(str::to_string))
        .or_else(|| session_claims(services, headers).map(|c| c.tenant_id.to_string()))
        .ok_or(ApiError::TenantRequired)?;

    load_tenant(services, &raw).await
}

/// Load an active tenant by its raw id.
pub async fn load_tenant(services: &AppServices, raw: &str) -> Result<TenantContext, ApiError> {
    let tenant_id: TenantId = raw.parse().map_err(|_| ApiError::TenantNotFound)?;
    let tenant = services
        .store
        .get_tenant(tenant_id)
        .await?
        .ok_or(ApiError::TenantNotFound)?;

    if !tenant.active {
        return Err(ApiError::TenantInactive);
    }
    Ok(TenantContext::new(tenant))
}

/// Session token from `Authorization: Bearer` (preferred) or the `token` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| read_cookie(headers, SESSION_COOKIE))
}

fn session_claims(services: &AppServices, headers: &HeaderMap) -> Option<SessionClaims> {
    let token = extract_token(headers)?;
    services.tokens.verify(token, Utc::now()).ok()
}
