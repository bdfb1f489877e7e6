use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map};

use taskforge_auth::password::{generate_temporary_password, hash_password, random_hex, validate_password, verify_password};
use taskforge_auth::{authorize, normalize_email, Credential, NewUser, Role, User, UserStatus};
use taskforge_infra::{ExternalProfile, IdentityProvider, OutgoingEmail, StoreError};
use taskforge_notifications::NotificationDraft;
use taskforge_tenants::{slugify, NewTenant, Tenant};

use crate::app::dto::{self, ValidJson};
use crate::app::errors::ApiError;
use crate::app::notify;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};
use crate::cookies::{self, OAUTH_STATE_COOKIE, SESSION_COOKIE, TENANT_COOKIE};
use crate::middleware::{load_tenant, resolve_tenant};

const USER_EXISTS: &str = "A user with this email already exists";
const OAUTH_STATE_TTL_SECS: i64 = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Registration / login
// ─────────────────────────────────────────────────────────────────────────────

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<dto::RegisterRequest>,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    validate_password(&body.user.password)?;

    let mut tenant = Tenant::create(
        NewTenant {
            name: body.tenant.name,
            slug: body.tenant.slug,
        },
        now,
    )?;
    services.store.insert_tenant(&tenant).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::conflict("Organization slug is already taken"),
        other => other.into(),
    })?;

    let password = body.user.password;
    let credential = hash_blocking(password).await.map(|hash| Credential::Password { hash });
    let owner = match credential {
        Ok(credential) => {
            let new = NewUser {
                tenant_id: tenant.id,
                name: body.user.name,
                email: body.user.email,
                role: Role::Admin,
                status: UserStatus::Active,
                avatar: None,
                credential,
            };
            create_owner(&services, &mut tenant, new, now).await
        }
        Err(err) => Err(err),
    };

    match owner {
        Ok(user) => {
            tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "tenant registered");
            session_response(&services, &user, StatusCode::CREATED)
        }
        Err(err) => {
            discard_tenant(&services, &tenant).await;
            Err(err)
        }
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<dto::LoginRequest>,
) -> Result<Response, ApiError> {
    let tenant = match body.tenant_id.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => load_tenant(&services, raw).await?,
        None => resolve_tenant(&services, &headers).await?,
    };

    let email = normalize_email(&body.email).map_err(|_| ApiError::invalid_credentials())?;
    let mut user = services
        .store
        .find_user_by_email(tenant.tenant_id(), &email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    user.ensure_can_sign_in()?;
    let hash = user.password_hash()?.to_string();
    if !verify_blocking(body.password, hash).await? {
        return Err(ApiError::invalid_credentials());
    }

    if user.status == UserStatus::Invited {
        user.status = UserStatus::Active;
        services.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "invited user activated on first login");
    }

    session_response(&services, &user, StatusCode::OK)
}

pub async fn logout(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let secure = services.config.cookie_secure;
    let mut res = dto::message("User logged out successfully", Map::new());
    cookies::append(
        res.headers_mut(),
        [
            cookies::clear_cookie(SESSION_COOKIE, secure),
            cookies::clear_cookie(TENANT_COOKIE, secure),
        ],
    );
    res
}

// ─────────────────────────────────────────────────────────────────────────────
// Session maintenance
// ─────────────────────────────────────────────────────────────────────────────

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Response {
    dto::ok(principal.user().profile())
}

pub async fn update_details(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::UpdateDetailsRequest>,
) -> Result<Response, ApiError> {
    let mut user = principal.into_user();
    user.update_details(body.name.as_deref(), body.email.as_deref())?;
    services.store.update_user(&user).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::conflict(USER_EXISTS),
        other => other.into(),
    })?;
    Ok(dto::ok(user.profile()))
}

pub async fn update_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::UpdatePasswordRequest>,
) -> Result<Response, ApiError> {
    let mut user = principal.into_user();
    let current = match &user.credential {
        Credential::Password { hash } => hash.clone(),
        Credential::External { .. } => {
            return Err(ApiError::validation(
                "This account signs in with an external provider and has no password",
            ));
        }
    };
    if !verify_blocking(body.current_password, current).await? {
        return Err(ApiError::Unauthenticated("Current password is incorrect".into()));
    }

    validate_password(&body.new_password)?;
    user.credential = Credential::Password {
        hash: hash_blocking(body.new_password).await?,
    };
    services.store.update_user(&user).await?;

    session_response(&services, &user, StatusCode::OK)
}

// ─────────────────────────────────────────────────────────────────────────────
// Invitation
// ─────────────────────────────────────────────────────────────────────────────

pub async fn invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<dto::InviteRequest>,
) -> Result<Response, ApiError> {
    let actor = principal.actor();
    authorize(&actor, Role::MANAGERS)?;

    let role = body.role.unwrap_or_default();
    if role == Role::Admin && !actor.is_admin() {
        return Err(ApiError::forbidden("Only admins can invite admins"));
    }

    let email = normalize_email(&body.email)?;
    // Uniform answer whether the email lives in this tenant or another one.
    if !services.store.find_users_by_email(&email).await?.is_empty() {
        return Err(ApiError::conflict(USER_EXISTS));
    }

    let temporary_password = generate_temporary_password();
    let hash = hash_blocking(temporary_password.clone()).await?;
    let user = User::create(
        NewUser {
            tenant_id: tenant.tenant_id(),
            name: invitee_name(&email),
            email: email.clone(),
            role,
            status: UserStatus::Invited,
            avatar: None,
            credential: Credential::Password { hash },
        },
        Utc::now(),
    )?;
    services.store.insert_user(&user).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::conflict(USER_EXISTS),
        other => other.into(),
    })?;
    tracing::info!(tenant_id = %tenant.tenant_id(), invitee = %user.id, "user invited");

    notify::deliver(
        &services,
        tenant.tenant_id(),
        NotificationDraft::user_invited(user.id, &email, actor.user_id),
    )
    .await;

    match invitation_email(&services, tenant.tenant(), &email, &temporary_password) {
        Ok(mail) => notify::send_email(&services, mail).await,
        Err(err) => tracing::warn!(error = %err, "could not build invitation link"),
    }

    let mut extra = Map::new();
    extra.insert("data".into(), json!(user.profile()));
    Ok(dto::message(format!("Invitation sent to {email}"), extra))
}

fn invitee_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local.chars().take(taskforge_auth::user::MAX_NAME_CHARS).collect()
}

fn invitation_email(
    services: &AppServices,
    tenant: &Tenant,
    email: &str,
    temporary_password: &str,
) -> Result<OutgoingEmail, url::ParseError> {
    let tenant_id = tenant.id.to_string();
    let link = url::Url::parse_with_params(
        &format!("{}/login", services.config.client_url),
        &[("email", email), ("tenantId", tenant_id.as_str())],
    )?;

    Ok(OutgoingEmail {
        to: email.to_string(),
        subject: format!("Invitation to join {}", tenant.name),
        body: format!(
            "You've been invited to join {} on TaskForge.\n\n\
             Your temporary login credentials are:\n\n\
             Email: {email}\n\
             Password: {temporary_password}\n\n\
             Please log in and change your password immediately:\n{link}\n",
            tenant.name
        ),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth
// ─────────────────────────────────────────────────────────────────────────────

pub async fn google_start(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, ApiError> {
    let provider = services.identity.clone().ok_or_else(|| ApiError::not_found("Route"))?;

    let state = random_hex(16);
    let url = provider.authorize_url(&state)?;

    let mut res = Redirect::to(&url).into_response();
    cookies::append(
        res.headers_mut(),
        [cookies::set_cookie(
            OAUTH_STATE_COOKIE,
            &state,
            OAUTH_STATE_TTL_SECS,
            services.config.cookie_secure,
        )],
    );
    Ok(res)
}

pub async fn google_callback(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Query(query): Query<dto::OAuthCallbackQuery>,
) -> Result<Response, ApiError> {
    let provider = services.identity.clone().ok_or_else(|| ApiError::not_found("Route"))?;
    let secure = services.config.cookie_secure;
    let client_url = services.config.client_url.clone();

    let outcome = complete_oauth(&services, provider.as_ref(), &headers, query).await;

    let mut res = match outcome {
        Ok(user) => {
            let token = services.tokens.issue(&user, Utc::now())?;
            let mut res = Redirect::to(&format!("{client_url}/dashboard")).into_response();
            cookies::append(res.headers_mut(), session_cookies(&services, &user, &token));
            res
        }
        Err(err) => {
            tracing::warn!(error = %err, "oauth sign-in failed");
            Redirect::to(&format!("{client_url}/login?error=oauth_failed")).into_response()
        }
    };
    cookies::append(res.headers_mut(), [cookies::clear_cookie(OAUTH_STATE_COOKIE, secure)]);
    Ok(res)
}

async fn complete_oauth(
    services: &AppServices,
    provider: &dyn IdentityProvider,
    headers: &HeaderMap,
    query: dto::OAuthCallbackQuery,
) -> Result<User, ApiError> {
    if let Some(error) = query.error {
        return Err(ApiError::Unauthenticated(format!("provider returned error: {error}")));
    }
    let expected = cookies::read_cookie(headers, OAUTH_STATE_COOKIE);
    match (expected, query.state.as_deref()) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => return Err(ApiError::Unauthenticated("oauth state mismatch".into())),
    }
    let code = query.code.ok_or_else(|| ApiError::validation("missing authorization code"))?;

    let profile = provider.exchange(&code).await?;
    let user = find_or_create_external_user(services, &profile).await?;
    user.ensure_can_sign_in()?;
    Ok(user)
}

/// Existing user by provider identity, then by email (oldest match),
/// otherwise a fresh workspace owned by a new external-only admin.
async fn find_or_create_external_user(services: &AppServices, profile: &ExternalProfile) -> Result<User, ApiError> {
    if let Some(user) = services
        .store
        .find_user_by_external(&profile.provider, &profile.subject)
        .await?
    {
        return Ok(user);
    }

    let email = normalize_email(&profile.email)?;
    if let Some(user) = services.store.find_users_by_email(&email).await?.into_iter().next() {
        return Ok(user);
    }

    let now = Utc::now();
    let first_name = profile.name.split_whitespace().next().unwrap_or("My");
    let workspace: String = format!("{first_name}'s Workspace")
        .chars()
        .take(taskforge_tenants::tenant::MAX_NAME_CHARS)
        .collect();
    let slug = format!("{}-{}", slugify(first_name), random_hex(3));

    let mut tenant = Tenant::create(NewTenant { name: workspace, slug }, now)?;
    services.store.insert_tenant(&tenant).await?;

    let new = NewUser {
        tenant_id: tenant.id,
        name: profile.name.chars().take(taskforge_auth::user::MAX_NAME_CHARS).collect(),
        email,
        role: Role::Admin,
        status: UserStatus::Active,
        avatar: profile.avatar.clone(),
        credential: Credential::External {
            provider: profile.provider.clone(),
            subject: profile.subject.clone(),
        },
    };
    match create_owner(services, &mut tenant, new, now).await {
        Ok(user) => {
            tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "workspace created from oauth sign-in");
            Ok(user)
        }
        Err(err) => {
            discard_tenant(services, &tenant).await;
            Err(err)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Insert the tenant's first admin and record them as owner.
async fn create_owner(
    services: &AppServices,
    tenant: &mut Tenant,
    new: NewUser,
    now: DateTime<Utc>,
) -> Result<User, ApiError> {
    let user = User::create(new, now)?;
    services.store.insert_user(&user).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::conflict("User already exists in this organization"),
        other => other.into(),
    })?;
    tenant.owner = Some(user.id);
    services.store.update_tenant(tenant).await?;
    Ok(user)
}

/// Compensation for a failed registration. Runs whatever the failure was and
/// removes any user already written into the tenant before the tenant itself.
async fn discard_tenant(services: &AppServices, tenant: &Tenant) {
    match services.store.list_users(tenant.id).await {
        Ok(users) => {
            for user in users {
                if let Err(err) = services.store.delete_user(tenant.id, user.id).await {
                    tracing::error!(tenant_id = %tenant.id, user_id = %user.id, error = %err, "failed to roll back user");
                }
            }
        }
        Err(err) => tracing::error!(tenant_id = %tenant.id, error = %err, "failed to list users for rollback"),
    }
    match services.store.delete_tenant(tenant.id).await {
        Ok(_) => tracing::info!(tenant_id = %tenant.id, "rolled back tenant after failed owner creation"),
        Err(err) => tracing::error!(tenant_id = %tenant.id, error = %err, "failed to roll back tenant"),
    }
}

fn session_cookies(services: &AppServices, user: &User, token: &str) -> [Option<axum::http::HeaderValue>; 2] {
    let secure = services.config.cookie_secure;
    let max_age = services.tokens.ttl().num_seconds();
    [
        cookies::set_cookie(SESSION_COOKIE, token, max_age, secure),
        cookies::set_cookie(TENANT_COOKIE, &user.tenant_id.to_string(), max_age, secure),
    ]
}

/// `{ success, token, user }` plus the session cookies.
fn session_response(services: &AppServices, user: &User, status: StatusCode) -> Result<Response, ApiError> {
    let token = services.tokens.issue(user, Utc::now())?;
    let mut res = (
        status,
        Json(json!({ "success": true, "token": token, "user": user.profile() })),
    )
        .into_response();
    cookies::append(res.headers_mut(), session_cookies(services, user, &token));
    Ok(res)
}

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::upstream)?
        .map_err(ApiError::from)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(ApiError::upstream)?
        .map_err(ApiError::from)
}
