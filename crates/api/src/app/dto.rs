use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use taskforge_auth::{Role, UserStatus};
use taskforge_core::{DomainError, Page, UserId};
use taskforge_projects::{Attachment, Priority, ProjectStatus, TaskStatus};

use crate::app::errors::ApiError;

// -------------------------
// Extractors
// -------------------------

/// `Json<T>` whose rejection is an [`ApiError::Validation`] envelope.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Parse a path id. Unparseable ids read as "not found", like ids of other tenants.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|_| ApiError::not_found(what))
}

/// Distinguishes an absent field from an explicit `null`.
pub fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -------------------------
// Auth DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTenant {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterUser,
    pub tenant: RegisterTenant,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// -------------------------
// User DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

// -------------------------
// Project DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    /// Defaults to the creating user.
    pub manager: Option<UserId>,
    #[serde(default)]
    pub members: Vec<UserId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub manager: Option<UserId>,
    pub members: Option<Vec<UserId>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -------------------------
// Task DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub name: String,
    pub file_url: String,
}

impl AttachmentInput {
    pub fn into_attachment(self, now: DateTime<Utc>) -> Attachment {
        Attachment {
            name: self.name,
            file_url: self.file_url,
            uploaded_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    /// `null` unassigns; absent leaves the assignee alone.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<UserId>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub project: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    pub my_tasks: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

// -------------------------
// Notification DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    pub read: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<String>,
}

// -------------------------
// Response envelope
// -------------------------

/// `{ success: true, data }` with `200`.
pub fn ok<T: Serialize>(data: T) -> Response {
    with_status(StatusCode::OK, data)
}

/// `{ success: true, data }` with `201`.
pub fn created<T: Serialize>(data: T) -> Response {
    with_status(StatusCode::CREATED, data)
}

fn with_status<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

/// `{ success: true, message }`, optionally with extra top-level fields.
pub fn message(message: impl Into<String>, extra: Map<String, Value>) -> Response {
    let mut body = extra;
    body.insert("success".into(), Value::Bool(true));
    body.insert("message".into(), Value::String(message.into()));
    Json(Value::Object(body)).into_response()
}

/// List envelope: `{ success, count, pagination, data }` plus `extra` fields.
pub fn paged<T: Serialize>(page: Page<T>, extra: Map<String, Value>) -> Response {
    let mut body = extra;
    body.insert("success".into(), Value::Bool(true));
    body.insert("count".into(), json!(page.items.len()));
    body.insert(
        "pagination".into(),
        json!({ "total": page.total, "page": page.page, "pages": page.pages }),
    );
    body.insert("data".into(), json!(page.items));
    Json(Value::Object(body)).into_response()
}

/// Non-paginated list envelope: `{ success, count, data }`.
pub fn list<T: Serialize>(items: Vec<T>) -> Response {
    Json(json!({ "success": true, "count": items.len(), "data": items })).into_response()
}
