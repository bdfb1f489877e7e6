//! Typed REST calls against `/api/v1`.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use taskforge_auth::UserProfile;
use taskforge_core::{NotificationId, ProjectId, TaskId, TenantId};
use taskforge_notifications::Notification;
use taskforge_projects::{Project, Task};

use crate::session::{Session, TENANT_HEADER};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with its error envelope.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("parse error: {0}")]
    Parse(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct Paged<T> {
    data: Vec<T>,
    pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    pub pagination: Pagination,
    pub unread_count: u64,
}

#[derive(Debug, Deserialize)]
struct Data<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Counted {
    count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for one API origin.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(self.http.get(&url).send().await, Ok(res) if res.status().is_success())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/api/v1{}", self.base_url, path))
    }

    // ── auth ────────────────────────────────────────────────────────────────

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        tenant_name: &str,
        slug: &str,
    ) -> Result<Session, ClientError> {
        let req = self.request(Method::POST, "/auth/register").json(&json!({
            "user": { "name": name, "email": email, "password": password },
            "tenant": { "name": tenant_name, "slug": slug },
        }));
        send(req).await
    }

    pub async fn login(&self, tenant_id: TenantId, email: &str, password: &str) -> Result<Session, ClientError> {
        let req = self
            .request(Method::POST, "/auth/login")
            .header(TENANT_HEADER, tenant_id.to_string())
            .json(&json!({ "email": email, "password": password }));
        send(req).await
    }

    pub async fn me(&self, session: &Session) -> Result<UserProfile, ClientError> {
        data(session.authorize(self.request(Method::GET, "/auth/me"))).await
    }

    // ── projects / tasks ────────────────────────────────────────────────────

    pub async fn list_projects(&self, session: &Session, page: u32) -> Result<(Vec<Project>, Pagination), ClientError> {
        let req = session
            .authorize(self.request(Method::GET, "/projects"))
            .query(&[("page", page)]);
        let paged: Paged<Project> = send(req).await?;
        Ok((paged.data, paged.pagination))
    }

    pub async fn get_project(&self, session: &Session, id: ProjectId) -> Result<Project, ClientError> {
        data(session.authorize(self.request(Method::GET, &format!("/projects/{id}")))).await
    }

    pub async fn create_task<B: Serialize>(&self, session: &Session, body: &B) -> Result<Task, ClientError> {
        data(session.authorize(self.request(Method::POST, "/tasks")).json(body)).await
    }

    pub async fn get_task(&self, session: &Session, id: TaskId) -> Result<Task, ClientError> {
        data(session.authorize(self.request(Method::GET, &format!("/tasks/{id}")))).await
    }

    pub async fn my_tasks(&self, session: &Session, page: u32) -> Result<(Vec<Task>, Pagination), ClientError> {
        let req = session
            .authorize(self.request(Method::GET, "/tasks"))
            .query(&[("myTasks", "true")])
            .query(&[("page", page)]);
        let paged: Paged<Task> = send(req).await?;
        Ok((paged.data, paged.pagination))
    }

    // ── notifications ───────────────────────────────────────────────────────

    pub async fn notifications(&self, session: &Session, page: u32) -> Result<NotificationPage, ClientError> {
        let req = session
            .authorize(self.request(Method::GET, "/notifications"))
            .query(&[("page", page)]);
        send(req).await
    }

    pub async fn mark_read(&self, session: &Session, ids: &[NotificationId]) -> Result<u64, ClientError> {
        let req = session
            .authorize(self.request(Method::POST, "/notifications/read"))
            .json(&json!({ "ids": ids }));
        let counted: Counted = send(req).await?;
        Ok(counted.count)
    }

    pub async fn mark_all_read(&self, session: &Session) -> Result<u64, ClientError> {
        let counted: Counted = send(session.authorize(self.request(Method::POST, "/notifications/read-all"))).await?;
        Ok(counted.count)
    }

    pub async fn delete_notification(&self, session: &Session, id: NotificationId) -> Result<(), ClientError> {
        let _: Value = send(session.authorize(self.request(Method::DELETE, &format!("/notifications/{id}")))).await?;
        Ok(())
    }
}

async fn data<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let body: Data<T> = send(req).await?;
    Ok(body.data)
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let res = req.send().await?;
    let status = res.status();
    let bytes = res.bytes().await?;

    if !status.is_success() {
        return Err(api_error(status, &bytes));
    }
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(e.to_string()))
}

fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    tracing::debug!(status = status.as_u16(), code = %parsed.error, "api call failed");
    ClientError::Api {
        status: status.as_u16(),
        code: parsed.error,
        message: if parsed.message.is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            parsed.message
        },
    }
}
