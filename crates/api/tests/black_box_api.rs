use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use taskforge_api::app::{build_app, AppServices};
use taskforge_api::config::AppConfig;
use taskforge_api::rate_limit::RateLimitConfig;
use taskforge_auth::{Credential, NewUser, Role, User, UserStatus};
use taskforge_core::TenantId;
use taskforge_events::InMemoryBackplane;
use taskforge_infra::{CapturingMailer, InMemoryStore, TaskRepository, TenantRepository, UserRepository};
use taskforge_tenants::{NewTenant, Tenant};

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    mailer: Arc<CapturingMailer>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig::for_tests()).await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        // Same router as prod, in-memory adapters, ephemeral port.
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(CapturingMailer::new());
        let services = AppServices::new(
            config,
            store.clone(),
            mailer.clone(),
            None,
            Arc::new(InMemoryBackplane::new()),
        );
        let app = build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            store,
            mailer,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A signed-in user as the API sees them.
#[derive(Clone)]
struct Session {
    token: String,
    tenant_id: String,
    user_id: String,
}

impl Session {
    fn from_body(body: &Value) -> Self {
        Self {
            token: body["token"].as_str().unwrap().to_string(),
            tenant_id: body["user"]["tenantId"].as_str().unwrap().to_string(),
            user_id: body["user"]["id"].as_str().unwrap().to_string(),
        }
    }

    fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.token).header("x-tenant-id", &self.tenant_id)
    }
}

async fn register(client: &reqwest::Client, server: &TestServer, slug: &str, email: &str) -> Session {
    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({
            "user": { "name": "Ada Admin", "email": email, "password": "secret123" },
            "tenant": { "name": format!("Org {slug}"), "slug": slug }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "admin");
    Session::from_body(&body)
}

/// Invite `email` into the admin's tenant and log in with the mailed temporary password.
async fn invite_and_login(
    client: &reqwest::Client,
    server: &TestServer,
    admin: &Session,
    email: &str,
    role: &str,
) -> Session {
    let res = admin
        .apply(client.post(server.url("/auth/invite")))
        .json(&json!({ "email": email, "role": role }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], format!("Invitation sent to {email}"));
    assert_eq!(body["data"]["status"], "Invited");

    let mail = server
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.to == email && m.subject.starts_with("Invitation to join"))
        .expect("invitation email");
    let password = mail
        .body
        .lines()
        .find_map(|l| l.trim().strip_prefix("Password: "))
        .expect("temporary password in email")
        .to_string();

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": password, "tenantId": admin.tenant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["status"], "Active");
    Session::from_body(&body)
}

async fn create_project(
    client: &reqwest::Client,
    server: &TestServer,
    session: &Session,
    members: &[&str],
) -> Value {
    let now = Utc::now();
    let res = session
        .apply(client.post(server.url("/projects")))
        .json(&json!({
            "name": "Apollo",
            "description": "Moonshot",
            "startDate": now,
            "endDate": now + chrono::Duration::days(30),
            "members": members,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["data"].clone()
}

async fn create_task(
    client: &reqwest::Client,
    server: &TestServer,
    session: &Session,
    project_id: &str,
    assignee: Option<&str>,
) -> Value {
    let res = session
        .apply(client.post(server.url("/tasks")))
        .json(&json!({
            "project": project_id,
            "title": "Build the rocket",
            "priority": "high",
            "assignedTo": assignee,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["data"].clone()
}

async fn notifications(client: &reqwest::Client, server: &TestServer, session: &Session) -> Value {
    let res = session
        .apply(client.get(server.url("/notifications")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn unread(client: &reqwest::Client, server: &TestServer, session: &Session) -> u64 {
    notifications(client, server, session).await["unreadCount"].as_u64().unwrap()
}

/// Types of the unread notifications, newest first.
async fn unread_types(client: &reqwest::Client, server: &TestServer, session: &Session) -> Vec<String> {
    notifications(client, server, session).await["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["read"] == false)
        .map(|n| n["type"].as_str().unwrap().to_string())
        .collect()
}

async fn update_task(
    client: &reqwest::Client,
    server: &TestServer,
    session: &Session,
    task_id: &str,
    body: Value,
) -> Value {
    let res = session
        .apply(client.put(server.url(&format!("/tasks/{task_id}"))))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["data"].clone()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_gate_rejects_before_any_handler_runs() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "gate-org", "ada@gate.test").await;

    // No tenant anywhere.
    let res = client.get(server.url("/projects")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "tenant_required");

    // Unknown and malformed tenant ids.
    for raw in [TenantId::new().to_string(), "not-a-uuid".to_string()] {
        let res = client
            .get(server.url("/projects"))
            .bearer_auth(&admin.token)
            .header("x-tenant-id", raw)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "tenant_not_found");
    }

    // Deactivated tenant.
    let tenant_id: TenantId = admin.tenant_id.parse().unwrap();
    let mut tenant = server.store.get_tenant(tenant_id).await.unwrap().unwrap();
    tenant.active = false;
    server.store.update_tenant(&tenant).await.unwrap();

    let res = admin.apply(client.get(server.url("/projects"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "tenant_inactive");
}

#[tokio::test]
async fn session_is_bound_to_its_tenant() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = register(&client, &server, "org-a", "a@a.test").await;
    let b = register(&client, &server, "org-b", "b@b.test").await;

    let res = client
        .get(server.url("/auth/me"))
        .bearer_auth(&a.token)
        .header("x-tenant-id", &b.tenant_id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/auth/me"))
        .header("x-tenant-id", &a.tenant_id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_session_round_trip() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::builder().cookie_store(true).build().unwrap();
    let admin = register(&client, &server, "cookie-org", "ada@cookie.test").await;

    // Token and tenant both come from cookies.
    let res = client.get(server.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["id"], admin.user_id);
    assert!(body["data"].get("credential").is_none());

    let res = client.post(server.url("/auth/logout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "login-org", "ada@login.test").await;

    for (email, password) in [("ada@login.test", "wrong-password"), ("nobody@login.test", "secret123")] {
        let res = client
            .post(server.url("/auth/login"))
            .json(&json!({ "email": email, "password": password, "tenantId": admin.tenant_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Invalid credentials");
    }

    let res = client
        .post(server.url("/auth/login"))
        .header("x-tenant-id", &admin.tenant_id)
        .json(&json!({ "email": "ADA@login.test", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn external_accounts_cannot_use_a_password() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let now = Utc::now();

    let tenant = Tenant::create(
        NewTenant {
            name: "Grace's Workspace".into(),
            slug: "grace-a1b2c3".into(),
        },
        now,
    )
    .unwrap();
    server.store.insert_tenant(&tenant).await.unwrap();
    let user = User::create(
        NewUser {
            tenant_id: tenant.id,
            name: "Grace".into(),
            email: "grace@example.com".into(),
            role: Role::Admin,
            status: UserStatus::Active,
            avatar: None,
            credential: Credential::External {
                provider: "google".into(),
                subject: "1234567890".into(),
            },
        },
        now,
    )
    .unwrap();
    server.store.insert_user(&user).await.unwrap();

    for password in ["", "secret123", "1234567890"] {
        let res = client
            .post(server.url("/auth/login"))
            .json(&json!({ "email": "grace@example.com", "password": password, "tenantId": tenant.id }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn duplicate_slug_conflicts_and_failed_registration_leaves_no_tenant() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let first = register(&client, &server, "acme", "ada@acme.test").await;

    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({
            "user": { "name": "Eve", "email": "eve@acme.test", "password": "secret123" },
            "tenant": { "name": "Acme Again", "slug": "acme" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let survivor = server.store.find_tenant_by_slug("acme").await.unwrap().unwrap();
    assert_eq!(survivor.id.to_string(), first.tenant_id);

    // User creation fails after the tenant exists; the tenant is rolled back.
    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({
            "user": { "name": "x".repeat(51), "email": "long@name.test", "password": "secret123" },
            "tenant": { "name": "Rollback", "slug": "rollback" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(server.store.find_tenant_by_slug("rollback").await.unwrap().is_none());

    register(&client, &server, "rollback", "ok@rollback.test").await;
}

#[tokio::test]
async fn invite_refuses_emails_that_exist_anywhere_with_one_message() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = register(&client, &server, "invite-a", "a@invite.test").await;
    let _b = register(&client, &server, "invite-b", "b@invite.test").await;

    let mut messages = Vec::new();
    for email in ["a@invite.test", "b@invite.test"] {
        let res = a
            .apply(client.post(server.url("/auth/invite")))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: Value = res.json().await.unwrap();
        messages.push(body["message"].clone());
    }
    assert_eq!(messages[0], messages[1]);
}

#[tokio::test]
async fn assigning_a_task_notifies_the_assignee_once() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "scenario", "ada@scenario.test").await;
    let member = invite_and_login(&client, &server, &admin, "uma@scenario.test", "team_member").await;

    let project = create_project(&client, &server, &admin, &[&member.user_id]).await;
    let project_id = project["id"].as_str().unwrap();
    let unread_before = unread(&client, &server, &member).await;

    let task = create_task(&client, &server, &admin, project_id, Some(&member.user_id)).await;
    assert_eq!(task["tenantId"], admin.tenant_id);
    assert_eq!(task["priority"], "high");

    let after = notifications(&client, &server, &member).await;
    let assigned: Vec<&Value> = after["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "task_assigned")
        .collect();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0]["recipient"], member.user_id);
    assert_eq!(assigned[0]["relatedResource"]["resourceId"], task["id"]);

    assert_eq!(after["unreadCount"].as_u64().unwrap(), unread_before + 1);

    let emails = server.mailer.sent();
    assert!(emails
        .iter()
        .any(|m| m.to == "uma@scenario.test" && m.subject.contains("Build the rocket")));
}

#[tokio::test]
async fn cross_tenant_project_reads_as_not_found() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = register(&client, &server, "tenant-one", "a@one.test").await;
    let b = register(&client, &server, "tenant-two", "b@two.test").await;

    let project = create_project(&client, &server, &a, &[]).await;
    let id = project["id"].as_str().unwrap();

    let res = b
        .apply(client.get(server.url(&format!("/projects/{id}"))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert!(body.get("data").is_none());
    assert!(!body.to_string().contains("Apollo"));
}

#[tokio::test]
async fn team_member_cannot_delete_someone_elses_task() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "delete-org", "ada@delete.test").await;
    let member = invite_and_login(&client, &server, &admin, "tom@delete.test", "team_member").await;

    let project = create_project(&client, &server, &admin, &[&member.user_id]).await;
    let task = create_task(&client, &server, &admin, project["id"].as_str().unwrap(), None).await;
    let task_url = server.url(&format!("/tasks/{}", task["id"].as_str().unwrap()));

    let res = member.apply(client.delete(&task_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = admin.apply(client.get(&task_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"], task);
}

#[tokio::test]
async fn deleting_a_project_deletes_its_tasks() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "cascade", "ada@cascade.test").await;

    let project = create_project(&client, &server, &admin, &[]).await;
    let project_id = project["id"].as_str().unwrap();
    let task = create_task(&client, &server, &admin, project_id, None).await;

    let res = admin
        .apply(client.delete(server.url(&format!("/projects/{project_id}"))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = admin
        .apply(client.get(server.url(&format!("/tasks/{}", task["id"].as_str().unwrap()))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = admin.apply(client.get(server.url("/tasks"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn marking_read_is_idempotent_and_scoped_to_the_recipient() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "reads", "ada@reads.test").await;
    let member = invite_and_login(&client, &server, &admin, "rob@reads.test", "project_manager").await;

    let project = create_project(&client, &server, &admin, &[&member.user_id]).await;
    create_task(&client, &server, &admin, project["id"].as_str().unwrap(), Some(&member.user_id)).await;

    let list = notifications(&client, &server, &member).await;
    let id = list["data"][0]["id"].as_str().unwrap().to_string();

    let mut counts = Vec::new();
    for _ in 0..2 {
        let res = member
            .apply(client.post(server.url("/notifications/read")))
            .json(&json!({ "ids": [id] }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        counts.push(body["count"].as_u64().unwrap());
    }
    assert_eq!(counts, vec![1, 0]);

    let res = admin
        .apply(client.delete(server.url(&format!("/notifications/{id}"))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = member
        .apply(client.get(server.url("/notifications?read=true")))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().iter().all(|n| n["read"] == true));
}

#[tokio::test]
async fn admins_manage_others_but_not_themselves() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "users-org", "ada@users.test").await;
    let member = invite_and_login(&client, &server, &admin, "max@users.test", "team_member").await;

    let res = admin
        .apply(client.delete(server.url(&format!("/users/{}", admin.user_id))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "You cannot delete yourself");

    let res = member
        .apply(client.put(server.url(&format!("/users/{}", admin.user_id))))
        .json(&json!({ "role": "team_member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = admin
        .apply(client.put(server.url(&format!("/users/{}", member.user_id))))
        .json(&json!({ "role": "project_manager" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["role"], "project_manager");

    let res = admin
        .apply(client.delete(server.url(&format!("/users/{}", member.user_id))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn team_members_only_list_their_projects() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "listing", "ada@listing.test").await;
    let member = invite_and_login(&client, &server, &admin, "lia@listing.test", "team_member").await;

    create_project(&client, &server, &admin, &[&member.user_id]).await;
    create_project(&client, &server, &admin, &[]).await;

    let res = member.apply(client.get(server.url("/projects"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pagination"]["total"], 1);

    let res = admin.apply(client.get(server.url("/projects"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pagination"]["total"], 2);

    // Team members cannot create projects.
    let now = Utc::now();
    let res = member
        .apply(client.post(server.url("/projects")))
        .json(&json!({ "name": "Nope", "description": "x", "startDate": now, "endDate": now }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn comments_notify_the_assignee_but_never_the_commenter() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "comments", "ada@comments.test").await;
    let member = invite_and_login(&client, &server, &admin, "uma@comments.test", "team_member").await;
    let project = create_project(&client, &server, &admin, &[&member.user_id]).await;
    let task = create_task(&client, &server, &admin, project["id"].as_str().unwrap(), Some(&member.user_id)).await;
    let task_id = task["id"].as_str().unwrap();

    let (admin_before, member_before) = (
        unread(&client, &server, &admin).await,
        unread(&client, &server, &member).await,
    );

    let res = admin
        .apply(client.post(server.url(&format!("/tasks/{task_id}/comments"))))
        .json(&json!({ "text": "Looks good" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["text"], "Looks good");

    assert_eq!(unread(&client, &server, &member).await, member_before + 1);
    assert_eq!(unread_types(&client, &server, &member).await[0], "task_comment");

    // The assignee replying notifies nobody.
    let res = member
        .apply(client.post(server.url(&format!("/tasks/{task_id}/comments"))))
        .json(&json!({ "text": "Thanks" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(unread(&client, &server, &member).await, member_before + 1);
    assert_eq!(unread(&client, &server, &admin).await, admin_before);

    let stored = server
        .store
        .get_task(admin.tenant_id.parse::<TenantId>().unwrap(), task_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.comments.len(), 2);
}

#[tokio::test]
async fn reassignment_and_status_changes_notify_the_right_people() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "flow", "ada@flow.test").await;
    let uma = invite_and_login(&client, &server, &admin, "uma@flow.test", "team_member").await;
    let ian = invite_and_login(&client, &server, &admin, "ian@flow.test", "team_member").await;
    let project = create_project(&client, &server, &admin, &[&uma.user_id, &ian.user_id]).await;
    let task = create_task(&client, &server, &admin, project["id"].as_str().unwrap(), Some(&uma.user_id)).await;
    let task_id = task["id"].as_str().unwrap();

    let uma_before = unread(&client, &server, &uma).await;
    let ian_before = unread(&client, &server, &ian).await;
    let admin_before = unread(&client, &server, &admin).await;

    // Reassignment notifies only the new assignee.
    update_task(&client, &server, &admin, task_id, json!({ "assignedTo": ian.user_id })).await;
    assert_eq!(unread(&client, &server, &ian).await, ian_before + 1);
    assert_eq!(unread_types(&client, &server, &ian).await[0], "task_assigned");
    assert_eq!(unread(&client, &server, &uma).await, uma_before);

    // A status change notifies the assignee.
    update_task(&client, &server, &admin, task_id, json!({ "status": "in-progress" })).await;
    assert_eq!(unread(&client, &server, &ian).await, ian_before + 2);
    assert_eq!(unread_types(&client, &server, &ian).await[0], "task_updated");

    // The assignee finishing the task notifies the manager, not themselves.
    let done = update_task(&client, &server, &ian, task_id, json!({ "status": "done" })).await;
    assert_eq!(done["status"], "done");
    assert_eq!(unread(&client, &server, &ian).await, ian_before + 2);
    assert_eq!(unread(&client, &server, &admin).await, admin_before + 1);
    assert_eq!(unread_types(&client, &server, &admin).await[0], "task_updated");
}

#[tokio::test]
async fn project_updates_notify_added_and_existing_members() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = register(&client, &server, "fanout", "ada@fanout.test").await;
    let uma = invite_and_login(&client, &server, &admin, "uma@fanout.test", "team_member").await;
    let ian = invite_and_login(&client, &server, &admin, "ian@fanout.test", "team_member").await;
    let project = create_project(&client, &server, &admin, &[&uma.user_id]).await;
    let project_id = project["id"].as_str().unwrap();
    assert_eq!(unread_types(&client, &server, &uma).await[0], "project_added");

    let uma_before = unread(&client, &server, &uma).await;
    let ian_before = unread(&client, &server, &ian).await;
    let admin_before = unread(&client, &server, &admin).await;

    let res = admin
        .apply(client.put(server.url(&format!("/projects/{project_id}"))))
        .json(&json!({ "name": "Apollo II", "members": [uma.user_id, ian.user_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(unread(&client, &server, &ian).await, ian_before + 1);
    assert_eq!(unread_types(&client, &server, &ian).await[0], "project_added");
    assert_eq!(unread(&client, &server, &uma).await, uma_before + 1);
    assert_eq!(unread_types(&client, &server, &uma).await[0], "project_updated");
    assert_eq!(unread(&client, &server, &admin).await, admin_before);
}

#[tokio::test]
async fn credential_routes_are_rate_limited_per_client() {
    let config = AppConfig {
        auth_rate_limit: RateLimitConfig::per_window(3),
        ..AppConfig::for_tests()
    };
    let server = TestServer::spawn_with(config).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new().to_string();

    for _ in 0..3 {
        let res = client
            .post(server.url("/auth/login"))
            .json(&json!({ "email": "x@limit.test", "password": "whatever", "tenantId": tenant_id }))
            .send()
            .await
            .unwrap();
        assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "x@limit.test", "password": "whatever", "tenantId": tenant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "rate_limited");

    // Other routes keep their own budget.
    let res = client.get(format!("{}/health", server.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
