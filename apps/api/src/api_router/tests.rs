use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use gatehouse_application::{
    AccessAdminRepository, AccessAdminService, AuditLogFilter, AuditLogPagination, AuditRecorder,
    AuthenticationService, AuthorizationGate, CreateRoleInput, EventBus, GatePolicy,
    IdentityRecord, IdentityRepository, PasswordHasher, PermissionResolver, RoleRecord,
    SessionConfig, SessionService, UpdateRoleInput,
};
use gatehouse_core::{AppError, AppResult, SubjectId};
use gatehouse_domain::{PermissionId, PermissionSet};
use gatehouse_infrastructure::{
    InMemoryAuditLogRepository, InMemorySessionRepository, JwtSessionTokenCodec,
};

use crate::route_rules::{build_route_rules, parse_patterns};
use crate::state::{AppState, CookieSettings};

use super::build_router;

const FRONTEND_URL: &str = "http://localhost:3000";
const COOKIE_NAME: &str = "gatehouse_session";

#[derive(Default)]
struct DirectoryState {
    identities: Vec<(IdentityRecord, String)>,
    roles: Vec<RoleRecord>,
    assignments: Vec<(SubjectId, Uuid)>,
}

/// Identities, roles and assignments kept in one place so grants take effect.
#[derive(Default)]
struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectory {
    fn state(&self) -> AppResult<std::sync::MutexGuard<'_, DirectoryState>> {
        self.state
            .lock()
            .map_err(|error| AppError::Internal(format!("directory lock poisoned: {error}")))
    }

    fn add_subject(&self, login: &str, password: &str, permissions: &[&str]) -> SubjectId {
        let subject_id = SubjectId::new();
        let mut state = self.state().unwrap_or_else(|error| panic!("{error}"));
        state.identities.push((
            IdentityRecord {
                subject_id,
                login: login.to_owned(),
                display_name: login.to_owned(),
                is_active: true,
            },
            format!("plain:{password}"),
        ));

        if !permissions.is_empty() {
            let role_id = Uuid::new_v4();
            state.roles.push(RoleRecord {
                role_id,
                name: format!("{login}-role"),
                description: None,
                permissions: permissions
                    .iter()
                    .map(|value| {
                        value
                            .parse::<PermissionId>()
                            .unwrap_or_else(|error| panic!("{error}"))
                    })
                    .collect(),
            });
            state.assignments.push((subject_id, role_id));
        }

        subject_id
    }
}

#[async_trait]
impl IdentityRepository for InMemoryDirectory {
    async fn find_by_subject_id(&self, subject_id: SubjectId) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .state()?
            .identities
            .iter()
            .find(|(identity, _)| identity.subject_id == subject_id)
            .map(|(identity, _)| identity.clone()))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .state()?
            .identities
            .iter()
            .find(|(identity, _)| identity.login.eq_ignore_ascii_case(login))
            .map(|(identity, _)| identity.clone()))
    }

    async fn find_credential(&self, subject_id: SubjectId) -> AppResult<Option<String>> {
        Ok(self
            .state()?
            .identities
            .iter()
            .find(|(identity, _)| identity.subject_id == subject_id)
            .map(|(_, hash)| hash.clone()))
    }
}

#[async_trait]
impl PermissionResolver for InMemoryDirectory {
    async fn permissions_for(&self, subject_id: SubjectId) -> AppResult<PermissionSet> {
        let state = self.state()?;
        let mut permissions = PermissionSet::new();
        for (_, role_id) in state
            .assignments
            .iter()
            .filter(|(assigned, _)| *assigned == subject_id)
        {
            if let Some(role) = state.roles.iter().find(|role| role.role_id == *role_id) {
                for permission in &role.permissions {
                    permissions.insert(permission.clone());
                }
            }
        }

        Ok(permissions)
    }
}

#[async_trait]
impl AccessAdminRepository for InMemoryDirectory {
    async fn list_roles(&self) -> AppResult<Vec<RoleRecord>> {
        Ok(self.state()?.roles.clone())
    }

    async fn find_role(&self, role_id: Uuid) -> AppResult<Option<RoleRecord>> {
        Ok(self
            .state()?
            .roles
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord> {
        let mut state = self.state()?;
        if state.roles.iter().any(|role| role.name == input.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let role = RoleRecord {
            role_id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            permissions: input.permissions,
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<bool> {
        let mut state = self.state()?;
        if state
            .roles
            .iter()
            .any(|role| role.role_id != role_id && role.name == input.name)
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Ok(false);
        };
        role.name = input.name;
        role.description = input.description;
        Ok(true)
    }

    async fn delete_role(&self, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state()?;
        let before = state.roles.len();
        state.roles.retain(|role| role.role_id != role_id);
        state.assignments.retain(|(_, assigned)| *assigned != role_id);
        Ok(state.roles.len() != before)
    }

    async fn grant_permission(&self, role_id: Uuid, permission: &PermissionId) -> AppResult<bool> {
        let mut state = self.state()?;
        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Ok(false);
        };
        if role.permissions.contains(permission) {
            return Ok(false);
        }
        role.permissions.push(permission.clone());
        Ok(true)
    }

    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission: &PermissionId,
    ) -> AppResult<bool> {
        let mut state = self.state()?;
        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Ok(false);
        };
        let before = role.permissions.len();
        role.permissions.retain(|held| held != permission);
        Ok(role.permissions.len() != before)
    }

    async fn assign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state()?;
        if state.assignments.contains(&(subject_id, role_id)) {
            return Ok(false);
        }
        state.assignments.push((subject_id, role_id));
        Ok(true)
    }

    async fn unassign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state()?;
        let before = state.assignments.len();
        state
            .assignments
            .retain(|assignment| *assignment != (subject_id, role_id));
        Ok(state.assignments.len() != before)
    }
}

struct PlainPasswordHasher;

impl PasswordHasher for PlainPasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("plain:{password}"))
    }

    fn equalize_timing(&self, _password: &str) {}
}

struct TestApp {
    router: Router,
    directory: Arc<InMemoryDirectory>,
    audit_recorder: AuditRecorder,
}

fn test_app() -> TestApp {
    let directory = Arc::new(InMemoryDirectory::default());
    let event_bus = EventBus::new();
    let audit_recorder = AuditRecorder::new(Arc::new(InMemoryAuditLogRepository::new()));
    audit_recorder.register(&event_bus);

    let codec = JwtSessionTokenCodec::new("0123456789abcdef0123456789abcdef", "gatehouse")
        .unwrap_or_else(|error| panic!("{error}"));
    let session_service = SessionService::new(
        Arc::new(InMemorySessionRepository::new()),
        Arc::new(codec),
        SessionConfig::default(),
    );

    let policy = GatePolicy {
        public_routes: parse_patterns(&["/health", "/api/auth/login", "/auth/[...rest]"])
            .unwrap_or_else(|error| panic!("{error}")),
        strict_routes: parse_patterns(&["/api/security/subjects/[subjectId]/[...rest]"])
            .unwrap_or_else(|error| panic!("{error}")),
        ..GatePolicy::default()
    };
    let gate = AuthorizationGate::new(
        session_service.clone(),
        Arc::new(build_route_rules().unwrap_or_else(|error| panic!("{error}"))),
        directory.clone(),
        policy,
    );

    let state = AppState {
        gate,
        authentication_service: AuthenticationService::new(
            directory.clone(),
            Arc::new(PlainPasswordHasher),
            session_service.clone(),
            event_bus.clone(),
        ),
        access_admin_service: AccessAdminService::new(
            directory.clone(),
            session_service,
            event_bus.clone(),
        ),
        audit_recorder: audit_recorder.clone(),
        event_bus,
        cookie: CookieSettings {
            name: COOKIE_NAME.to_owned(),
            secure: false,
            max_age_seconds: 3_600,
        },
        frontend_url: FRONTEND_URL.to_owned(),
    };

    TestApp {
        router: build_router(state).unwrap_or_else(|error| panic!("{error}")),
        directory,
        audit_recorder,
    }
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json")
        .header(header::ORIGIN, FRONTEND_URL);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    request.unwrap_or_else(|error| panic!("{error}"))
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    serde_json::from_slice(&bytes).unwrap_or_else(|error| panic!("{error}"))
}

async fn login(app: &TestApp, login: &str, password: &str) -> String {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"login": login, "password": password})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["token"]
        .as_str()
        .unwrap_or_else(|| panic!("login response has no token"))
        .to_owned()
}

async fn audit_actions(app: &TestApp, action: &str) -> usize {
    app.audit_recorder
        .get_logs(
            &AuditLogFilter {
                action: Some(action.to_owned()),
                ..AuditLogFilter::default()
            },
            AuditLogPagination::default(),
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .entries
        .len()
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let response = send(&app, json_request(Method::GET, "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn anonymous_json_client_gets_unauthorized_with_sign_in_target() {
    let app = test_app();
    let response = send(
        &app,
        json_request(Method::GET, "/api/audit/logs?limit=5", None, None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthenticated");
    assert_eq!(
        body["redirect_to"],
        "/auth/signin?callbackUrl=%2Fapi%2Faudit%2Flogs%3Flimit%3D5"
    );
}

#[tokio::test]
async fn anonymous_browser_is_redirected_to_sign_in() {
    let app = test_app();
    let request = Request::builder()
        .uri("/api/auth/me")
        .body(Body::empty())
        .unwrap_or_else(|error| panic!("{error}"));
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/auth/signin?callbackUrl=%2Fapi%2Fauth%2Fme")
    );
}

#[tokio::test]
async fn login_sets_cookie_and_me_reports_permissions() {
    let app = test_app();
    app.directory
        .add_subject("ada@example.com", "correct horse", &["audit:read"]);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"login": "ada@example.com", "password": "correct horse"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(cookie.starts_with("gatehouse_session="));
    assert!(cookie.contains("HttpOnly"));

    let session_cookie = cookie.split(';').next().unwrap_or_default().to_owned();
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::ACCEPT, "application/json")
        .header(header::COOKIE, session_cookie)
        .body(Body::empty())
        .unwrap_or_else(|error| panic!("{error}"));
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["login"], "ada@example.com");
    assert_eq!(body["permissions"], json!(["audit:read"]));
    assert_eq!(audit_actions(&app, "auth.login").await, 1);
}

#[tokio::test]
async fn wrong_password_is_rejected_and_audited() {
    let app = test_app();
    app.directory.add_subject("ada@example.com", "correct horse", &[]);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"login": "ada@example.com", "password": "battery staple"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(audit_actions(&app, "auth.login_failed").await, 1);
}

#[tokio::test]
async fn insufficient_permissions_are_forbidden_and_audited() {
    let app = test_app();
    app.directory.add_subject("bob@example.com", "hunter2", &["role:read"]);
    let token = login(&app, "bob@example.com", "hunter2").await;

    let response = send(
        &app,
        json_request(Method::GET, "/api/audit/logs", Some(token.as_str()), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "insufficient_permissions");
    assert_eq!(
        body["redirect_to"],
        "/auth/error?error=insufficient_permissions"
    );
    assert_eq!(audit_actions(&app, "access.denied").await, 1);
}

#[tokio::test]
async fn granted_permission_takes_effect_on_next_request() {
    let app = test_app();
    app.directory
        .add_subject("admin@example.com", "s3cret", &["role:read", "role:manage"]);
    let member = app.directory.add_subject("eve@example.com", "pa55", &[]);
    let admin_token = login(&app, "admin@example.com", "s3cret").await;
    let member_token = login(&app, "eve@example.com", "pa55").await;

    let denied = send(
        &app,
        json_request(Method::GET, "/api/audit/stats", Some(member_token.as_str()), None),
    )
    .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let created = send(
        &app,
        json_request(
            Method::POST,
            "/api/security/roles",
            Some(admin_token.as_str()),
            Some(json!({"name": "auditor", "permissions": ["audit:read"]})),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let role_id = body_json(created).await["role_id"]
        .as_str()
        .unwrap_or_default()
        .to_owned();

    let assigned = send(
        &app,
        json_request(
            Method::PUT,
            format!("/api/security/subjects/{member}/roles/{role_id}").as_str(),
            Some(admin_token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(assigned.status(), StatusCode::OK);
    assert_eq!(body_json(assigned).await, json!({"changed": true}));

    let allowed = send(
        &app,
        json_request(Method::GET, "/api/audit/stats", Some(member_token.as_str()), None),
    )
    .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    let stats = body_json(allowed).await;
    assert_eq!(stats["count_by_action"]["role.created"], 1);
    assert_eq!(stats["count_by_action"]["role.assigned"], 1);
}

#[tokio::test]
async fn role_update_is_audited_with_snapshots() {
    let app = test_app();
    app.directory
        .add_subject("admin@example.com", "s3cret", &["role:read", "role:manage"]);
    let token = login(&app, "admin@example.com", "s3cret").await;

    let created = send(
        &app,
        json_request(
            Method::POST,
            "/api/security/roles",
            Some(token.as_str()),
            Some(json!({"name": "draft"})),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let role_id = body_json(created).await["role_id"]
        .as_str()
        .unwrap_or_default()
        .to_owned();

    let updated = send(
        &app,
        json_request(
            Method::PUT,
            format!("/api/security/roles/{role_id}").as_str(),
            Some(token.as_str()),
            Some(json!({"name": "reviewer", "description": "Reviews changes"})),
        ),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = body_json(updated).await;
    assert_eq!(body["name"], "reviewer");
    assert_eq!(body["description"], "Reviews changes");
    assert_eq!(audit_actions(&app, "role.updated").await, 1);
}

#[tokio::test]
async fn role_mutations_need_manage_permission() {
    let app = test_app();
    app.directory.add_subject("viewer@example.com", "pa55", &["role:read"]);
    let token = login(&app, "viewer@example.com", "pa55").await;

    let listed = send(
        &app,
        json_request(Method::GET, "/api/security/roles", Some(token.as_str()), None),
    )
    .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(audit_actions(&app, "access.denied").await, 0);

    let created = send(
        &app,
        json_request(
            Method::POST,
            "/api/security/roles",
            Some(token.as_str()),
            Some(json!({"name": "sneaky"})),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::FORBIDDEN);
    assert_eq!(audit_actions(&app, "access.denied").await, 1);
    assert_eq!(audit_actions(&app, "role.created").await, 0);
}

#[tokio::test]
async fn revoked_sessions_fail_strict_routes_but_not_lenient_ones() {
    let app = test_app();
    let admin = app
        .directory
        .add_subject("admin@example.com", "s3cret", &["session:revoke"]);
    let token = login(&app, "admin@example.com", "s3cret").await;
    let uri = format!("/api/security/subjects/{admin}/sessions");

    let revoked = send(
        &app,
        json_request(Method::DELETE, uri.as_str(), Some(token.as_str()), None),
    )
    .await;
    assert_eq!(revoked.status(), StatusCode::OK);
    assert_eq!(body_json(revoked).await["revoked_sessions"], 1);

    let strict = send(
        &app,
        json_request(Method::DELETE, uri.as_str(), Some(token.as_str()), None),
    )
    .await;
    assert_eq!(strict.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(strict).await["error"], "session_invalidated");

    let lenient = send(
        &app,
        json_request(Method::GET, "/api/auth/me", Some(token.as_str()), None),
    )
    .await;
    assert_eq!(lenient.status(), StatusCode::OK);
}

#[tokio::test]
async fn cross_origin_cookie_mutation_is_blocked() {
    let app = test_app();
    app.directory.add_subject("ada@example.com", "correct horse", &[]);
    let token = login(&app, "ada@example.com", "correct horse").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .header(header::ACCEPT, "application/json")
        .header(header::ORIGIN, "https://evil.example")
        .header(header::COOKIE, format!("{COOKIE_NAME}={token}"))
        .body(Body::empty())
        .unwrap_or_else(|error| panic!("{error}"));
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(audit_actions(&app, "auth.logout").await, 0);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = test_app();
    app.directory.add_subject("ada@example.com", "correct horse", &[]);
    let token = login(&app, "ada@example.com", "correct horse").await;

    let response = send(
        &app,
        json_request(Method::POST, "/api/auth/logout", Some(token.as_str()), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(audit_actions(&app, "auth.logout").await, 1);
}
