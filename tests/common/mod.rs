#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use erp_api::{
    auth::{TokenSubject, ADMIN_ROLE},
    config::AppConfig,
    db,
    events::{self, EventSender},
    services::accounts::CreateUserRequest,
    AppState,
};

/// Application harness backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin_id: Uuid,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

/// Plain response view used by the assertions.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// The `data` member of an [`erp_api::ApiResponse`] envelope.
    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    /// Fresh database with migrations applied and a superuser.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("erp_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx, db_arc.clone()));
        let state = AppState::new(db_arc, cfg.clone(), Arc::new(EventSender::new(event_tx)));

        state
            .services
            .accounts
            .bootstrap(&cfg)
            .await
            .expect("sync permissions");

        let admin = state
            .services
            .accounts
            .create_user(Uuid::nil(), user_request("admin", true, Vec::new()))
            .await
            .expect("create admin");
        let admin_token = token_for(&state, admin.id, "admin", vec![ADMIN_ROLE.to_string()], Vec::new());

        let router = erp_api::app_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            admin_id: admin.id,
            admin_token,
            _event_task: event_task,
            _dir: dir,
        }
    }

    /// Creates a regular user holding `permissions` and returns its id and token.
    pub async fn user_with(&self, username: &str, permissions: &[&str]) -> (Uuid, String) {
        let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        let user = self
            .state
            .services
            .accounts
            .create_user(
                self.admin_id,
                user_request(username, false, permissions.clone()),
            )
            .await
            .expect("create user");
        let token = token_for(&self.state, user.id, username, Vec::new(), permissions);
        (user.id, token)
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(&self.admin_token), None)
            .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(&self.admin_token), None)
            .await
    }

    /// Creates a catalog entry and returns its id.
    pub async fn catalog_entry(&self, slug: &str, code: &str, extra: Value) -> Uuid {
        let mut body = json!({ "code": code, "name": format!("{} entry", code) });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        let response = self.post(&format!("/api/v1/catalogs/{}", slug), body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        id_of(&response.data())
    }

    pub async fn warehouse(&self, code: &str) -> Uuid {
        let response = self
            .post(
                "/api/v1/warehouses",
                json!({ "code": code, "name": format!("Warehouse {}", code) }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        id_of(&response.data())
    }

    pub async fn article(&self, code: &str, warehouse_id: Uuid, initial_stock: i32) -> Uuid {
        let response = self
            .post(
                "/api/v1/articles",
                json!({
                    "code": code,
                    "name": format!("Article {}", code),
                    "warehouse_id": warehouse_id,
                    "initial_stock": initial_stock,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        id_of(&response.data())
    }

    pub async fn stock_of(&self, article_id: Uuid) -> i64 {
        let response = self.get(&format!("/api/v1/articles/{}", article_id)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.data()["stock"].as_i64().expect("stock")
    }

    /// Yields until the event processor has caught up with queued audit events.
    pub async fn settle_events(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .unwrap_or_else(|| panic!("no id in {}", value))
}

fn user_request(username: &str, superuser: bool, permissions: Vec<String>) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        password: "correct-horse-battery".to_string(),
        is_active: true,
        is_superuser: superuser,
        group_ids: Vec::new(),
        permissions,
    }
}

fn token_for(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    roles: Vec<String>,
    permissions: Vec<String>,
) -> String {
    state
        .auth
        .generate_token(&TokenSubject {
            user_id,
            name: name.to_string(),
            email: format!("{}@example.com", name),
            roles,
            permissions,
        })
        .expect("issue token")
        .access_token
}
