#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use quill::api::{self, AppState};
use quill::config::Config;
use quill::services::MemoryMailer;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "Adm1n-pass";

pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("quill-test-{}.db", uuid::Uuid::new_v4()))
}

/// Defaults with a throwaway database and cheap hashing.
pub fn test_config(db_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<MemoryMailer>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.db_path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub async fn spawn_app() -> TestApp {
    let db_path = temp_db_path();
    let mailer = Arc::new(MemoryMailer::new());

    let state = api::create_app_state_with_mailer(test_config(&db_path), mailer.clone())
        .await
        .expect("Failed to create app state");
    let router = api::router(Arc::clone(&state));

    TestApp {
        router,
        state,
        mailer,
        db_path,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<String>,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            body,
            cookie,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, cookie, Some(body)).await
    }

    pub async fn put(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, cookie, Some(body)).await
    }

    pub async fn signup(&self, username: &str, password1: &str, password2: &str) -> TestResponse {
        self.post(
            "/api/auth/signup",
            None,
            serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password1": password1,
                "password2": password2,
            }),
        )
        .await
    }

    /// Returns the session cookie.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.cookie.expect("login did not set a session cookie")
    }

    /// The operator account an installer creates with `createsuperuser`.
    pub async fn create_admin(&self) {
        self.state
            .identity
            .manager()
            .create_superuser("admin", "admin@example.com", ADMIN_PASSWORD)
            .await
            .expect("Failed to create superuser");
    }

    pub async fn account_count(&self) -> u64 {
        self.state.store.count_accounts().await.unwrap()
    }
}
