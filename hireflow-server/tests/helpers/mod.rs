//! Shared helpers for driving the router in-process
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use hireflow_common::db::init_database;
use http_body_util::BodyExt; // for `collect`
use hireflow_server::services::auth::TokenSettings;
use hireflow_server::services::calendar::{CalendarRegistry, WorkingHours};
use hireflow_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    /// Fresh database in a temp directory, no calendar providers
    pub async fn new() -> Self {
        Self::with_calendar(CalendarRegistry::new(WorkingHours { start: 9, end: 17 })).await
    }

    pub async fn with_calendar(calendar: CalendarRegistry) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let pool = init_database(&dir.path().join("hireflow.db"))
            .await
            .expect("database init");
        let state = AppState::new(pool, TokenSettings::new("test-secret", 24), calendar);
        let router = build_router(state.clone());
        Self {
            state,
            router,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Should read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, Some(token), None).await
    }

    /// Register a company; returns the admin's token and the response body
    pub async fn register(&self, company: &str, email: &str) -> (String, Value) {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "company_name": company,
                    "full_name": "Ada Admin",
                    "email": email,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (body["token"].as_str().unwrap().to_string(), body)
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Create a user with `role` and sign them in; returns (token, user id)
    pub async fn add_user(&self, admin_token: &str, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/users",
                admin_token,
                json!({
                    "email": email,
                    "full_name": format!("{} user", role),
                    "role": role,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {}", body);
        let id = body["id"].as_str().unwrap().to_string();
        (self.login(email).await, id)
    }

    /// Create an open job with the standard pipeline
    pub async fn create_job(&self, token: &str, title: &str) -> Value {
        let (status, body) = self
            .post("/api/jobs", token, json!({ "title": title, "status": "open" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create job failed: {}", body);
        body
    }

    /// Top-level stages of a job, in order
    pub async fn stages(&self, token: &str, job_id: &str) -> Vec<Value> {
        let (status, body) = self.get(&format!("/api/jobs/{}/stages", job_id), token).await;
        assert_eq!(status, StatusCode::OK, "list stages failed: {}", body);
        body.as_array().unwrap().clone()
    }

    pub async fn stage_id(&self, token: &str, job_id: &str, name: &str) -> String {
        self.stages(token, job_id)
            .await
            .iter()
            .find(|s| s["name"] == name)
            .unwrap_or_else(|| panic!("no stage named {}", name))["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Create a candidate applied to `job_id`; returns (candidate id, application id)
    pub async fn add_candidate(&self, token: &str, job_id: &str, first: &str, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/candidates",
                token,
                json!({
                    "first_name": first,
                    "last_name": "Lovelace",
                    "email": email,
                    "job_id": job_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create candidate failed: {}", body);
        (
            body["candidate"]["id"].as_str().unwrap().to_string(),
            body["application"]["id"].as_str().unwrap().to_string(),
        )
    }
}
