//! Registration, login, token handling and tenant isolation

mod helpers;

use axum::http::StatusCode;
use helpers::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hireflow-server");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_register_returns_admin_and_company() {
    let app = TestApp::new().await;

    let (token, body) = app.register("Acme", "Ada@Acme.io").await;

    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["email"], "ada@acme.io");
    assert_eq!(body["company"]["name"], "Acme");
    assert!(body["user"].get("password_hash").is_none());

    let (status, me) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], body["user"]["id"]);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register("Acme", "ada@acme.io").await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "company_name": "Other",
                "full_name": "Someone",
                "email": "ADA@acme.io",
                "password": PASSWORD,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "company_name": "Acme",
                "full_name": "Ada",
                "email": "ada@acme.io",
                "password": "short",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register("Acme", "ada@acme.io").await;

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@acme.io", "password": "not-the-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@acme.io", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/api/jobs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/jobs", "garbage.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_query_parameter() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Acme", "ada@acme.io").await;

    let uri = format!("/api/auth/me?access_token={}", token);
    let (status, me) = app.request("GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@acme.io");
}

#[tokio::test]
async fn test_only_admins_manage_users() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let (recruiter, _) = app.add_user(&admin, "rita@acme.io", "recruiter").await;

    let (status, _) = app
        .post(
            "/api/users",
            &recruiter,
            json!({
                "email": "new@acme.io",
                "full_name": "New",
                "role": "recruiter",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = app.get("/api/users?role=recruiter", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_deactivated_user_token_is_rejected() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let (recruiter, recruiter_id) = app.add_user(&admin, "rita@acme.io", "recruiter").await;

    let (status, user) = app.delete(&format!("/api/users/{}", recruiter_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["is_active"], false);

    let (status, _) = app.get("/api/auth/me", &recruiter).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_other_company_data_is_not_found() {
    let app = TestApp::new().await;
    let (acme, _) = app.register("Acme", "ada@acme.io").await;
    let (globex, _) = app.register("Globex", "hank@globex.io").await;

    let job = app.create_job(&acme, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/jobs/{}", job_id), &globex).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = app.get("/api/jobs", &globex).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_concurrent_duplicate_users_conflict() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let body = json!({
        "email": "rita@acme.io",
        "full_name": "Rita Recruiter",
        "role": "recruiter",
        "password": PASSWORD,
    });

    let (first, second) = tokio::join!(
        app.post("/api/users", &admin, body.clone()),
        app.post("/api/users", &admin, body.clone()),
    );
    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
}
