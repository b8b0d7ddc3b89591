//! Boolean candidate search over the HTTP API

mod helpers;

use axum::http::StatusCode;
use helpers::TestApp;
use serde_json::{json, Value};

async fn seed(app: &TestApp, token: &str) {
    let rows = json!([
        { "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com",
          "skills": ["Rust", "Python"], "location": "London", "current_title": "Senior Engineer" },
        { "first_name": "Grace", "last_name": "Hopper", "email": "grace@example.com",
          "skills": ["COBOL", "Rust"], "location": "New York", "current_title": "Admiral" },
        { "first_name": "Linus", "last_name": "Torvalds", "email": "linus@example.com",
          "skills": ["C", "Git"], "location": "Portland", "current_title": "Senior Maintainer" },
    ]);
    let (status, result) = app
        .post("/api/candidates/import", token, json!({ "rows": rows, "source": "referral" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["created"], 3);
}

fn first_names(page: &Value) -> Vec<String> {
    let mut names: Vec<String> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["first_name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

async fn search(app: &TestApp, token: &str, q: &str) -> (StatusCode, Value) {
    let encoded: String = q
        .chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '"' => "%22".to_string(),
            ':' => "%3A".to_string(),
            '(' => "%28".to_string(),
            ')' => "%29".to_string(),
            other => other.to_string(),
        })
        .collect();
    app.get(&format!("/api/search/candidates?q={}", encoded), token).await
}

#[tokio::test]
async fn test_field_and_boolean_queries() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    seed(&app, &admin).await;

    let (status, page) = search(&app, &admin, "skills:rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_names(&page), vec!["Ada", "Grace"]);

    let (_, page) = search(&app, &admin, "skills:rust AND NOT location:london").await;
    assert_eq!(first_names(&page), vec!["Grace"]);

    let (_, page) = search(&app, &admin, "title:\"senior\" (portland OR london)").await;
    assert_eq!(first_names(&page), vec!["Ada", "Linus"]);

    let (_, page) = search(&app, &admin, "hopper OR torvalds").await;
    assert_eq!(first_names(&page), vec!["Grace", "Linus"]);

    let (_, page) = search(&app, &admin, "-skills:git source:referral").await;
    assert_eq!(first_names(&page), vec!["Ada", "Grace"]);
}

#[tokio::test]
async fn test_search_scoped_to_job() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    seed(&app, &admin).await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    // Existing email: the candidate is updated and applied, not duplicated
    let (status, saved) = app
        .post(
            "/api/candidates",
            &admin,
            json!({ "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com", "job_id": job_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["created"], false);
    assert!(saved["application"]["id"].is_string());

    let (status, page) = app
        .get(&format!("/api/search/candidates?q=rust&job_id={}", job_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_names(&page), vec!["Ada"]);
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;

    let (status, body) = search(&app, &admin, "skills:(rust").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid search query"));

    let (status, _) = search(&app, &admin, "salary:100").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_queries_are_bad_request() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    seed(&app, &admin).await;

    let deep = format!("{}rust", "-".repeat(1200));
    let (status, body) = search(&app, &admin, &deep).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("longer than"));

    let nested = format!("{}rust", "-".repeat(100));
    let (status, body) = search(&app, &admin, &nested).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("nested too deeply"));

    let many = vec!["rust"; 100].join(" ");
    let (status, body) = search(&app, &admin, &many).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("more than"));

    let widest = vec!["rust"; 32].join(" OR ");
    let (status, page) = search(&app, &admin, &widest).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["total"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn test_search_does_not_cross_companies() {
    let app = TestApp::new().await;
    let (acme, _) = app.register("Acme", "ada@acme.io").await;
    let (globex, _) = app.register("Globex", "hank@globex.io").await;
    seed(&app, &acme).await;

    let (status, page) = search(&app, &globex, "rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
}
