//! Reporting endpoints and notification read state

mod helpers;

use axum::http::StatusCode;
use helpers::TestApp;
use serde_json::{json, Value};

async fn apply(app: &TestApp, token: &str, job_id: &str, first: &str, email: &str, source: Option<&str>) -> String {
    let (status, body) = app
        .post(
            "/api/candidates",
            token,
            json!({
                "first_name": first,
                "last_name": "Tester",
                "email": email,
                "source": source,
                "job_id": job_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["application"]["id"].as_str().unwrap().to_string()
}

async fn move_to(app: &TestApp, token: &str, jc: &str, stage_id: &str) {
    let (status, body) = app
        .post(&format!("/api/job-candidates/{}/move", jc), token, json!({ "stage_id": stage_id }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

/// Three applications: one hired via an interview sub-stage, one in
/// Applied, one left in Queue
async fn seed_hiring(app: &TestApp, admin: &str) -> String {
    let job = app.create_job(admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap().to_string();
    let applied = app.stage_id(admin, &job_id, "Applied").await;
    let interview = app.stage_id(admin, &job_id, "Interview").await;
    let (status, phone) = app
        .post(
            &format!("/api/jobs/{}/stages", job_id),
            admin,
            json!({ "name": "Phone", "parent_id": interview }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let phone = phone["id"].as_str().unwrap().to_string();

    let ada = apply(app, admin, &job_id, "Ada", "ada@example.com", Some("referral")).await;
    let bob = apply(app, admin, &job_id, "Bob", "bob@example.com", Some("linkedin")).await;
    apply(app, admin, &job_id, "Cy", "cy@example.com", None).await;

    move_to(app, admin, &ada, &applied).await;
    move_to(app, admin, &ada, &phone).await;
    move_to(app, admin, &bob, &applied).await;

    let (status, body) = app
        .post(
            &format!("/api/job-candidates/{}/status", ada),
            admin,
            json!({ "status": "hired" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    job_id
}

fn funnel_row<'a>(funnel: &'a Value, name: &str) -> &'a Value {
    funnel["stages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .unwrap_or_else(|| panic!("no funnel row for {}", name))
}

#[tokio::test]
async fn test_job_funnel_rolls_up_sub_stages() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job_id = seed_hiring(&app, &admin).await;

    let (status, funnel) = app
        .get(&format!("/api/analytics/jobs/{}/funnel", job_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", funnel);

    let names: Vec<&str> = funnel["stages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Queue", "Applied", "Screening", "Interview", "Offer", "Hired"]);

    let queue = funnel_row(&funnel, "Queue");
    assert_eq!(queue["reached"], 3);
    assert_eq!(queue["current"], 1);
    assert_eq!(queue["conversion_from_first"].as_f64().unwrap(), 1.0);

    let applied = funnel_row(&funnel, "Applied");
    assert_eq!(applied["reached"], 2);
    assert_eq!(applied["current"], 1);
    let conversion = applied["conversion_from_first"].as_f64().unwrap();
    assert!((conversion - 2.0 / 3.0).abs() < 1e-9);

    // reached through the Phone sub-stage; hired applications are not current
    let interview = funnel_row(&funnel, "Interview");
    assert_eq!(interview["reached"], 1);
    assert_eq!(interview["current"], 0);

    assert_eq!(funnel_row(&funnel, "Screening")["reached"], 0);
    assert_eq!(funnel_row(&funnel, "Screening")["conversion_from_first"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn test_overview_time_to_hire_and_sources() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job_id = seed_hiring(&app, &admin).await;
    app.create_job(&admin, "Designer").await;

    let (status, overview) = app.get("/api/analytics/overview", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["open_jobs"], 2);
    assert_eq!(overview["total_candidates"], 3);
    assert_eq!(overview["active_applications"], 2);
    assert_eq!(overview["upcoming_interviews"], 0);
    assert_eq!(overview["hires_last_30_days"], 1);

    let (status, tth) = app.get("/api/analytics/time-to-hire", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tth["hires"], 1);
    let average = tth["average_days"].as_f64().unwrap();
    assert!((0.0..1.0).contains(&average));
    assert_eq!(tth["median_days"], tth["average_days"]);

    let (_, scoped) = app
        .get(&format!("/api/analytics/time-to-hire?job_id={}", job_id), &admin)
        .await;
    assert_eq!(scoped["hires"], 1);
    assert_eq!(scoped["job_id"], job_id.as_str());

    let (status, sources) = app.get("/api/analytics/sources", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<(&str, i64, i64)> = sources
        .as_array()
        .unwrap()
        .iter()
        .map(|s| {
            (
                s["source"].as_str().unwrap(),
                s["candidates"].as_i64().unwrap(),
                s["hired"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![("linkedin", 1, 0), ("referral", 1, 1), ("unknown", 1, 0)]
    );
}

#[tokio::test]
async fn test_time_to_hire_without_hires() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;

    let (status, tth) = app.get("/api/analytics/time-to-hire", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tth["hires"], 0);
    assert!(tth["average_days"].is_null());
    assert!(tth["median_days"].is_null());
}

#[tokio::test]
async fn test_analytics_scoped_and_guarded() {
    let app = TestApp::new().await;
    let (acme, _) = app.register("Acme", "ada@acme.io").await;
    let (globex, _) = app.register("Globex", "hank@globex.io").await;
    let job_id = seed_hiring(&app, &acme).await;
    let (vendor, _) = app.add_user(&acme, "val@agency.io", "vendor").await;

    let (_, overview) = app.get("/api/analytics/overview", &globex).await;
    assert_eq!(overview["total_candidates"], 0);
    assert_eq!(overview["hires_last_30_days"], 0);

    let (status, _) = app
        .get(&format!("/api/analytics/jobs/{}/funnel", job_id), &globex)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/analytics/overview", &vendor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_notification_read_state() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let (vendor, vendor_id) = app.add_user(&admin, "val@agency.io", "vendor").await;

    for title in ["Rust Engineer", "Designer"] {
        let job = app.create_job(&admin, title).await;
        let (status, _) = app
            .post(
                &format!("/api/vendors/{}/jobs", vendor_id),
                &admin,
                json!({ "job_id": job["id"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, count) = app.get("/api/notifications/unread-count", &vendor).await;
    assert_eq!(count["unread"], 2);

    let (_, list) = app.get("/api/notifications", &vendor).await;
    let first = list["items"][0]["id"].as_str().unwrap().to_string();

    // another user's notification is invisible
    let (status, _) = app
        .post(&format!("/api/notifications/{}/read", first), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, read) = app
        .post(&format!("/api/notifications/{}/read", first), &vendor, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], true);
    assert!(!read["read_at"].is_null());

    let (status, again) = app
        .post(&format!("/api/notifications/{}/read", first), &vendor, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["is_read"], true);
    let (_, third) = app
        .post(&format!("/api/notifications/{}/read", first), &vendor, json!({}))
        .await;
    assert_eq!(third["read_at"], again["read_at"]);

    let (_, count) = app.get("/api/notifications/unread-count", &vendor).await;
    assert_eq!(count["unread"], 1);
    let (_, unread) = app.get("/api/notifications?unread_only=true", &vendor).await;
    assert_eq!(unread["total"], 1);

    let (_, marked) = app.post("/api/notifications/read-all", &vendor, json!({})).await;
    assert_eq!(marked["updated"], 1);
    let (_, marked) = app.post("/api/notifications/read-all", &vendor, json!({})).await;
    assert_eq!(marked["updated"], 0);

    let (_, count) = app.get("/api/notifications/unread-count", &vendor).await;
    assert_eq!(count["unread"], 0);
    let (_, all) = app.get("/api/notifications", &vendor).await;
    assert_eq!(all["total"], 2);
}
