//! Interview scheduling, conflicts, feedback and notifications

mod helpers;

use axum::http::StatusCode;
use helpers::TestApp;
use serde_json::{json, Value};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hireflow_common::Result;
use hireflow_server::models::CalendarProviderKind;
use hireflow_server::services::calendar::{
    CalendarEvent, CalendarProvider, CalendarRegistry, TokenGrant, WorkingHours,
};
use std::sync::Arc;

struct Setup {
    app: TestApp,
    recruiter: String,
    manager: String,
    manager_id: String,
    jc: String,
}

async fn setup() -> Setup {
    setup_on(TestApp::new().await).await
}

async fn setup_on(app: TestApp) -> Setup {
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let (recruiter, _) = app.add_user(&admin, "rita@acme.io", "recruiter").await;
    let (manager, manager_id) = app.add_user(&admin, "hal@acme.io", "hiring_manager").await;

    let (status, job) = app
        .post(
            "/api/jobs",
            &admin,
            json!({ "title": "Rust Engineer", "status": "open", "hiring_manager_id": manager_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = job["id"].as_str().unwrap().to_string();
    let (_, jc) = app.add_candidate(&recruiter, &job_id, "Ada", "ada.l@example.com").await;

    Setup {
        app,
        recruiter,
        manager,
        manager_id,
        jc,
    }
}

fn schedule_body(jc: &str, panel: &[&str], starts_at: &str, ends_at: &str) -> Value {
    json!({
        "job_candidate_id": jc,
        "title": "Technical interview",
        "interview_type": "technical",
        "starts_at": starts_at,
        "ends_at": ends_at,
        "panel": panel,
    })
}

#[tokio::test]
async fn test_schedule_notifies_panel() {
    let s = setup().await;

    let (status, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", interview);
    assert_eq!(interview["status"], "scheduled");
    assert_eq!(interview["panel"].as_array().unwrap().len(), 1);

    let (_, notes) = s.app.get("/api/notifications", &s.manager).await;
    let kinds: Vec<&str> = notes["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"interview_scheduled"));

    let (_, count) = s.app.get("/api/notifications/unread-count", &s.manager).await;
    assert!(count["unread"].as_i64().unwrap() >= 1);

    let (_, activities) = s.app.get(&format!("/api/job-candidates/{}/activities", s.jc), &s.recruiter).await;
    assert!(activities
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a["activity_type"] == "interview_scheduled"));
}

#[tokio::test]
async fn test_window_validation() {
    let s = setup().await;

    let (status, _) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T11:00:00Z", "2030-03-04T10:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overlapping_panel_conflicts() {
    let s = setup().await;
    let (status, first) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let overlapping = schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:30:00Z", "2030-03-04T11:30:00Z");
    let (status, body) = s.app.post("/api/interviews", &s.recruiter, overlapping.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains("conflict"));

    // Back-to-back is fine
    let (status, _) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T11:00:00Z", "2030-03-04T12:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Cancelling frees the slot
    let first_id = first["id"].as_str().unwrap();
    let (status, cancelled) = s
        .app
        .post(
            &format!("/api/interviews/{}/cancel", first_id),
            &s.recruiter,
            json!({ "reason": "Candidate asked to move" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancel_reason"], "Candidate asked to move");

    let (status, _) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T10:45:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reschedule_checks_conflicts_against_others_only() {
    let s = setup().await;
    let (_, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    let id = interview["id"].as_str().unwrap();

    let (status, moved) = s
        .app
        .patch(
            &format!("/api/interviews/{}", id),
            &s.recruiter,
            json!({ "starts_at": "2030-03-04T10:30:00Z", "ends_at": "2030-03-04T11:30:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", moved);
    assert_eq!(moved["starts_at"], "2030-03-04T10:30:00Z");
}

#[tokio::test]
async fn test_feedback_only_from_panel() {
    let s = setup().await;
    let (_, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    let id = interview["id"].as_str().unwrap();
    let uri = format!("/api/interviews/{}/feedback", id);
    let feedback = json!({ "rating": 4, "recommendation": "yes", "notes": "Solid" });

    let (status, _) = s.app.post(&uri, &s.recruiter, feedback.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = s
        .app
        .post(&uri, &s.manager, json!({ "rating": 6, "recommendation": "yes" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = s.app.post(&uri, &s.manager, feedback).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4);

    // Resubmitting replaces the earlier feedback
    let (status, _) = s
        .app
        .post(&uri, &s.manager, json!({ "rating": 5, "recommendation": "strong_yes" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = s.app.get(&uri, &s.recruiter).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["recommendation"], "strong_yes");
}

#[tokio::test]
async fn test_no_feedback_on_cancelled_interview() {
    let s = setup().await;
    let (_, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    let id = interview["id"].as_str().unwrap();
    s.app
        .request("POST", &format!("/api/interviews/{}/cancel", id), Some(&s.recruiter), None)
        .await;

    let (status, _) = s
        .app
        .post(
            &format!("/api/interviews/{}/feedback", id),
            &s.manager,
            json!({ "rating": 3, "recommendation": "no" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = s
        .app
        .request("POST", &format!("/api/interviews/{}/cancel", id), Some(&s.recruiter), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "only scheduled interviews can be cancelled");
}

/// Calendar that accepts every event without network access
struct StubCalendar;

#[async_trait]
impl CalendarProvider for StubCalendar {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Google
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        Ok(format!("https://calendar.test/auth?state={}", state))
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant> {
        Ok(TokenGrant {
            access_token: "stub-access".to_string(),
            refresh_token: None,
            expires_at: None,
            external_email: Some("hal@calendar.test".to_string()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
        self.exchange_code("").await
    }

    async fn create_event(&self, _access_token: &str, _event: &CalendarEvent) -> Result<String> {
        Ok("evt-1".to_string())
    }

    async fn delete_event(&self, _access_token: &str, _event_id: &str) -> Result<()> {
        Ok(())
    }

    async fn busy_times(
        &self,
        _access_token: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        Ok(Vec::new())
    }
}

/// Setup whose hiring manager has connected the stub calendar
async fn setup_with_calendar() -> Setup {
    let registry = CalendarRegistry::new(WorkingHours { start: 9, end: 17 }).with_provider(Arc::new(StubCalendar));
    let s = setup_on(TestApp::with_calendar(registry).await).await;

    let (status, start) = s.app.get("/api/calendar/connect/google", &s.manager).await;
    assert_eq!(status, StatusCode::OK, "{}", start);
    let (status, body) = s
        .app
        .post(
            "/api/calendar/callback",
            &s.manager,
            json!({ "state": start["state"], "code": "auth-code" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    s
}

#[tokio::test]
async fn test_schedule_pushes_to_connected_calendar() {
    let s = setup_with_calendar().await;

    let (status, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", interview);
    assert_eq!(interview["panel"][0]["calendar_provider"], "google");
    assert_eq!(interview["panel"][0]["calendar_event_id"], "evt-1");
}

#[tokio::test]
async fn test_calendar_bookkeeping_failure_keeps_interview() {
    let s = setup_with_calendar().await;
    sqlx::query(
        "CREATE TRIGGER block_calendar_ids BEFORE UPDATE OF calendar_event_id ON interview_panel_members \
         BEGIN SELECT RAISE(ABORT, 'calendar ids are read-only'); END",
    )
    .execute(&s.app.state.db)
    .await
    .unwrap();

    let (status, interview) = s
        .app
        .post(
            "/api/interviews",
            &s.recruiter,
            schedule_body(&s.jc, &[&s.manager_id], "2030-03-04T10:00:00Z", "2030-03-04T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", interview);
    assert!(interview["panel"][0]["calendar_event_id"].is_null());

    let id = interview["id"].as_str().unwrap();
    let (status, rescheduled) = s
        .app
        .patch(
            &format!("/api/interviews/{}", id),
            &s.recruiter,
            json!({ "starts_at": "2030-03-05T10:00:00Z", "ends_at": "2030-03-05T11:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", rescheduled);
    assert_eq!(rescheduled["starts_at"], "2030-03-05T10:00:00Z");
}
