//! Jobs, pipeline stages, applications and bulk operations

mod helpers;

use axum::http::StatusCode;
use helpers::TestApp;
use serde_json::{json, Value};

fn names(stages: &[Value]) -> Vec<&str> {
    stages.iter().map(|s| s["name"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_new_job_gets_standard_pipeline() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;

    let job = app.create_job(&admin, "Rust Engineer").await;
    assert_eq!(job["status"], "open");
    assert_eq!(job["active_candidates"], 0);

    let stages = app.stages(&admin, job["id"].as_str().unwrap()).await;
    assert_eq!(
        names(&stages),
        vec!["Queue", "Applied", "Screening", "Interview", "Offer", "Hired"]
    );
    assert_eq!(stages[0]["is_default"], true);
    assert_eq!(stages[5]["is_mandatory"], true);
}

#[tokio::test]
async fn test_custom_pipeline_and_duplicate_names() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;

    let (status, job) = app
        .post(
            "/api/jobs",
            &admin,
            json!({ "title": "Designer", "stages": ["Portfolio Review", "Onsite"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "draft");
    let stages = app.stages(&admin, job["id"].as_str().unwrap()).await;
    assert_eq!(
        names(&stages),
        vec!["Queue", "Applied", "Portfolio Review", "Onsite", "Hired"]
    );

    let (status, _) = app
        .post("/api/jobs", &admin, json!({ "title": "Designer", "stages": ["hired"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recruiter_cannot_create_jobs() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let (recruiter, _) = app.add_user(&admin, "rita@acme.io", "recruiter").await;

    let (status, body) = app.post("/api/jobs", &recruiter, json!({ "title": "Nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_mandatory_stage_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let hired = app.stage_id(&admin, job_id, "Hired").await;
    let (status, _) = app.delete(&format!("/api/jobs/{}/stages/{}", job_id, hired), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_occupied_stage_moves_candidates() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let (_, jc) = app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;

    let screening = app.stage_id(&admin, job_id, "Screening").await;
    let applied = app.stage_id(&admin, job_id, "Applied").await;
    let (status, _) = app
        .post(&format!("/api/job-candidates/{}/move", jc), &admin, json!({ "stage_id": screening }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/jobs/{}/stages/{}", job_id, screening);
    let (status, _) = app.delete(&uri, &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "occupied stage needs a target");

    let (status, body) = app.delete(&format!("{}?move_to_stage_id={}", uri, applied), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moved_candidates"], 1);

    let (_, application) = app.get(&format!("/api/job-candidates/{}", jc), &admin).await;
    assert_eq!(application["current_stage_id"], applied.as_str());

    let stages = app.stages(&admin, job_id).await;
    assert!(!names(&stages).contains(&"Screening"));
    let positions: Vec<i64> = stages.iter().map(|s| s["position"].as_i64().unwrap()).collect();
    assert_eq!(positions, (0..stages.len() as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_sub_stages_nest_under_parent() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let interview = app.stage_id(&admin, job_id, "Interview").await;

    for name in ["Tech Screen", "System Design"] {
        let (status, _) = app
            .post(
                &format!("/api/jobs/{}/stages", job_id),
                &admin,
                json!({ "name": name, "parent_id": interview }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let stages = app.stages(&admin, job_id).await;
    let node = stages.iter().find(|s| s["name"] == "Interview").unwrap();
    let subs: Vec<&str> = node["sub_stages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(subs, vec!["Tech Screen", "System Design"]);
}

#[tokio::test]
async fn test_candidate_lands_in_default_stage_with_history() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let (_, jc) = app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;
    let queue = app.stage_id(&admin, job_id, "Queue").await;
    let applied = app.stage_id(&admin, job_id, "Applied").await;

    let (_, application) = app.get(&format!("/api/job-candidates/{}", jc), &admin).await;
    assert_eq!(application["current_stage_id"], queue.as_str());
    assert_eq!(application["status"], "active");

    let (status, moved) = app
        .post(&format!("/api/job-candidates/{}/move", jc), &admin, json!({ "stage_id": applied }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["current_stage_id"], applied.as_str());

    let (status, _) = app
        .post(&format!("/api/job-candidates/{}/move", jc), &admin, json!({ "stage_id": applied }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "already in that stage");

    let (_, history) = app.get(&format!("/api/job-candidates/{}/stage-history", jc), &admin).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0]["from_stage_id"].is_null());

    let (_, activities) = app.get(&format!("/api/job-candidates/{}/activities", jc), &admin).await;
    let types: Vec<&str> = activities
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["activity_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"candidate_added"));
    assert!(types.contains(&"stage_change"));
}

#[tokio::test]
async fn test_duplicate_application_conflicts() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let (candidate, _) = app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;

    let (status, _) = app
        .post(
            &format!("/api/jobs/{}/candidates", job_id),
            &admin,
            json!({ "candidate_id": candidate }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_change_blocks_moves() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let (_, jc) = app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;

    let (status, body) = app
        .post(
            &format!("/api/job-candidates/{}/status", jc),
            &admin,
            json!({ "status": "rejected", "reason": "Not a fit" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert!(body["rejected_at"].is_string());

    let applied = app.stage_id(&admin, job_id, "Applied").await;
    let (status, _) = app
        .post(&format!("/api/job-candidates/{}/move", jc), &admin, json!({ "stage_id": applied }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_move_reports_per_item_results() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let (_, first) = app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;
    let (_, second) = app.add_candidate(&admin, job_id, "Grace", "grace@example.com").await;
    let (_, third) = app.add_candidate(&admin, job_id, "Linus", "linus@example.com").await;
    app.post(
        &format!("/api/job-candidates/{}/status", third),
        &admin,
        json!({ "status": "withdrawn" }),
    )
    .await;
    let missing = uuid::Uuid::new_v4().to_string();

    let screening = app.stage_id(&admin, job_id, "Screening").await;
    let (status, result) = app
        .post(
            &format!("/api/jobs/{}/candidates/bulk-move", job_id),
            &admin,
            json!({
                "job_candidate_ids": [first, second, first, third, missing],
                "target_stage_id": screening,
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["moved"], json!([first, second]));
    let failed = result["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0]["job_candidate_id"], third.as_str());
    assert_eq!(failed[1]["job_candidate_id"], missing.as_str());

    let (_, board) = app
        .get(&format!("/api/jobs/{}/candidates?stage_id={}", job_id, screening), &admin)
        .await;
    assert_eq!(board.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bulk_import_creates_updates_and_links() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    app.add_candidate(&admin, job_id, "Ada", "ada.l@example.com").await;

    let (status, result) = app
        .post(
            "/api/candidates/import",
            &admin,
            json!({
                "job_id": job_id,
                "source": "career_fair",
                "rows": [
                    { "first_name": "Grace", "last_name": "Hopper", "email": "grace@example.com" },
                    { "first_name": "Ada", "last_name": "Lovelace", "email": "ADA.L@example.com" },
                    { "first_name": "", "last_name": "Nobody", "email": "nobody@example.com" },
                    { "first_name": "Grace", "last_name": "Again", "email": "grace@example.com" },
                ],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["created"], 1);
    assert_eq!(result["updated"], 1);
    assert_eq!(result["linked"], 1);
    assert_eq!(result["already_applied"], 1);
    let failed = result["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0]["row"], 3);
    assert_eq!(failed[1]["row"], 4);

    // Rows without their own source take the import's
    let (_, page) = app.get("/api/candidates?source=career_fair", &admin).await;
    assert_eq!(page["total"], 2);
}

fn ids(stages: &[Value]) -> Vec<String> {
    stages.iter().map(|s| s["id"].as_str().unwrap().to_string()).collect()
}

fn positions(stages: &[Value]) -> Vec<i64> {
    stages.iter().map(|s| s["position"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn test_reorder_top_level_stages() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let mut order = ids(&app.stages(&admin, job_id).await);
    order.swap(2, 4);
    let (status, body) = app
        .post(
            &format!("/api/jobs/{}/stages/reorder", job_id),
            &admin,
            json!({ "ordered_ids": order }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(positions(body.as_array().unwrap()), vec![0, 1, 2, 3, 4, 5]);

    let stages = app.stages(&admin, job_id).await;
    assert_eq!(
        names(&stages),
        vec!["Queue", "Applied", "Offer", "Interview", "Screening", "Hired"]
    );
    assert_eq!(positions(&stages), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_reorder_sub_stage_group() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let interview = app.stage_id(&admin, job_id, "Interview").await;

    let mut sub_ids = Vec::new();
    for name in ["Phone", "Technical", "Onsite"] {
        let (status, body) = app
            .post(
                &format!("/api/jobs/{}/stages", job_id),
                &admin,
                json!({ "name": name, "parent_id": interview }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        sub_ids.push(body["id"].as_str().unwrap().to_string());
    }

    let reversed: Vec<String> = sub_ids.iter().rev().cloned().collect();
    let (status, body) = app
        .post(
            &format!("/api/jobs/{}/stages/reorder", job_id),
            &admin,
            json!({ "parent_id": interview, "ordered_ids": reversed }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(names(body.as_array().unwrap()), vec!["Onsite", "Technical", "Phone"]);
    assert_eq!(positions(body.as_array().unwrap()), vec![0, 1, 2]);

    // top-level order is untouched
    let stages = app.stages(&admin, job_id).await;
    assert_eq!(
        names(&stages),
        vec!["Queue", "Applied", "Screening", "Interview", "Offer", "Hired"]
    );
}

#[tokio::test]
async fn test_reorder_rejects_bad_id_lists() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();
    let other = app.create_job(&admin, "Designer").await;
    let other_ids = ids(&app.stages(&admin, other["id"].as_str().unwrap()).await);
    let order = ids(&app.stages(&admin, job_id).await);
    let uri = format!("/api/jobs/{}/stages/reorder", job_id);

    let missing = order[1..].to_vec();
    let mut extra = order.clone();
    extra.push(other_ids[0].clone());
    let mut duplicate = order.clone();
    duplicate[1] = duplicate[0].clone();
    let mut foreign = order.clone();
    foreign[0] = other_ids[0].clone();

    for (label, list) in [
        ("missing", missing),
        ("extra", extra),
        ("duplicate", duplicate),
        ("foreign", foreign),
    ] {
        let (status, body) = app.post(&uri, &admin, json!({ "ordered_ids": list })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} ids: {}", label, body);
    }

    // nothing was applied
    assert_eq!(ids(&app.stages(&admin, job_id).await), order);
}

#[tokio::test]
async fn test_add_stage_mid_range_keeps_positions_contiguous() {
    let app = TestApp::new().await;
    let (admin, _) = app.register("Acme", "ada@acme.io").await;
    let job = app.create_job(&admin, "Rust Engineer").await;
    let job_id = job["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/jobs/{}/stages", job_id),
            &admin,
            json!({ "name": "Take-home", "position": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["position"], 3);

    let stages = app.stages(&admin, job_id).await;
    assert_eq!(
        names(&stages),
        vec!["Queue", "Applied", "Screening", "Take-home", "Interview", "Offer", "Hired"]
    );
    assert_eq!(positions(&stages), vec![0, 1, 2, 3, 4, 5, 6]);

    let (status, _) = app
        .post(
            &format!("/api/jobs/{}/stages", job_id),
            &admin,
            json!({ "name": "Reference Check", "position": 99 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let stages = app.stages(&admin, job_id).await;
    assert_eq!(names(&stages).last(), Some(&"Reference Check"));
    assert_eq!(positions(&stages), (0..8).collect::<Vec<i64>>());
}
