//! Database initialization against real files

use hireflow_common::db::settings::SLA_LAST_SWEEP_KEY;
use hireflow_common::db::{get_setting, init_database, CURRENT_SCHEMA_VERSION};

const EXPECTED_TABLES: &[&str] = &[
    "schema_version",
    "settings",
    "companies",
    "users",
    "jobs",
    "pipeline_stages",
    "candidates",
    "job_candidates",
    "candidate_activities",
    "stage_history",
    "interviews",
    "interview_panel_members",
    "interview_feedback",
    "vendor_job_assignments",
    "notifications",
    "sla_configs",
    "sla_alerts",
    "calendar_connections",
    "calendar_oauth_states",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("hireflow.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "Database file was not created");

    for table in EXPECTED_TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hireflow.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("hireflow.db")).await.unwrap();

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
            .bind(SLA_LAST_SWEEP_KEY)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(exists);

    let value: Option<String> = get_setting(&pool, SLA_LAST_SWEEP_KEY).await.unwrap();
    assert_eq!(value.as_deref(), Some(""));
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("hireflow.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO users (id, company_id, email, full_name, role, password_hash, password_salt, created_at)
         VALUES ('u1', 'no-such-company', 'a@example.com', 'A', 'admin', 'h', 's', '2024-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "insert referencing a missing company must fail");
}
