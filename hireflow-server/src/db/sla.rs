//! SLA configuration and alert rows

use super::{get_time, get_uuid};
use crate::models::SlaConfig;
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const CONFIG_COLUMNS: &str =
    "id, company_id, stage_name, max_days, warning_days, created_at, updated_at";

fn config_from_row(row: &SqliteRow) -> Result<SlaConfig> {
    Ok(SlaConfig {
        id: get_uuid(row, "id")?,
        company_id: get_uuid(row, "company_id")?,
        stage_name: row.try_get("stage_name")?,
        max_days: row.try_get("max_days")?,
        warning_days: row.try_get("warning_days")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

pub async fn list_configs(conn: &mut SqliteConnection, company_id: Uuid) -> Result<Vec<SlaConfig>> {
    let sql = format!(
        "SELECT {} FROM sla_configs WHERE company_id = ? ORDER BY lower(stage_name)",
        CONFIG_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(config_from_row).collect()
}

pub async fn find_config_by_stage(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    stage_name: &str,
) -> Result<Option<SlaConfig>> {
    let sql = format!(
        "SELECT {} FROM sla_configs WHERE company_id = ? AND lower(stage_name) = lower(?)",
        CONFIG_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(stage_name)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(config_from_row).transpose()
}

pub async fn insert_config(conn: &mut SqliteConnection, c: &SlaConfig) -> Result<()> {
    sqlx::query(
        "INSERT INTO sla_configs (id, company_id, stage_name, max_days, warning_days, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(c.id.to_string())
    .bind(c.company_id.to_string())
    .bind(&c.stage_name)
    .bind(c.max_days)
    .bind(c.warning_days)
    .bind(time::to_db(&c.created_at))
    .bind(time::to_db(&c.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_config(conn: &mut SqliteConnection, c: &SlaConfig) -> Result<()> {
    sqlx::query(
        "UPDATE sla_configs SET stage_name = ?, max_days = ?, warning_days = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&c.stage_name)
    .bind(c.max_days)
    .bind(c.warning_days)
    .bind(time::to_db(&c.updated_at))
    .bind(c.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns true when a row was removed
pub async fn delete_config(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sla_configs WHERE id = ? AND company_id = ?")
        .bind(id.to_string())
        .bind(company_id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// An active application sitting in a stage that has an SLA
#[derive(Debug, Clone)]
pub struct SlaCandidateRow {
    pub job_candidate_id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub stage_id: Uuid,
    pub stage_name: String,
    pub stage_entered_at: DateTime<Utc>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub max_days: i64,
    pub warning_days: Option<i64>,
}

/// Active applications whose current stage name matches a config
/// (case-insensitive)
pub async fn active_in_configured_stages(
    conn: &mut SqliteConnection,
    company_id: Uuid,
) -> Result<Vec<SlaCandidateRow>> {
    let rows = sqlx::query(
        r#"
        SELECT jc.id AS job_candidate_id, j.id AS job_id, j.title AS job_title,
               c.id AS candidate_id, c.first_name AS first_name, c.last_name AS last_name,
               s.id AS stage_id, s.name AS stage_name, jc.stage_entered_at AS stage_entered_at,
               j.hiring_manager_id AS hiring_manager_id, j.recruiter_id AS recruiter_id,
               cfg.max_days AS max_days, cfg.warning_days AS warning_days
        FROM job_candidates jc
        JOIN jobs j ON j.id = jc.job_id
        JOIN candidates c ON c.id = jc.candidate_id
        JOIN pipeline_stages s ON s.id = jc.current_stage_id
        JOIN sla_configs cfg ON cfg.company_id = j.company_id
                            AND lower(cfg.stage_name) = lower(s.name)
        WHERE j.company_id = ? AND jc.status = 'active'
        "#,
    )
    .bind(company_id.to_string())
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|r| {
            let first: String = r.try_get("first_name")?;
            let last: String = r.try_get("last_name")?;
            Ok(SlaCandidateRow {
                job_candidate_id: get_uuid(r, "job_candidate_id")?,
                job_id: get_uuid(r, "job_id")?,
                job_title: r.try_get("job_title")?,
                candidate_id: get_uuid(r, "candidate_id")?,
                candidate_name: format!("{} {}", first, last),
                stage_id: get_uuid(r, "stage_id")?,
                stage_name: r.try_get("stage_name")?,
                stage_entered_at: get_time(r, "stage_entered_at")?,
                hiring_manager_id: super::get_opt_uuid(r, "hiring_manager_id")?,
                recruiter_id: super::get_opt_uuid(r, "recruiter_id")?,
                max_days: r.try_get("max_days")?,
                warning_days: r.try_get("warning_days")?,
            })
        })
        .collect()
}

/// Record a breach alert; returns false when one already exists for the
/// same stage entry
pub async fn record_alert(
    conn: &mut SqliteConnection,
    job_candidate_id: Uuid,
    stage_id: Uuid,
    stage_entered_at: DateTime<Utc>,
    alerted_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO sla_alerts (job_candidate_id, stage_id, stage_entered_at, alerted_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(job_candidate_id.to_string())
    .bind(stage_id.to_string())
    .bind(time::to_db(&stage_entered_at))
    .bind(time::to_db(&alerted_at))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
