//! Aggregate queries for reporting

use super::{get_time, get_uuid, opt_id};
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

pub async fn count_open_jobs(conn: &mut SqliteConnection, company_id: Uuid) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE company_id = ? AND status = 'open'")
        .bind(company_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(n)
}

pub async fn count_candidates(conn: &mut SqliteConnection, company_id: Uuid) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE company_id = ?")
        .bind(company_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(n)
}

pub async fn count_active_applications(conn: &mut SqliteConnection, company_id: Uuid) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_candidates jc JOIN jobs j ON j.id = jc.job_id \
         WHERE j.company_id = ? AND jc.status = 'active'",
    )
    .bind(company_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(n)
}

pub async fn count_hires_since(conn: &mut SqliteConnection, company_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_candidates jc JOIN jobs j ON j.id = jc.job_id \
         WHERE j.company_id = ? AND jc.status = 'hired' AND jc.hired_at >= ?",
    )
    .bind(company_id.to_string())
    .bind(time::to_db(&since))
    .fetch_one(conn)
    .await?;
    Ok(n)
}

/// Distinct (stage, application) pairs from a job's stage history
pub async fn stages_reached(conn: &mut SqliteConnection, job_id: Uuid) -> Result<Vec<(Uuid, Uuid)>> {
    let rows = sqlx::query(
        "SELECT DISTINCT h.to_stage_id AS stage_id, h.job_candidate_id AS job_candidate_id \
         FROM stage_history h JOIN job_candidates jc ON jc.id = h.job_candidate_id \
         WHERE jc.job_id = ?",
    )
    .bind(job_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((get_uuid(r, "stage_id")?, get_uuid(r, "job_candidate_id")?)))
        .collect()
}

/// `(applied_at, hired_at)` for hired applications
pub async fn hire_dates(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    job_id: Option<Uuid>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let job = opt_id(job_id);
    let rows = sqlx::query(
        "SELECT jc.applied_at AS applied_at, jc.hired_at AS hired_at \
         FROM job_candidates jc JOIN jobs j ON j.id = jc.job_id \
         WHERE j.company_id = ? AND jc.status = 'hired' AND jc.hired_at IS NOT NULL \
           AND (? IS NULL OR jc.job_id = ?)",
    )
    .bind(company_id.to_string())
    .bind(&job)
    .bind(&job)
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((get_time(r, "applied_at")?, get_time(r, "hired_at")?)))
        .collect()
}

/// Candidate and hire counts per source, largest first
pub async fn source_counts(conn: &mut SqliteConnection, company_id: Uuid) -> Result<Vec<(String, i64, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT COALESCE(NULLIF(trim(c.source), ''), 'unknown') AS source,
               COUNT(*) AS candidates,
               SUM(CASE WHEN EXISTS (SELECT 1 FROM job_candidates jc
                                     WHERE jc.candidate_id = c.id AND jc.status = 'hired')
                        THEN 1 ELSE 0 END) AS hired
        FROM candidates c
        WHERE c.company_id = ?
        GROUP BY 1
        ORDER BY candidates DESC, source
        "#,
    )
    .bind(company_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((r.try_get("source")?, r.try_get("candidates")?, r.try_get("hired")?)))
        .collect()
}
