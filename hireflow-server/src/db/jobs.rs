//! Job rows

use super::{get_enum, get_opt_time, get_opt_uuid, get_time, get_uuid, opt_id, opt_ts};
use crate::models::{Job, JobStatus, JobSummary};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const JOB_COLUMNS: &str = "j.id AS id, j.company_id AS company_id, j.title AS title, \
     j.department AS department, j.location AS location, j.employment_type AS employment_type, \
     j.description AS description, j.status AS status, j.hiring_manager_id AS hiring_manager_id, \
     j.recruiter_id AS recruiter_id, j.openings AS openings, j.created_by AS created_by, \
     j.created_at AS created_at, j.updated_at AS updated_at, j.closed_at AS closed_at";

/// Active application count subquery
const ACTIVE_COUNT: &str = "(SELECT COUNT(*) FROM job_candidates jc \
     WHERE jc.job_id = j.id AND jc.status = 'active') AS active_candidates";

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<Job> {
    Ok(Job {
        id: get_uuid(row, "id")?,
        company_id: get_uuid(row, "company_id")?,
        title: row.try_get("title")?,
        department: row.try_get("department")?,
        location: row.try_get("location")?,
        employment_type: row.try_get("employment_type")?,
        description: row.try_get("description")?,
        status: get_enum(row, "status")?,
        hiring_manager_id: get_opt_uuid(row, "hiring_manager_id")?,
        recruiter_id: get_opt_uuid(row, "recruiter_id")?,
        openings: row.try_get("openings")?,
        created_by: get_opt_uuid(row, "created_by")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
        closed_at: get_opt_time(row, "closed_at")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<JobSummary> {
    Ok(JobSummary {
        job: job_from_row(row)?,
        active_candidates: row.try_get("active_candidates")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, job: &Job) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (id, company_id, title, department, location, employment_type,
                          description, status, hiring_manager_id, recruiter_id, openings,
                          created_by, created_at, updated_at, closed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.company_id.to_string())
    .bind(&job.title)
    .bind(&job.department)
    .bind(&job.location)
    .bind(&job.employment_type)
    .bind(&job.description)
    .bind(job.status.as_str())
    .bind(opt_id(job.hiring_manager_id))
    .bind(opt_id(job.recruiter_id))
    .bind(job.openings)
    .bind(opt_id(job.created_by))
    .bind(time::to_db(&job.created_at))
    .bind(time::to_db(&job.updated_at))
    .bind(opt_ts(job.closed_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Full-row update of the mutable job fields
pub async fn update(conn: &mut SqliteConnection, job: &Job) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET title = ?, department = ?, location = ?, employment_type = ?,
               description = ?, status = ?, hiring_manager_id = ?, recruiter_id = ?,
               openings = ?, updated_at = ?, closed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&job.title)
    .bind(&job.department)
    .bind(&job.location)
    .bind(&job.employment_type)
    .bind(&job.description)
    .bind(job.status.as_str())
    .bind(opt_id(job.hiring_manager_id))
    .bind(opt_id(job.recruiter_id))
    .bind(job.openings)
    .bind(time::to_db(&job.updated_at))
    .bind(opt_ts(job.closed_at))
    .bind(job.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Option<Job>> {
    let sql = format!(
        "SELECT {} FROM jobs j WHERE j.id = ? AND j.company_id = ?",
        JOB_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(company_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Filters for job listings
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    /// Restrict to jobs assigned to this vendor
    pub vendor_id: Option<Uuid>,
}

fn filter_clause() -> &'static str {
    "j.company_id = ? AND (? IS NULL OR j.status = ?) \
     AND (? IS NULL OR EXISTS (SELECT 1 FROM vendor_job_assignments v \
                               WHERE v.job_id = j.id AND v.vendor_id = ?))"
}

pub async fn count(conn: &mut SqliteConnection, company_id: Uuid, filter: &JobFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM jobs j WHERE {}", filter_clause());
    let status = filter.status.map(|s| s.as_str());
    let vendor = opt_id(filter.vendor_id);
    let total: i64 = sqlx::query_scalar(&sql)
        .bind(company_id.to_string())
        .bind(status)
        .bind(status)
        .bind(&vendor)
        .bind(&vendor)
        .fetch_one(conn)
        .await?;
    Ok(total)
}

pub async fn list(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    filter: &JobFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobSummary>> {
    let sql = format!(
        "SELECT {}, {} FROM jobs j WHERE {} ORDER BY j.created_at DESC, j.id LIMIT ? OFFSET ?",
        JOB_COLUMNS,
        ACTIVE_COUNT,
        filter_clause()
    );
    let status = filter.status.map(|s| s.as_str());
    let vendor = opt_id(filter.vendor_id);
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(status)
        .bind(status)
        .bind(&vendor)
        .bind(&vendor)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
    rows.iter().map(summary_from_row).collect()
}

pub async fn active_candidate_count(conn: &mut SqliteConnection, job_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_candidates WHERE job_id = ? AND status = 'active'",
    )
    .bind(job_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn application_count(conn: &mut SqliteConnection, job_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_candidates WHERE job_id = ?")
        .bind(job_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM jobs WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
