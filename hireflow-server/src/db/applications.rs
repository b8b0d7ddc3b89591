//! Job candidate (application) rows with their activity and stage history

use super::{get_enum, get_opt_time, get_opt_uuid, get_time, get_uuid, opt_id, opt_ts};
use crate::models::{
    Activity, ActivityType, ApplicationStatus, JobCandidate, JobCandidateView, StageHistoryEntry,
};
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const APPLICATION_COLUMNS: &str = "jc.id AS id, jc.job_id AS job_id, \
     jc.candidate_id AS candidate_id, jc.current_stage_id AS current_stage_id, \
     jc.status AS status, jc.score AS score, \
     jc.submitted_by_vendor_id AS submitted_by_vendor_id, jc.applied_at AS applied_at, \
     jc.stage_entered_at AS stage_entered_at, jc.hired_at AS hired_at, \
     jc.rejected_at AS rejected_at";

fn application_from_row(row: &SqliteRow) -> Result<JobCandidate> {
    Ok(JobCandidate {
        id: get_uuid(row, "id")?,
        job_id: get_uuid(row, "job_id")?,
        candidate_id: get_uuid(row, "candidate_id")?,
        current_stage_id: get_uuid(row, "current_stage_id")?,
        status: get_enum(row, "status")?,
        score: row.try_get("score")?,
        submitted_by_vendor_id: get_opt_uuid(row, "submitted_by_vendor_id")?,
        applied_at: get_time(row, "applied_at")?,
        stage_entered_at: get_time(row, "stage_entered_at")?,
        hired_at: get_opt_time(row, "hired_at")?,
        rejected_at: get_opt_time(row, "rejected_at")?,
    })
}

fn view_from_row(row: &SqliteRow) -> Result<JobCandidateView> {
    let first: String = row.try_get("first_name")?;
    let last: String = row.try_get("last_name")?;
    Ok(JobCandidateView {
        application: application_from_row(row)?,
        candidate_name: format!("{} {}", first, last),
        candidate_email: row.try_get("email")?,
        stage_name: row.try_get("stage_name")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, jc: &JobCandidate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO job_candidates (id, job_id, candidate_id, current_stage_id, status, score,
                                    submitted_by_vendor_id, applied_at, stage_entered_at,
                                    hired_at, rejected_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(jc.id.to_string())
    .bind(jc.job_id.to_string())
    .bind(jc.candidate_id.to_string())
    .bind(jc.current_stage_id.to_string())
    .bind(jc.status.as_str())
    .bind(jc.score)
    .bind(opt_id(jc.submitted_by_vendor_id))
    .bind(time::to_db(&jc.applied_at))
    .bind(time::to_db(&jc.stage_entered_at))
    .bind(opt_ts(jc.hired_at))
    .bind(opt_ts(jc.rejected_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Lookup scoped to a company through the owning job
pub async fn get(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Option<JobCandidate>> {
    let sql = format!(
        "SELECT {} FROM job_candidates jc JOIN jobs j ON j.id = jc.job_id \
         WHERE jc.id = ? AND j.company_id = ?",
        APPLICATION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(company_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(application_from_row).transpose()
}

pub async fn find(
    conn: &mut SqliteConnection,
    job_id: Uuid,
    candidate_id: Uuid,
) -> Result<Option<JobCandidate>> {
    let sql = format!(
        "SELECT {} FROM job_candidates jc WHERE jc.job_id = ? AND jc.candidate_id = ?",
        APPLICATION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(job_id.to_string())
        .bind(candidate_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(application_from_row).transpose()
}

pub async fn list_for_candidate(conn: &mut SqliteConnection, candidate_id: Uuid) -> Result<Vec<JobCandidate>> {
    let sql = format!(
        "SELECT {} FROM job_candidates jc WHERE jc.candidate_id = ? ORDER BY jc.applied_at",
        APPLICATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(candidate_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(application_from_row).collect()
}

/// Board filters for one job
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub stage_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    pub submitted_by_vendor: Option<Uuid>,
}

pub async fn list_for_job(
    conn: &mut SqliteConnection,
    job_id: Uuid,
    filter: &ApplicationFilter,
) -> Result<Vec<JobCandidateView>> {
    let sql = format!(
        "SELECT {}, c.first_name AS first_name, c.last_name AS last_name, c.email AS email, \
                s.name AS stage_name \
         FROM job_candidates jc \
         JOIN candidates c ON c.id = jc.candidate_id \
         JOIN pipeline_stages s ON s.id = jc.current_stage_id \
         WHERE jc.job_id = ? \
           AND (? IS NULL OR jc.current_stage_id = ?) \
           AND (? IS NULL OR jc.status = ?) \
           AND (? IS NULL OR jc.submitted_by_vendor_id = ?) \
         ORDER BY jc.applied_at, jc.id",
        APPLICATION_COLUMNS
    );
    let stage = opt_id(filter.stage_id);
    let status = filter.status.map(|s| s.as_str());
    let vendor = opt_id(filter.submitted_by_vendor);
    let rows = sqlx::query(&sql)
        .bind(job_id.to_string())
        .bind(&stage)
        .bind(&stage)
        .bind(status)
        .bind(status)
        .bind(&vendor)
        .bind(&vendor)
        .fetch_all(conn)
        .await?;
    rows.iter().map(view_from_row).collect()
}

/// Ids of applications currently in `stage_id`
pub async fn ids_in_stage(conn: &mut SqliteConnection, stage_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM job_candidates WHERE current_stage_id = ?")
        .bind(stage_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(|r| get_uuid(r, "id")).collect()
}

pub async fn set_stage(
    conn: &mut SqliteConnection,
    id: Uuid,
    stage_id: Uuid,
    entered_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE job_candidates SET current_stage_id = ?, stage_entered_at = ? WHERE id = ?")
        .bind(stage_id.to_string())
        .bind(time::to_db(&entered_at))
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_status(conn: &mut SqliteConnection, jc: &JobCandidate) -> Result<()> {
    sqlx::query("UPDATE job_candidates SET status = ?, hired_at = ?, rejected_at = ? WHERE id = ?")
        .bind(jc.status.as_str())
        .bind(opt_ts(jc.hired_at))
        .bind(opt_ts(jc.rejected_at))
        .bind(jc.id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_score(conn: &mut SqliteConnection, id: Uuid, score: i64) -> Result<()> {
    sqlx::query("UPDATE job_candidates SET score = ? WHERE id = ?")
        .bind(score)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    let metadata: String = row.try_get("metadata")?;
    Ok(Activity {
        id: get_uuid(row, "id")?,
        job_candidate_id: get_uuid(row, "job_candidate_id")?,
        activity_type: get_enum(row, "activity_type")?,
        actor_id: get_opt_uuid(row, "actor_id")?,
        description: row.try_get("description")?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: get_time(row, "created_at")?,
    })
}

/// Append an activity to an application's timeline
pub async fn record_activity(
    conn: &mut SqliteConnection,
    job_candidate_id: Uuid,
    activity_type: ActivityType,
    actor_id: Option<Uuid>,
    description: &str,
    metadata: serde_json::Value,
) -> Result<Activity> {
    let activity = Activity {
        id: Uuid::new_v4(),
        job_candidate_id,
        activity_type,
        actor_id,
        description: description.to_string(),
        metadata,
        created_at: time::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO candidate_activities (id, job_candidate_id, activity_type, actor_id,
                                          description, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(activity.id.to_string())
    .bind(activity.job_candidate_id.to_string())
    .bind(activity.activity_type.as_str())
    .bind(opt_id(activity.actor_id))
    .bind(&activity.description)
    .bind(activity.metadata.to_string())
    .bind(time::to_db(&activity.created_at))
    .execute(conn)
    .await?;

    Ok(activity)
}

/// Timeline, newest first
pub async fn list_activities(conn: &mut SqliteConnection, job_candidate_id: Uuid) -> Result<Vec<Activity>> {
    let rows = sqlx::query(
        "SELECT id, job_candidate_id, activity_type, actor_id, description, metadata, created_at \
         FROM candidate_activities WHERE job_candidate_id = ? \
         ORDER BY created_at DESC, rowid DESC",
    )
    .bind(job_candidate_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(activity_from_row).collect()
}

// ---------------------------------------------------------------------------
// Stage history
// ---------------------------------------------------------------------------

fn history_from_row(row: &SqliteRow) -> Result<StageHistoryEntry> {
    Ok(StageHistoryEntry {
        id: get_uuid(row, "id")?,
        job_candidate_id: get_uuid(row, "job_candidate_id")?,
        from_stage_id: get_opt_uuid(row, "from_stage_id")?,
        to_stage_id: get_uuid(row, "to_stage_id")?,
        moved_by: get_opt_uuid(row, "moved_by")?,
        moved_at: get_time(row, "moved_at")?,
    })
}

pub async fn record_stage_history(
    conn: &mut SqliteConnection,
    job_candidate_id: Uuid,
    from_stage_id: Option<Uuid>,
    to_stage_id: Uuid,
    moved_by: Option<Uuid>,
    moved_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO stage_history (id, job_candidate_id, from_stage_id, to_stage_id, moved_by, moved_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(job_candidate_id.to_string())
    .bind(opt_id(from_stage_id))
    .bind(to_stage_id.to_string())
    .bind(opt_id(moved_by))
    .bind(time::to_db(&moved_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// History, oldest first
pub async fn list_stage_history(
    conn: &mut SqliteConnection,
    job_candidate_id: Uuid,
) -> Result<Vec<StageHistoryEntry>> {
    let rows = sqlx::query(
        "SELECT id, job_candidate_id, from_stage_id, to_stage_id, moved_by, moved_at \
         FROM stage_history WHERE job_candidate_id = ? ORDER BY moved_at, rowid",
    )
    .bind(job_candidate_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(history_from_row).collect()
}
