//! Interview, panel and feedback rows

use super::{get_enum, get_opt_uuid, get_time, get_uuid, opt_id};
use crate::models::{
    CalendarProviderKind, Feedback, Interview, InterviewStatus, PanelMember, Recommendation,
};
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const INTERVIEW_COLUMNS: &str = "i.id AS id, i.job_candidate_id AS job_candidate_id, \
     i.title AS title, i.interview_type AS interview_type, i.status AS status, \
     i.starts_at AS starts_at, i.ends_at AS ends_at, i.location AS location, \
     i.meeting_url AS meeting_url, i.notes AS notes, i.cancel_reason AS cancel_reason, \
     i.created_by AS created_by, i.created_at AS created_at, i.updated_at AS updated_at";

fn interview_from_row(row: &SqliteRow) -> Result<Interview> {
    Ok(Interview {
        id: get_uuid(row, "id")?,
        job_candidate_id: get_uuid(row, "job_candidate_id")?,
        title: row.try_get("title")?,
        interview_type: get_enum(row, "interview_type")?,
        status: get_enum(row, "status")?,
        starts_at: get_time(row, "starts_at")?,
        ends_at: get_time(row, "ends_at")?,
        location: row.try_get("location")?,
        meeting_url: row.try_get("meeting_url")?,
        notes: row.try_get("notes")?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_by: get_opt_uuid(row, "created_by")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, i: &Interview) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO interviews (id, job_candidate_id, title, interview_type, status, starts_at,
                                ends_at, location, meeting_url, notes, cancel_reason, created_by,
                                created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(i.id.to_string())
    .bind(i.job_candidate_id.to_string())
    .bind(&i.title)
    .bind(i.interview_type.as_str())
    .bind(i.status.as_str())
    .bind(time::to_db(&i.starts_at))
    .bind(time::to_db(&i.ends_at))
    .bind(&i.location)
    .bind(&i.meeting_url)
    .bind(&i.notes)
    .bind(&i.cancel_reason)
    .bind(opt_id(i.created_by))
    .bind(time::to_db(&i.created_at))
    .bind(time::to_db(&i.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, i: &Interview) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE interviews SET title = ?, interview_type = ?, status = ?, starts_at = ?,
               ends_at = ?, location = ?, meeting_url = ?, notes = ?, cancel_reason = ?,
               updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&i.title)
    .bind(i.interview_type.as_str())
    .bind(i.status.as_str())
    .bind(time::to_db(&i.starts_at))
    .bind(time::to_db(&i.ends_at))
    .bind(&i.location)
    .bind(&i.meeting_url)
    .bind(&i.notes)
    .bind(&i.cancel_reason)
    .bind(time::to_db(&i.updated_at))
    .bind(i.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Lookup scoped to a company through application and job
pub async fn get(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Option<Interview>> {
    let sql = format!(
        "SELECT {} FROM interviews i \
         JOIN job_candidates jc ON jc.id = i.job_candidate_id \
         JOIN jobs j ON j.id = jc.job_id \
         WHERE i.id = ? AND j.company_id = ?",
        INTERVIEW_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(company_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(interview_from_row).transpose()
}

/// Listing filters; all optional and combined with AND
#[derive(Debug, Clone, Default)]
pub struct InterviewFilter {
    pub job_candidate_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<InterviewStatus>,
}

pub async fn list(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    filter: &InterviewFilter,
) -> Result<Vec<Interview>> {
    let sql = format!(
        "SELECT {} FROM interviews i \
         JOIN job_candidates jc ON jc.id = i.job_candidate_id \
         JOIN jobs j ON j.id = jc.job_id \
         WHERE j.company_id = ? \
           AND (? IS NULL OR i.job_candidate_id = ?) \
           AND (? IS NULL OR EXISTS (SELECT 1 FROM interview_panel_members p \
                                     WHERE p.interview_id = i.id AND p.user_id = ?)) \
           AND (? IS NULL OR i.ends_at > ?) \
           AND (? IS NULL OR i.starts_at < ?) \
           AND (? IS NULL OR i.status = ?) \
         ORDER BY i.starts_at, i.id",
        INTERVIEW_COLUMNS
    );
    let jc = opt_id(filter.job_candidate_id);
    let user = opt_id(filter.user_id);
    let from = filter.from.as_ref().map(time::to_db);
    let to = filter.to.as_ref().map(time::to_db);
    let status = filter.status.map(|s| s.as_str());
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(&jc)
        .bind(&jc)
        .bind(&user)
        .bind(&user)
        .bind(&from)
        .bind(&from)
        .bind(&to)
        .bind(&to)
        .bind(status)
        .bind(status)
        .fetch_all(conn)
        .await?;
    rows.iter().map(interview_from_row).collect()
}

/// A scheduled interview of `user_id` overlapping `[starts_at, ends_at)`
#[derive(Debug, Clone)]
pub struct PanelConflict {
    pub user_id: Uuid,
    pub interview_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Scheduled interviews of the given users overlapping the window
///
/// Overlap is half-open: `a.start < b.end && b.start < a.end`, so
/// back-to-back interviews do not conflict.
pub async fn find_conflicts(
    conn: &mut SqliteConnection,
    user_ids: &[Uuid],
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    exclude_interview: Option<Uuid>,
) -> Result<Vec<PanelConflict>> {
    let mut conflicts = Vec::new();
    let start = time::to_db(&starts_at);
    let end = time::to_db(&ends_at);
    let exclude = opt_id(exclude_interview);

    for user_id in user_ids {
        let rows = sqlx::query(
            "SELECT i.id AS id, i.starts_at AS starts_at, i.ends_at AS ends_at \
             FROM interviews i JOIN interview_panel_members p ON p.interview_id = i.id \
             WHERE p.user_id = ? AND i.status = 'scheduled' \
               AND i.starts_at < ? AND ? < i.ends_at \
               AND (? IS NULL OR i.id != ?) \
             ORDER BY i.starts_at",
        )
        .bind(user_id.to_string())
        .bind(&end)
        .bind(&start)
        .bind(&exclude)
        .bind(&exclude)
        .fetch_all(&mut *conn)
        .await?;

        for row in &rows {
            conflicts.push(PanelConflict {
                user_id: *user_id,
                interview_id: get_uuid(row, "id")?,
                starts_at: get_time(row, "starts_at")?,
                ends_at: get_time(row, "ends_at")?,
            });
        }
    }

    Ok(conflicts)
}

/// Scheduled interview windows of one user intersecting `[from, to)`
pub async fn busy_windows(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let rows = sqlx::query(
        "SELECT i.starts_at AS starts_at, i.ends_at AS ends_at \
         FROM interviews i JOIN interview_panel_members p ON p.interview_id = i.id \
         WHERE p.user_id = ? AND i.status = 'scheduled' AND i.starts_at < ? AND ? < i.ends_at",
    )
    .bind(user_id.to_string())
    .bind(time::to_db(&to))
    .bind(time::to_db(&from))
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((get_time(r, "starts_at")?, get_time(r, "ends_at")?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

fn panel_from_row(row: &SqliteRow) -> Result<PanelMember> {
    let provider: Option<String> = row.try_get("calendar_provider")?;
    Ok(PanelMember {
        interview_id: get_uuid(row, "interview_id")?,
        user_id: get_uuid(row, "user_id")?,
        calendar_provider: provider
            .map(|p| p.parse::<CalendarProviderKind>())
            .transpose()?,
        calendar_event_id: row.try_get("calendar_event_id")?,
    })
}

pub async fn list_panel(conn: &mut SqliteConnection, interview_id: Uuid) -> Result<Vec<PanelMember>> {
    let rows = sqlx::query(
        "SELECT interview_id, user_id, calendar_provider, calendar_event_id \
         FROM interview_panel_members WHERE interview_id = ? ORDER BY user_id",
    )
    .bind(interview_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(panel_from_row).collect()
}

pub async fn add_panel_member(conn: &mut SqliteConnection, interview_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO interview_panel_members (interview_id, user_id) VALUES (?, ?)",
    )
    .bind(interview_id.to_string())
    .bind(user_id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn remove_panel_member(conn: &mut SqliteConnection, interview_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM interview_panel_members WHERE interview_id = ? AND user_id = ?")
        .bind(interview_id.to_string())
        .bind(user_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_calendar_event(
    conn: &mut SqliteConnection,
    interview_id: Uuid,
    user_id: Uuid,
    provider: Option<CalendarProviderKind>,
    event_id: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE interview_panel_members SET calendar_provider = ?, calendar_event_id = ? \
         WHERE interview_id = ? AND user_id = ?",
    )
    .bind(provider.map(|p| p.as_str()))
    .bind(event_id)
    .bind(interview_id.to_string())
    .bind(user_id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn is_panel_member(conn: &mut SqliteConnection, interview_id: Uuid, user_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM interview_panel_members WHERE interview_id = ? AND user_id = ?)",
    )
    .bind(interview_id.to_string())
    .bind(user_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

fn feedback_from_row(row: &SqliteRow) -> Result<Feedback> {
    Ok(Feedback {
        id: get_uuid(row, "id")?,
        interview_id: get_uuid(row, "interview_id")?,
        user_id: get_uuid(row, "user_id")?,
        rating: row.try_get("rating")?,
        recommendation: get_enum::<Recommendation>(row, "recommendation")?,
        notes: row.try_get("notes")?,
        submitted_at: get_time(row, "submitted_at")?,
    })
}

/// Insert or replace the caller's feedback, returning the stored row
pub async fn upsert_feedback(conn: &mut SqliteConnection, feedback: &Feedback) -> Result<Feedback> {
    sqlx::query(
        r#"
        INSERT INTO interview_feedback (id, interview_id, user_id, rating, recommendation,
                                        notes, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(interview_id, user_id) DO UPDATE SET
            rating = excluded.rating,
            recommendation = excluded.recommendation,
            notes = excluded.notes,
            submitted_at = excluded.submitted_at
        "#,
    )
    .bind(feedback.id.to_string())
    .bind(feedback.interview_id.to_string())
    .bind(feedback.user_id.to_string())
    .bind(feedback.rating)
    .bind(feedback.recommendation.as_str())
    .bind(&feedback.notes)
    .bind(time::to_db(&feedback.submitted_at))
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        "SELECT id, interview_id, user_id, rating, recommendation, notes, submitted_at \
         FROM interview_feedback WHERE interview_id = ? AND user_id = ?",
    )
    .bind(feedback.interview_id.to_string())
    .bind(feedback.user_id.to_string())
    .fetch_one(conn)
    .await?;
    feedback_from_row(&row)
}

pub async fn list_feedback(conn: &mut SqliteConnection, interview_id: Uuid) -> Result<Vec<Feedback>> {
    let rows = sqlx::query(
        "SELECT id, interview_id, user_id, rating, recommendation, notes, submitted_at \
         FROM interview_feedback WHERE interview_id = ? ORDER BY submitted_at",
    )
    .bind(interview_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(feedback_from_row).collect()
}

/// Scheduled interviews starting inside `[from, to)` for a company
pub async fn count_upcoming(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM interviews i \
         JOIN job_candidates jc ON jc.id = i.job_candidate_id \
         JOIN jobs j ON j.id = jc.job_id \
         WHERE j.company_id = ? AND i.status = 'scheduled' AND i.starts_at >= ? AND i.starts_at < ?",
    )
    .bind(company_id.to_string())
    .bind(time::to_db(&from))
    .bind(time::to_db(&to))
    .fetch_one(conn)
    .await?;
    Ok(count)
}
