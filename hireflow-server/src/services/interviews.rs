//! Interview scheduling, panel feedback and calendar sync

use super::applications::application_link;
use super::calendar;
use super::notifications::{self, NotificationDraft};
use super::{clean, required};
use crate::db;
use crate::db::interviews::{InterviewFilter, PanelConflict};
use crate::models::{
    ActivityType, Actor, ApplicationStatus, Feedback, Interview, InterviewDetail, InterviewStatus,
    InterviewType, Job, JobCandidate, PanelMember, Recommendation,
};
use crate::AppState;
use chrono::{DateTime, Duration, Utc};
use hireflow_common::auth::Permission;
use hireflow_common::events::AtsEvent;
use hireflow_common::{time, Error, Result};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

/// Longest interview that can be booked
pub const MAX_DURATION_HOURS: i64 = 8;

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub job_candidate_id: Uuid,
    pub title: String,
    pub interview_type: InterviewType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub notes: Option<String>,
    pub panel: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterviewUpdate {
    pub title: Option<String>,
    pub interview_type: Option<InterviewType>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub notes: Option<String>,
    pub panel: Option<Vec<Uuid>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i64,
    pub recommendation: Recommendation,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterviewQuery {
    pub job_candidate_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<InterviewStatus>,
}

pub(crate) fn validate_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at <= starts_at {
        return Err(Error::InvalidInput("ends_at must be after starts_at".to_string()));
    }
    if ends_at - starts_at > Duration::hours(MAX_DURATION_HOURS) {
        return Err(Error::InvalidInput(format!(
            "interviews cannot last longer than {} hours",
            MAX_DURATION_HOURS
        )));
    }
    Ok(())
}

fn dedupe_panel(panel: &[Uuid]) -> Result<Vec<Uuid>> {
    let mut out = Vec::with_capacity(panel.len());
    for id in panel {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    if out.is_empty() {
        return Err(Error::InvalidInput("at least one panel member is required".to_string()));
    }
    Ok(out)
}

pub(crate) fn describe_conflicts(conflicts: &[PanelConflict]) -> String {
    let parts: Vec<String> = conflicts
        .iter()
        .map(|c| {
            format!(
                "user {} has interview {} from {} to {}",
                c.user_id,
                c.interview_id,
                time::to_db(&c.starts_at),
                time::to_db(&c.ends_at)
            )
        })
        .collect();
    format!("panel scheduling conflict: {}", parts.join("; "))
}

/// Check every panel member is an active non-vendor user of the company
async fn validate_panel(conn: &mut SqliteConnection, company_id: Uuid, panel: &[Uuid]) -> Result<()> {
    for &user_id in panel {
        match db::users::get(&mut *conn, company_id, user_id).await? {
            Some(user) if user.is_active && !user.role.is_vendor() => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "panel member {} must be an active, non-vendor user of the company",
                    user_id
                )))
            }
        }
    }
    Ok(())
}

async fn ensure_no_conflicts(
    conn: &mut SqliteConnection,
    panel: &[Uuid],
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Result<()> {
    let conflicts = db::interviews::find_conflicts(conn, panel, starts_at, ends_at, exclude).await?;
    if !conflicts.is_empty() {
        return Err(Error::Conflict(describe_conflicts(&conflicts)));
    }
    Ok(())
}

async fn load_interview(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Interview> {
    db::interviews::get(conn, company_id, id)
        .await?
        .ok_or_else(|| Error::not_found("interview", id))
}

async fn load_context(conn: &mut SqliteConnection, company_id: Uuid, jc_id: Uuid) -> Result<(JobCandidate, Job)> {
    let jc = db::applications::get(&mut *conn, company_id, jc_id)
        .await?
        .ok_or_else(|| Error::not_found("job candidate", jc_id))?;
    let job = db::jobs::get(&mut *conn, company_id, jc.job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", jc.job_id))?;
    Ok((jc, job))
}

async fn load_detail(conn: &mut SqliteConnection, interview: Interview) -> Result<InterviewDetail> {
    let panel = db::interviews::list_panel(&mut *conn, interview.id).await?;
    let feedback = db::interviews::list_feedback(&mut *conn, interview.id).await?;
    Ok(InterviewDetail {
        interview,
        panel,
        feedback,
    })
}

fn others(panel: &[Uuid], actor: &Actor) -> Vec<Uuid> {
    panel.iter().copied().filter(|id| *id != actor.user_id).collect()
}

/// Push the interview to each panel member's calendar and record event ids
///
/// Runs after commit; failures are logged and never fail the request.
async fn sync_calendars(state: &AppState, interview: &Interview, panel: &[Uuid]) {
    for &user_id in panel {
        let Some((provider, event_id)) = calendar::push_interview(state, user_id, interview).await else {
            continue;
        };
        let recorded = async {
            let mut conn = state.db.acquire().await?;
            db::interviews::set_calendar_event(&mut conn, interview.id, user_id, Some(provider), Some(&event_id))
                .await
        }
        .await;
        if let Err(e) = recorded {
            warn!(
                interview_id = %interview.id,
                user_id = %user_id,
                event_id = %event_id,
                error = %e,
                "Failed to record calendar event"
            );
        }
    }
}

/// Remove previously pushed events for the given panel rows
async fn clear_calendars(state: &AppState, members: &[PanelMember]) {
    for member in members {
        if let (Some(provider), Some(event_id)) = (member.calendar_provider, member.calendar_event_id.as_deref()) {
            calendar::remove_event(state, member.user_id, provider, event_id).await;
        }
    }
}

pub async fn schedule(state: &AppState, actor: &Actor, req: ScheduleRequest) -> Result<InterviewDetail> {
    actor.require(Permission::ManageInterviews)?;

    let title = required(&req.title, "title")?;
    validate_window(req.starts_at, req.ends_at)?;
    let panel = dedupe_panel(&req.panel)?;

    let mut tx = state.db.begin().await?;
    let (jc, job) = load_context(&mut *tx, actor.company_id, req.job_candidate_id).await?;
    if jc.status != ApplicationStatus::Active {
        return Err(Error::InvalidInput(format!(
            "cannot schedule an interview for a {} application",
            jc.status
        )));
    }
    validate_panel(&mut *tx, actor.company_id, &panel).await?;
    ensure_no_conflicts(&mut *tx, &panel, req.starts_at, req.ends_at, None).await?;

    let now = time::now();
    let interview = Interview {
        id: Uuid::new_v4(),
        job_candidate_id: jc.id,
        title,
        interview_type: req.interview_type,
        status: InterviewStatus::Scheduled,
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        location: clean(req.location),
        meeting_url: clean(req.meeting_url),
        notes: clean(req.notes),
        cancel_reason: None,
        created_by: Some(actor.user_id),
        created_at: now,
        updated_at: now,
    };
    db::interviews::insert(&mut *tx, &interview).await?;
    for &user_id in &panel {
        db::interviews::add_panel_member(&mut *tx, interview.id, user_id).await?;
    }
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::InterviewScheduled,
        Some(actor.user_id),
        &format!("{} scheduled for {}", interview.title, time::to_db(&interview.starts_at)),
        json!({ "interview_id": interview.id, "panel": panel }),
    )
    .await?;

    let draft = NotificationDraft::new(
        "interview_scheduled",
        format!("Interview scheduled: {}", interview.title),
        format!("{} on {}", job.title, time::to_db(&interview.starts_at)),
    )
    .with_link(application_link(job.id, jc.id));
    let created = notifications::create(&mut *tx, actor.company_id, &others(&panel, actor), &draft).await?;
    tx.commit().await?;

    state.event_bus.emit(AtsEvent::InterviewScheduled {
        company_id: actor.company_id,
        interview_id: interview.id,
        job_candidate_id: jc.id,
        starts_at: interview.starts_at,
        timestamp: now,
    });
    notifications::publish(&state.event_bus, &created);
    sync_calendars(state, &interview, &panel).await;

    info!(interview_id = %interview.id, job_candidate_id = %jc.id, panel = panel.len(), "Interview scheduled");
    let mut conn = state.db.acquire().await?;
    load_detail(&mut conn, interview).await
}

/// Change times, details or panel of a scheduled interview
pub async fn reschedule(state: &AppState, actor: &Actor, id: Uuid, update: InterviewUpdate) -> Result<InterviewDetail> {
    actor.require(Permission::ManageInterviews)?;

    let mut tx = state.db.begin().await?;
    let mut interview = load_interview(&mut *tx, actor.company_id, id).await?;
    if interview.status != InterviewStatus::Scheduled {
        return Err(Error::InvalidInput(format!(
            "only scheduled interviews can be changed (status is {})",
            interview.status
        )));
    }
    let (jc, job) = load_context(&mut *tx, actor.company_id, interview.job_candidate_id).await?;
    let old_panel = db::interviews::list_panel(&mut *tx, id).await?;

    if let Some(title) = update.title {
        interview.title = required(&title, "title")?;
    }
    if let Some(kind) = update.interview_type {
        interview.interview_type = kind;
    }
    let previous_start = interview.starts_at;
    interview.starts_at = update.starts_at.unwrap_or(interview.starts_at);
    interview.ends_at = update.ends_at.unwrap_or(interview.ends_at);
    validate_window(interview.starts_at, interview.ends_at)?;
    if update.location.is_some() {
        interview.location = clean(update.location);
    }
    if update.meeting_url.is_some() {
        interview.meeting_url = clean(update.meeting_url);
    }
    if update.notes.is_some() {
        interview.notes = clean(update.notes);
    }

    let panel = match update.panel {
        Some(ids) => {
            let ids = dedupe_panel(&ids)?;
            validate_panel(&mut *tx, actor.company_id, &ids).await?;
            ids
        }
        None => old_panel.iter().map(|m| m.user_id).collect(),
    };
    ensure_no_conflicts(&mut *tx, &panel, interview.starts_at, interview.ends_at, Some(id)).await?;

    let now = time::now();
    interview.updated_at = now;
    db::interviews::update(&mut *tx, &interview).await?;
    for member in &old_panel {
        db::interviews::remove_panel_member(&mut *tx, id, member.user_id).await?;
    }
    for &user_id in &panel {
        db::interviews::add_panel_member(&mut *tx, id, user_id).await?;
    }
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::InterviewRescheduled,
        Some(actor.user_id),
        &format!("{} moved to {}", interview.title, time::to_db(&interview.starts_at)),
        json!({
            "interview_id": interview.id,
            "previous_starts_at": previous_start,
            "starts_at": interview.starts_at,
            "ends_at": interview.ends_at,
        }),
    )
    .await?;

    let draft = NotificationDraft::new(
        "interview_rescheduled",
        format!("Interview updated: {}", interview.title),
        format!("{} now on {}", job.title, time::to_db(&interview.starts_at)),
    )
    .with_link(application_link(job.id, jc.id));
    let created = notifications::create(&mut *tx, actor.company_id, &others(&panel, actor), &draft).await?;
    tx.commit().await?;

    notifications::publish(&state.event_bus, &created);
    clear_calendars(state, &old_panel).await;
    sync_calendars(state, &interview, &panel).await;

    info!(interview_id = %interview.id, "Interview rescheduled");
    let mut conn = state.db.acquire().await?;
    load_detail(&mut conn, interview).await
}

pub async fn cancel(state: &AppState, actor: &Actor, id: Uuid, req: CancelRequest) -> Result<InterviewDetail> {
    actor.require(Permission::ManageInterviews)?;

    let mut tx = state.db.begin().await?;
    let mut interview = load_interview(&mut *tx, actor.company_id, id).await?;
    if interview.status != InterviewStatus::Scheduled {
        return Err(Error::InvalidInput(format!(
            "only scheduled interviews can be cancelled (status is {})",
            interview.status
        )));
    }
    let (jc, job) = load_context(&mut *tx, actor.company_id, interview.job_candidate_id).await?;
    let panel = db::interviews::list_panel(&mut *tx, id).await?;

    let now = time::now();
    interview.status = InterviewStatus::Cancelled;
    interview.cancel_reason = clean(req.reason);
    interview.updated_at = now;
    db::interviews::update(&mut *tx, &interview).await?;

    let description = match &interview.cancel_reason {
        Some(reason) => format!("{} cancelled: {}", interview.title, reason),
        None => format!("{} cancelled", interview.title),
    };
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::InterviewCancelled,
        Some(actor.user_id),
        &description,
        json!({ "interview_id": interview.id, "reason": interview.cancel_reason }),
    )
    .await?;

    let member_ids: Vec<Uuid> = panel.iter().map(|m| m.user_id).collect();
    let draft = NotificationDraft::new(
        "interview_cancelled",
        format!("Interview cancelled: {}", interview.title),
        job.title.clone(),
    )
    .with_link(application_link(job.id, jc.id));
    let created = notifications::create(&mut *tx, actor.company_id, &others(&member_ids, actor), &draft).await?;
    for member in &panel {
        db::interviews::set_calendar_event(&mut *tx, id, member.user_id, None, None).await?;
    }
    tx.commit().await?;

    state.event_bus.emit(AtsEvent::InterviewCancelled {
        company_id: actor.company_id,
        interview_id: interview.id,
        job_candidate_id: jc.id,
        timestamp: now,
    });
    notifications::publish(&state.event_bus, &created);
    clear_calendars(state, &panel).await;

    info!(interview_id = %interview.id, "Interview cancelled");
    let mut conn = state.db.acquire().await?;
    load_detail(&mut conn, interview).await
}

pub async fn complete(state: &AppState, actor: &Actor, id: Uuid) -> Result<InterviewDetail> {
    actor.require(Permission::ManageInterviews)?;

    let mut tx = state.db.begin().await?;
    let mut interview = load_interview(&mut *tx, actor.company_id, id).await?;
    if interview.status != InterviewStatus::Scheduled {
        return Err(Error::InvalidInput(format!(
            "only scheduled interviews can be completed (status is {})",
            interview.status
        )));
    }

    interview.status = InterviewStatus::Completed;
    interview.updated_at = time::now();
    db::interviews::update(&mut *tx, &interview).await?;
    db::applications::record_activity(
        &mut *tx,
        interview.job_candidate_id,
        ActivityType::InterviewCompleted,
        Some(actor.user_id),
        &format!("{} completed", interview.title),
        json!({ "interview_id": interview.id }),
    )
    .await?;
    let detail = load_detail(&mut *tx, interview).await?;
    tx.commit().await?;

    Ok(detail)
}

/// Record or replace the caller's feedback as a panel member
pub async fn submit_feedback(state: &AppState, actor: &Actor, id: Uuid, req: FeedbackRequest) -> Result<Feedback> {
    if !(1..=5).contains(&req.rating) {
        return Err(Error::InvalidInput("rating must be between 1 and 5".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let interview = load_interview(&mut *tx, actor.company_id, id).await?;
    if !db::interviews::is_panel_member(&mut *tx, id, actor.user_id).await? {
        return Err(Error::Forbidden("only panel members can submit feedback".to_string()));
    }
    if interview.status == InterviewStatus::Cancelled {
        return Err(Error::InvalidInput("feedback cannot be submitted for a cancelled interview".to_string()));
    }
    let (jc, job) = load_context(&mut *tx, actor.company_id, interview.job_candidate_id).await?;

    let feedback = db::interviews::upsert_feedback(
        &mut *tx,
        &Feedback {
            id: Uuid::new_v4(),
            interview_id: id,
            user_id: actor.user_id,
            rating: req.rating,
            recommendation: req.recommendation,
            notes: clean(req.notes),
            submitted_at: time::now(),
        },
    )
    .await?;
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::FeedbackSubmitted,
        Some(actor.user_id),
        &format!("Feedback on {}: {} ({}/5)", interview.title, feedback.recommendation, feedback.rating),
        json!({ "interview_id": id, "rating": feedback.rating, "recommendation": feedback.recommendation }),
    )
    .await?;

    let recipients: Vec<Uuid> = job
        .hiring_manager_id
        .filter(|hm| *hm != actor.user_id)
        .into_iter()
        .collect();
    let draft = NotificationDraft::new(
        "feedback_submitted",
        format!("Feedback submitted for {}", interview.title),
        format!("{}: {} ({}/5)", job.title, feedback.recommendation, feedback.rating),
    )
    .with_link(application_link(job.id, jc.id));
    let created = notifications::create(&mut *tx, actor.company_id, &recipients, &draft).await?;
    tx.commit().await?;

    notifications::publish(&state.event_bus, &created);
    Ok(feedback)
}

pub async fn list(state: &AppState, actor: &Actor, query: InterviewQuery) -> Result<Vec<Interview>> {
    actor.require(Permission::ManageInterviews)?;
    let filter = InterviewFilter {
        job_candidate_id: query.job_candidate_id,
        user_id: query.user_id,
        from: query.from,
        to: query.to,
        status: query.status,
    };
    let mut conn = state.db.acquire().await?;
    db::interviews::list(&mut conn, actor.company_id, &filter).await
}

pub async fn get(state: &AppState, actor: &Actor, id: Uuid) -> Result<InterviewDetail> {
    actor.require(Permission::ManageInterviews)?;
    let mut conn = state.db.acquire().await?;
    let interview = load_interview(&mut conn, actor.company_id, id).await?;
    load_detail(&mut conn, interview).await
}

pub async fn list_feedback(state: &AppState, actor: &Actor, id: Uuid) -> Result<Vec<Feedback>> {
    actor.require(Permission::ManageInterviews)?;
    let mut conn = state.db.acquire().await?;
    load_interview(&mut conn, actor.company_id, id).await?;
    db::interviews::list_feedback(&mut conn, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_validation() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert!(validate_window(start, start + Duration::hours(1)).is_ok());
        assert!(validate_window(start, start + Duration::hours(8)).is_ok());
        assert!(validate_window(start, start).is_err());
        assert!(validate_window(start, start - Duration::minutes(1)).is_err());
        assert!(validate_window(start, start + Duration::hours(8) + Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_panel_dedupe() {
        let a = Uuid::new_v4();
        assert_eq!(dedupe_panel(&[a, a]).unwrap(), vec![a]);
        assert!(dedupe_panel(&[]).is_err());
    }

    #[test]
    fn test_conflict_description_names_users() {
        let user = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let text = describe_conflicts(&[PanelConflict {
            user_id: user,
            interview_id: Uuid::new_v4(),
            starts_at: start,
            ends_at: start + Duration::hours(1),
        }]);
        assert!(text.contains(&user.to_string()));
        assert!(text.contains("2024-03-04T09:00:00.000Z"));
    }
}
