//! Applications: a candidate's progress through one job's pipeline

use super::notifications::{self, NotificationDraft};
use super::{required, visible_job};
use crate::db;
use crate::db::applications::ApplicationFilter;
use crate::models::{
    Activity, ActivityType, Actor, ApplicationStatus, Candidate, Job, JobCandidate, JobCandidateView,
    PipelineStage, StageHistoryEntry,
};
use crate::AppState;
use chrono::{DateTime, Utc};
use hireflow_common::auth::Permission;
use hireflow_common::events::AtsEvent;
use hireflow_common::{time, Error, Result};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub stage_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub reason: Option<String>,
}

/// Hiring manager and recruiter of a job, minus `exclude`
pub(crate) fn job_watchers(job: &Job, exclude: Option<Uuid>) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(2);
    for id in [job.hiring_manager_id, job.recruiter_id].into_iter().flatten() {
        if Some(id) != exclude && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

pub(crate) fn application_link(job_id: Uuid, job_candidate_id: Uuid) -> String {
    format!("/jobs/{}/candidates/{}", job_id, job_candidate_id)
}

/// Create an application at `stage` with its first history row and activity
pub(crate) async fn create_application(
    conn: &mut SqliteConnection,
    job: &Job,
    candidate: &Candidate,
    stage: &PipelineStage,
    submitted_by_vendor_id: Option<Uuid>,
    actor_id: Option<Uuid>,
) -> Result<JobCandidate> {
    if db::applications::find(&mut *conn, job.id, candidate.id).await?.is_some() {
        return Err(Error::Conflict(format!(
            "{} has already applied to '{}'",
            candidate.email, job.title
        )));
    }

    let now = time::now();
    let jc = JobCandidate {
        id: Uuid::new_v4(),
        job_id: job.id,
        candidate_id: candidate.id,
        current_stage_id: stage.id,
        status: ApplicationStatus::Active,
        score: None,
        submitted_by_vendor_id,
        applied_at: now,
        stage_entered_at: now,
        hired_at: None,
        rejected_at: None,
    };

    db::applications::insert(&mut *conn, &jc).await?;
    db::applications::record_stage_history(&mut *conn, jc.id, None, stage.id, actor_id, now).await?;
    db::applications::record_activity(
        &mut *conn,
        jc.id,
        ActivityType::CandidateAdded,
        actor_id,
        &format!("{} added to {} in stage {}", candidate.full_name(), job.title, stage.name),
        json!({ "stage_id": stage.id, "vendor_id": submitted_by_vendor_id }),
    )
    .await?;

    Ok(jc)
}

/// Move an application between two stages of its job
///
/// Writes the stage history row and the `stage_change` activity. The
/// returned event must be emitted after commit.
pub(crate) async fn move_application(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    jc: &JobCandidate,
    from: &PipelineStage,
    to: &PipelineStage,
    moved_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<AtsEvent> {
    db::applications::set_stage(&mut *conn, jc.id, to.id, now).await?;
    db::applications::record_stage_history(&mut *conn, jc.id, Some(from.id), to.id, moved_by, now).await?;
    db::applications::record_activity(
        &mut *conn,
        jc.id,
        ActivityType::StageChange,
        moved_by,
        &format!("Moved from {} to {}", from.name, to.name),
        json!({
            "from_stage_id": from.id,
            "to_stage_id": to.id,
            "from_stage": from.name,
            "to_stage": to.name,
        }),
    )
    .await?;

    Ok(AtsEvent::CandidateStageChanged {
        company_id,
        job_id: jc.job_id,
        job_candidate_id: jc.id,
        from_stage_id: Some(from.id),
        to_stage_id: to.id,
        moved_by,
        timestamp: now,
    })
}

/// Load an application the caller may see, with its job
///
/// Vendors only see applications they submitted to jobs still visible to
/// them.
pub(crate) async fn load_visible(
    conn: &mut SqliteConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(JobCandidate, Job)> {
    let jc = db::applications::get(&mut *conn, actor.company_id, id)
        .await?
        .ok_or_else(|| Error::not_found("job candidate", id))?;

    if actor.is_vendor() && jc.submitted_by_vendor_id != Some(actor.user_id) {
        return Err(Error::not_found("job candidate", id));
    }
    let job = visible_job(&mut *conn, actor, jc.job_id)
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => Error::not_found("job candidate", id),
            other => other,
        })?;

    Ok((jc, job))
}

pub async fn list_for_job(
    state: &AppState,
    actor: &Actor,
    job_id: Uuid,
    query: ApplicationQuery,
) -> Result<Vec<JobCandidateView>> {
    actor.require(Permission::ViewJobs)?;

    let mut conn = state.db.acquire().await?;
    visible_job(&mut conn, actor, job_id).await?;

    let filter = ApplicationFilter {
        stage_id: query.stage_id,
        status: query.status,
        submitted_by_vendor: actor.is_vendor().then_some(actor.user_id),
    };
    db::applications::list_for_job(&mut conn, job_id, &filter).await
}

pub async fn get(state: &AppState, actor: &Actor, id: Uuid) -> Result<JobCandidate> {
    actor.require(Permission::ViewJobs)?;
    let mut conn = state.db.acquire().await?;
    let (jc, _) = load_visible(&mut conn, actor, id).await?;
    Ok(jc)
}

/// Move one application to another stage of its job
pub async fn move_to_stage(state: &AppState, actor: &Actor, id: Uuid, stage_id: Uuid) -> Result<JobCandidate> {
    actor.require(Permission::MoveCandidates)?;

    let mut tx = state.db.begin().await?;
    let (mut jc, job) = load_visible(&mut *tx, actor, id).await?;

    let target = db::stages::get(&mut *tx, job.id, stage_id)
        .await?
        .ok_or_else(|| Error::InvalidInput(format!("stage {} is not part of this job", stage_id)))?;
    if jc.current_stage_id == target.id {
        return Err(Error::InvalidInput(format!(
            "candidate is already in stage '{}'",
            target.name
        )));
    }
    if jc.status != ApplicationStatus::Active {
        return Err(Error::InvalidInput(format!(
            "only active applications can be moved (status is {})",
            jc.status
        )));
    }

    let from = db::stages::get_any(&mut *tx, jc.current_stage_id)
        .await?
        .ok_or_else(|| Error::not_found("stage", jc.current_stage_id))?;

    let now = time::now();
    let event = move_application(&mut *tx, actor.company_id, &jc, &from, &target, Some(actor.user_id), now).await?;

    let candidate_name = candidate_name(&mut *tx, actor.company_id, jc.candidate_id).await?;
    let draft = NotificationDraft::new(
        "stage_changed",
        format!("{} moved to {}", candidate_name, target.name),
        format!("{}: {} → {}", job.title, from.name, target.name),
    )
    .with_link(application_link(job.id, jc.id));
    let created = notifications::create(
        &mut *tx,
        actor.company_id,
        &job_watchers(&job, Some(actor.user_id)),
        &draft,
    )
    .await?;
    tx.commit().await?;

    state.event_bus.emit(event);
    notifications::publish(&state.event_bus, &created);

    info!(job_candidate_id = %jc.id, from = %from.name, to = %target.name, "Candidate moved");
    jc.current_stage_id = target.id;
    jc.stage_entered_at = now;
    Ok(jc)
}

async fn candidate_name(conn: &mut SqliteConnection, company_id: Uuid, candidate_id: Uuid) -> Result<String> {
    Ok(db::candidates::get(conn, company_id, candidate_id)
        .await?
        .map(|c| c.full_name())
        .unwrap_or_else(|| "Candidate".to_string()))
}

/// Set an application's status
///
/// `hired` stamps `hired_at`, `rejected` stamps `rejected_at`, `active`
/// clears both.
pub async fn set_status(state: &AppState, actor: &Actor, id: Uuid, change: StatusChange) -> Result<JobCandidate> {
    actor.require(Permission::MoveCandidates)?;

    let mut tx = state.db.begin().await?;
    let (mut jc, _) = load_visible(&mut *tx, actor, id).await?;
    if jc.status == change.status {
        return Ok(jc);
    }

    let now = time::now();
    let previous = jc.status;
    jc.status = change.status;
    match change.status {
        ApplicationStatus::Hired => jc.hired_at = Some(now),
        ApplicationStatus::Rejected => jc.rejected_at = Some(now),
        ApplicationStatus::Active => {
            jc.hired_at = None;
            jc.rejected_at = None;
        }
        ApplicationStatus::Withdrawn => {}
    }
    db::applications::set_status(&mut *tx, &jc).await?;

    let reason = super::clean(change.reason);
    let description = match &reason {
        Some(r) => format!("Status changed from {} to {}: {}", previous, jc.status, r),
        None => format!("Status changed from {} to {}", previous, jc.status),
    };
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::StatusChanged,
        Some(actor.user_id),
        &description,
        json!({ "from": previous, "to": jc.status, "reason": reason }),
    )
    .await?;
    tx.commit().await?;

    info!(job_candidate_id = %jc.id, from = %previous, to = %jc.status, "Application status changed");
    Ok(jc)
}

pub async fn add_note(state: &AppState, actor: &Actor, id: Uuid, note: &str) -> Result<Activity> {
    actor.require(Permission::ManageCandidates)?;
    let note = required(note, "note")?;

    let mut conn = state.db.acquire().await?;
    let (jc, _) = load_visible(&mut conn, actor, id).await?;
    db::applications::record_activity(
        &mut conn,
        jc.id,
        ActivityType::NoteAdded,
        Some(actor.user_id),
        &note,
        json!({}),
    )
    .await
}

pub async fn update_score(state: &AppState, actor: &Actor, id: Uuid, score: i64) -> Result<JobCandidate> {
    actor.require(Permission::ManageCandidates)?;
    if !(0..=100).contains(&score) {
        return Err(Error::InvalidInput("score must be between 0 and 100".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let (mut jc, _) = load_visible(&mut *tx, actor, id).await?;
    let previous = jc.score;
    db::applications::set_score(&mut *tx, jc.id, score).await?;
    db::applications::record_activity(
        &mut *tx,
        jc.id,
        ActivityType::ScoreUpdated,
        Some(actor.user_id),
        &format!("Score set to {}", score),
        json!({ "from": previous, "to": score }),
    )
    .await?;
    tx.commit().await?;

    jc.score = Some(score);
    Ok(jc)
}

/// Activities, newest first
pub async fn timeline(state: &AppState, actor: &Actor, id: Uuid) -> Result<Vec<Activity>> {
    actor.require(Permission::ViewJobs)?;
    let mut conn = state.db.acquire().await?;
    let (jc, _) = load_visible(&mut conn, actor, id).await?;
    db::applications::list_activities(&mut conn, jc.id).await
}

/// Stage history, oldest first
pub async fn stage_history(state: &AppState, actor: &Actor, id: Uuid) -> Result<Vec<StageHistoryEntry>> {
    actor.require(Permission::ViewJobs)?;
    let mut conn = state.db.acquire().await?;
    let (jc, _) = load_visible(&mut conn, actor, id).await?;
    db::applications::list_stage_history(&mut conn, jc.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    fn job(hm: Option<Uuid>, rec: Option<Uuid>) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Engineer".to_string(),
            department: None,
            location: None,
            employment_type: "full_time".to_string(),
            description: None,
            status: JobStatus::Open,
            hiring_manager_id: hm,
            recruiter_id: rec,
            openings: 1,
            created_by: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn test_job_watchers_exclude_actor_and_dedupe() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(job_watchers(&job(Some(a), Some(b)), None), vec![a, b]);
        assert_eq!(job_watchers(&job(Some(a), Some(b)), Some(a)), vec![b]);
        assert_eq!(job_watchers(&job(Some(a), Some(a)), None), vec![a]);
        assert!(job_watchers(&job(None, None), None).is_empty());
    }
}
