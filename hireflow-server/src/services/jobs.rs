//! Job requisitions and their default pipelines

use super::{clean, nullable, required, visible_job};
use crate::db;
use crate::db::jobs::JobFilter;
use crate::models::{Actor, Job, JobStatus, JobSummary, PipelineStage};
use crate::pagination::{calculate_pagination, Page, PageParams};
use crate::AppState;
use hireflow_common::auth::Permission;
use hireflow_common::{time, Error, Result};
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

/// Entry stage of every pipeline
pub const ENTRY_STAGE: &str = "Queue";

const MIDDLE_STAGES: &[&str] = &["Screening", "Interview", "Offer"];

#[derive(Debug, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub openings: Option<i64>,
    /// Replaces the optional middle stages of the default pipeline
    pub stages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    pub employment_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub hiring_manager_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub recruiter_id: Option<Option<Uuid>>,
    pub openings: Option<i64>,
}

/// One stage of a pipeline template
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StageTemplate {
    pub name: String,
    pub is_default: bool,
    pub is_mandatory: bool,
}

impl StageTemplate {
    fn new(name: &str, is_default: bool, is_mandatory: bool) -> Self {
        Self {
            name: name.to_string(),
            is_default,
            is_mandatory,
        }
    }
}

/// Build the top-level stages for a new job
///
/// `Queue` and `Applied` open the pipeline and `Hired` closes it; the
/// middle is either the standard set or the caller's custom names.
pub(crate) fn pipeline_template(custom: Option<&[String]>) -> Result<Vec<StageTemplate>> {
    let mut stages = vec![
        StageTemplate::new(ENTRY_STAGE, true, true),
        StageTemplate::new("Applied", false, true),
    ];

    match custom {
        None => {
            stages.extend(MIDDLE_STAGES.iter().map(|name| StageTemplate::new(name, false, false)));
        }
        Some(names) => {
            for raw in names {
                let name = required(raw, "stage name")?;
                let clash = stages
                    .iter()
                    .map(|s| s.name.as_str())
                    .chain(std::iter::once("Hired"))
                    .any(|existing| existing.eq_ignore_ascii_case(&name));
                if clash {
                    return Err(Error::InvalidInput(format!("duplicate stage name '{}'", name)));
                }
                stages.push(StageTemplate::new(&name, false, false));
            }
        }
    }

    stages.push(StageTemplate::new("Hired", false, true));
    Ok(stages)
}

/// Check that a referenced user is an active member of the company
async fn ensure_member(conn: &mut SqliteConnection, company_id: Uuid, user_id: Uuid, field: &str) -> Result<()> {
    match db::users::get(conn, company_id, user_id).await? {
        Some(user) if user.is_active && !user.role.is_vendor() => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "{} must be an active member of the company",
            field
        ))),
    }
}

fn validate_openings(openings: i64) -> Result<()> {
    if openings < 1 {
        return Err(Error::InvalidInput("openings must be at least 1".to_string()));
    }
    Ok(())
}

/// Create a job and its pipeline in one transaction
pub async fn create_job(state: &AppState, actor: &Actor, new: NewJob) -> Result<JobSummary> {
    actor.require(Permission::ManageJobs)?;

    let title = required(&new.title, "title")?;
    let openings = new.openings.unwrap_or(1);
    validate_openings(openings)?;
    let template = pipeline_template(new.stages.as_deref())?;

    let now = time::now();
    let status = new.status.unwrap_or(JobStatus::Draft);
    let job = Job {
        id: Uuid::new_v4(),
        company_id: actor.company_id,
        title,
        department: clean(new.department),
        location: clean(new.location),
        employment_type: clean(new.employment_type).unwrap_or_else(|| "full_time".to_string()),
        description: clean(new.description),
        status,
        hiring_manager_id: new.hiring_manager_id,
        recruiter_id: new.recruiter_id,
        openings,
        created_by: Some(actor.user_id),
        created_at: now,
        updated_at: now,
        closed_at: (status == JobStatus::Closed).then_some(now),
    };

    let mut tx = state.db.begin().await?;
    if let Some(id) = job.hiring_manager_id {
        ensure_member(&mut *tx, actor.company_id, id, "hiring_manager_id").await?;
    }
    if let Some(id) = job.recruiter_id {
        ensure_member(&mut *tx, actor.company_id, id, "recruiter_id").await?;
    }

    db::jobs::insert(&mut *tx, &job).await?;
    for (position, t) in template.iter().enumerate() {
        let stage = PipelineStage {
            id: Uuid::new_v4(),
            job_id: job.id,
            parent_id: None,
            name: t.name.clone(),
            position: position as i64,
            is_default: t.is_default,
            is_mandatory: t.is_mandatory,
            created_at: now,
        };
        db::stages::insert(&mut *tx, &stage).await?;
    }
    tx.commit().await?;

    info!(job_id = %job.id, stages = template.len(), "Job created");
    Ok(JobSummary {
        job,
        active_candidates: 0,
    })
}

/// Jobs visible to the caller
///
/// Vendors see only open jobs assigned to them.
pub async fn list_jobs(
    state: &AppState,
    actor: &Actor,
    status: Option<JobStatus>,
    params: PageParams,
) -> Result<Page<JobSummary>> {
    actor.require(Permission::ViewJobs)?;

    let filter = if actor.is_vendor() {
        if status.is_some_and(|s| s != JobStatus::Open) {
            let pagination = calculate_pagination(0, params.page, params.page_size);
            return Ok(Page::new(Vec::new(), pagination, 0));
        }
        JobFilter {
            status: Some(JobStatus::Open),
            vendor_id: Some(actor.user_id),
        }
    } else {
        JobFilter {
            status,
            vendor_id: None,
        }
    };

    let mut conn = state.db.acquire().await?;
    let total = db::jobs::count(&mut conn, actor.company_id, &filter).await?;
    let pagination = calculate_pagination(total, params.page, params.page_size);
    let items = db::jobs::list(
        &mut conn,
        actor.company_id,
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Page::new(items, pagination, total))
}

pub async fn get_job(state: &AppState, actor: &Actor, job_id: Uuid) -> Result<JobSummary> {
    actor.require(Permission::ViewJobs)?;
    let mut conn = state.db.acquire().await?;
    let job = visible_job(&mut conn, actor, job_id).await?;
    let active_candidates = db::jobs::active_candidate_count(&mut conn, job.id).await?;
    Ok(JobSummary {
        job,
        active_candidates,
    })
}

pub async fn update_job(state: &AppState, actor: &Actor, job_id: Uuid, update: JobUpdate) -> Result<JobSummary> {
    actor.require(Permission::ManageJobs)?;

    let mut tx = state.db.begin().await?;
    let mut job = db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    if let Some(title) = update.title {
        job.title = required(&title, "title")?;
    }
    if let Some(department) = update.department {
        job.department = clean(department);
    }
    if let Some(location) = update.location {
        job.location = clean(location);
    }
    if let Some(employment_type) = update.employment_type {
        job.employment_type = required(&employment_type, "employment_type")?;
    }
    if let Some(description) = update.description {
        job.description = clean(description);
    }
    if let Some(openings) = update.openings {
        validate_openings(openings)?;
        job.openings = openings;
    }
    if let Some(hiring_manager_id) = update.hiring_manager_id {
        if let Some(id) = hiring_manager_id {
            ensure_member(&mut *tx, actor.company_id, id, "hiring_manager_id").await?;
        }
        job.hiring_manager_id = hiring_manager_id;
    }
    if let Some(recruiter_id) = update.recruiter_id {
        if let Some(id) = recruiter_id {
            ensure_member(&mut *tx, actor.company_id, id, "recruiter_id").await?;
        }
        job.recruiter_id = recruiter_id;
    }

    job.updated_at = time::now();
    db::jobs::update(&mut *tx, &job).await?;
    let active_candidates = db::jobs::active_candidate_count(&mut *tx, job.id).await?;
    tx.commit().await?;

    Ok(JobSummary {
        job,
        active_candidates,
    })
}

/// Change a job's lifecycle status
///
/// Closing stamps `closed_at`; any other status clears it.
pub async fn set_status(state: &AppState, actor: &Actor, job_id: Uuid, status: JobStatus) -> Result<Job> {
    actor.require(Permission::ManageJobs)?;

    let mut conn = state.db.acquire().await?;
    let mut job = db::jobs::get(&mut conn, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    if job.status == status {
        return Ok(job);
    }

    let now = time::now();
    let previous = job.status;
    job.status = status;
    job.closed_at = (status == JobStatus::Closed).then_some(now);
    job.updated_at = now;
    db::jobs::update(&mut conn, &job).await?;

    info!(job_id = %job.id, from = %previous, to = %status, "Job status changed");
    Ok(job)
}

/// Delete a job that never received an application
pub async fn delete_job(state: &AppState, actor: &Actor, job_id: Uuid) -> Result<()> {
    actor.require(Permission::ManageJobs)?;

    let mut tx = state.db.begin().await?;
    db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    let applications = db::jobs::application_count(&mut *tx, job_id).await?;
    if applications > 0 {
        return Err(Error::Conflict(format!(
            "job has {} application(s) and cannot be deleted; close it instead",
            applications
        )));
    }

    db::jobs::delete(&mut *tx, job_id).await?;
    tx.commit().await?;

    info!(job_id = %job_id, "Job deleted");
    Ok(())
}
