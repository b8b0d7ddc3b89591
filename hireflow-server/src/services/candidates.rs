//! Candidate records and job applications

use super::applications::{application_link, create_application, job_watchers};
use super::notifications::{self, NotificationDraft};
use super::{clean, normalize_email, required, visible_job};
use crate::db;
use crate::db::candidates::CandidateFilter;
use crate::models::{ActivityType, Actor, Candidate, Job, JobCandidate, PipelineStage};
use crate::pagination::{calculate_pagination, Page, PageParams};
use crate::AppState;
use hireflow_common::auth::Permission;
use hireflow_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

/// Candidate profile fields accepted on create, update-in-place and import
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateFields {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub skills: Option<Vec<String>>,
    pub source: Option<String>,
    pub linkedin_url: Option<String>,
    pub summary: Option<String>,
}

impl CandidateFields {
    /// Trim everything, require names and a valid email
    pub(crate) fn validated(self) -> Result<Self> {
        Ok(Self {
            first_name: required(&self.first_name, "first_name")?,
            last_name: required(&self.last_name, "last_name")?,
            email: normalize_email(&self.email)?,
            phone: clean(self.phone),
            location: clean(self.location),
            current_title: clean(self.current_title),
            current_company: clean(self.current_company),
            skills: self.skills.map(normalize_skills).filter(|s| !s.is_empty()),
            source: clean(self.source),
            linkedin_url: clean(self.linkedin_url),
            summary: clean(self.summary),
        })
    }

    fn into_candidate(self, company_id: Uuid, created_by: Option<Uuid>) -> Candidate {
        let now = time::now();
        Candidate {
            id: Uuid::new_v4(),
            company_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            location: self.location,
            current_title: self.current_title,
            current_company: self.current_company,
            skills: self.skills.unwrap_or_default(),
            source: self.source,
            linkedin_url: self.linkedin_url,
            summary: self.summary,
            resume_url: None,
            resume_file_name: None,
            resume_text: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite `existing` with every non-empty field
    pub(crate) fn merge_into(self, existing: &mut Candidate) {
        existing.first_name = self.first_name;
        existing.last_name = self.last_name;
        fn set(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut existing.phone, self.phone);
        set(&mut existing.location, self.location);
        set(&mut existing.current_title, self.current_title);
        set(&mut existing.current_company, self.current_company);
        set(&mut existing.source, self.source);
        set(&mut existing.linkedin_url, self.linkedin_url);
        set(&mut existing.summary, self.summary);
        if let Some(skills) = self.skills {
            existing.skills = skills;
        }
        existing.updated_at = time::now();
    }
}

fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        let skill = skill.trim();
        if !skill.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            out.push(skill.to_string());
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct NewCandidate {
    #[serde(flatten)]
    pub fields: CandidateFields,
    pub job_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CandidateCreated {
    pub candidate: Candidate,
    /// False when an existing candidate with the same email was updated
    pub created: bool,
    pub application: Option<JobCandidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub skills: Option<Vec<String>>,
    pub source: Option<String>,
    pub linkedin_url: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub candidate_id: Uuid,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeUpload {
    pub file_name: String,
    pub url: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub source: Option<String>,
}

/// Insert a candidate or update the one already holding its email
///
/// Returns the stored record and whether it was newly created.
pub(crate) async fn upsert_candidate(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    fields: CandidateFields,
    created_by: Option<Uuid>,
) -> Result<(Candidate, bool)> {
    match db::candidates::find_by_email(&mut *conn, company_id, &fields.email).await? {
        Some(mut existing) => {
            fields.merge_into(&mut existing);
            db::candidates::update(&mut *conn, &existing).await?;
            Ok((existing, false))
        }
        None => {
            let candidate = fields.into_candidate(company_id, created_by);
            db::candidates::insert(&mut *conn, &candidate).await?;
            Ok((candidate, true))
        }
    }
}

/// Resolve the stage an application enters: the requested one or the default
pub(crate) async fn entry_stage(conn: &mut SqliteConnection, job: &Job, stage_id: Option<Uuid>) -> Result<PipelineStage> {
    match stage_id {
        Some(id) => db::stages::get(conn, job.id, id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("stage {} is not part of this job", id))),
        None => db::stages::get_default(conn, job.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("job {} has no default stage", job.id))),
    }
}

/// Load a candidate the caller may see
///
/// Vendors only see candidates they submitted to one of their jobs.
async fn visible_candidate(conn: &mut SqliteConnection, actor: &Actor, id: Uuid) -> Result<Candidate> {
    let candidate = db::candidates::get(&mut *conn, actor.company_id, id)
        .await?
        .ok_or_else(|| Error::not_found("candidate", id))?;

    if actor.is_vendor() {
        let submitted = db::applications::list_for_candidate(&mut *conn, id)
            .await?
            .iter()
            .any(|jc| jc.submitted_by_vendor_id == Some(actor.user_id));
        if !submitted {
            return Err(Error::not_found("candidate", id));
        }
    }

    Ok(candidate)
}

pub async fn create_candidate(state: &AppState, actor: &Actor, new: NewCandidate) -> Result<CandidateCreated> {
    if actor.is_vendor() {
        actor.require(Permission::SubmitCandidates)?;
        if new.job_id.is_none() {
            return Err(Error::InvalidInput(
                "vendors must submit candidates to an assigned job".to_string(),
            ));
        }
    } else {
        actor.require(Permission::ManageCandidates)?;
    }
    let fields = new.fields.validated()?;

    let mut tx = state.db.begin().await?;
    let job = match new.job_id {
        Some(job_id) => Some(visible_job(&mut *tx, actor, job_id).await?),
        None => None,
    };

    let (candidate, created) = if actor.is_vendor() {
        // Vendors link existing candidates but never edit them
        match db::candidates::find_by_email(&mut *tx, actor.company_id, &fields.email).await? {
            Some(existing) => (existing, false),
            None => {
                let candidate = fields.into_candidate(actor.company_id, Some(actor.user_id));
                db::candidates::insert(&mut *tx, &candidate).await?;
                (candidate, true)
            }
        }
    } else {
        upsert_candidate(&mut *tx, actor.company_id, fields, Some(actor.user_id)).await?
    };

    let mut created_notes = Vec::new();
    let application = match &job {
        Some(job) => {
            let stage = entry_stage(&mut *tx, job, new.stage_id).await?;
            let vendor = actor.is_vendor().then_some(actor.user_id);
            let jc = create_application(&mut *tx, job, &candidate, &stage, vendor, Some(actor.user_id)).await?;
            if vendor.is_some() {
                let draft = NotificationDraft::new(
                    "vendor_submission",
                    format!("New vendor submission: {}", candidate.full_name()),
                    format!("{} was submitted to {}", candidate.full_name(), job.title),
                )
                .with_link(application_link(job.id, jc.id));
                created_notes =
                    notifications::create(&mut *tx, actor.company_id, &job_watchers(job, None), &draft).await?;
            }
            Some(jc)
        }
        None => None,
    };

    tx.commit().await?;
    notifications::publish(&state.event_bus, &created_notes);

    info!(candidate_id = %candidate.id, created, applied = application.is_some(), "Candidate saved");
    Ok(CandidateCreated {
        candidate,
        created,
        application,
    })
}

pub async fn list_candidates(
    state: &AppState,
    actor: &Actor,
    query: CandidateQuery,
    params: PageParams,
) -> Result<Page<Candidate>> {
    actor.require(Permission::SubmitCandidates)?;

    let filter = CandidateFilter {
        source: clean(query.source),
        submitted_by_vendor: actor.is_vendor().then_some(actor.user_id),
    };

    let mut conn = state.db.acquire().await?;
    let total = db::candidates::count(&mut conn, actor.company_id, &filter).await?;
    let pagination = calculate_pagination(total, params.page, params.page_size);
    let items = db::candidates::list(
        &mut conn,
        actor.company_id,
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Page::new(items, pagination, total))
}

pub async fn get_candidate(state: &AppState, actor: &Actor, id: Uuid) -> Result<Candidate> {
    actor.require(Permission::SubmitCandidates)?;
    let mut conn = state.db.acquire().await?;
    visible_candidate(&mut conn, actor, id).await
}

pub async fn update_candidate(state: &AppState, actor: &Actor, id: Uuid, update: CandidateUpdate) -> Result<Candidate> {
    actor.require(Permission::ManageCandidates)?;

    let mut tx = state.db.begin().await?;
    let mut candidate = db::candidates::get(&mut *tx, actor.company_id, id)
        .await?
        .ok_or_else(|| Error::not_found("candidate", id))?;

    if let Some(first_name) = update.first_name {
        candidate.first_name = required(&first_name, "first_name")?;
    }
    if let Some(last_name) = update.last_name {
        candidate.last_name = required(&last_name, "last_name")?;
    }
    if let Some(email) = update.email {
        let email = normalize_email(&email)?;
        if email != candidate.email {
            if let Some(other) = db::candidates::find_by_email(&mut *tx, actor.company_id, &email).await? {
                return Err(Error::Conflict(format!(
                    "candidate {} already uses email '{}'",
                    other.id, email
                )));
            }
            candidate.email = email;
        }
    }
    if update.phone.is_some() {
        candidate.phone = clean(update.phone);
    }
    if update.location.is_some() {
        candidate.location = clean(update.location);
    }
    if update.current_title.is_some() {
        candidate.current_title = clean(update.current_title);
    }
    if update.current_company.is_some() {
        candidate.current_company = clean(update.current_company);
    }
    if let Some(skills) = update.skills {
        candidate.skills = normalize_skills(skills);
    }
    if update.source.is_some() {
        candidate.source = clean(update.source);
    }
    if update.linkedin_url.is_some() {
        candidate.linkedin_url = clean(update.linkedin_url);
    }
    if update.summary.is_some() {
        candidate.summary = clean(update.summary);
    }

    candidate.updated_at = time::now();
    db::candidates::update(&mut *tx, &candidate).await?;
    tx.commit().await?;
    Ok(candidate)
}

/// Delete a candidate and, through cascades, all of their applications
pub async fn delete_candidate(state: &AppState, actor: &Actor, id: Uuid) -> Result<()> {
    actor.require(Permission::ManageCandidates)?;

    let mut conn = state.db.acquire().await?;
    db::candidates::get(&mut conn, actor.company_id, id)
        .await?
        .ok_or_else(|| Error::not_found("candidate", id))?;
    db::candidates::delete(&mut conn, id).await?;

    info!(candidate_id = %id, "Candidate deleted");
    Ok(())
}

/// Apply an existing candidate to a job
pub async fn apply_to_job(state: &AppState, actor: &Actor, job_id: Uuid, req: ApplyRequest) -> Result<JobCandidate> {
    if actor.is_vendor() {
        actor.require(Permission::SubmitCandidates)?;
    } else {
        actor.require(Permission::ManageCandidates)?;
    }

    let mut tx = state.db.begin().await?;
    let job = visible_job(&mut *tx, actor, job_id).await?;
    let candidate = visible_candidate(&mut *tx, actor, req.candidate_id).await?;
    let stage = entry_stage(&mut *tx, &job, req.stage_id).await?;

    let vendor = actor.is_vendor().then_some(actor.user_id);
    let jc = create_application(&mut *tx, &job, &candidate, &stage, vendor, Some(actor.user_id)).await?;
    tx.commit().await?;

    info!(job_id = %job.id, candidate_id = %candidate.id, job_candidate_id = %jc.id, "Candidate applied");
    Ok(jc)
}

/// Record resume metadata and log it on each application
pub async fn attach_resume(state: &AppState, actor: &Actor, id: Uuid, upload: ResumeUpload) -> Result<Candidate> {
    actor.require(Permission::SubmitCandidates)?;
    let file_name = required(&upload.file_name, "file_name")?;
    let url = required(&upload.url, "url")?;

    let mut tx = state.db.begin().await?;
    let mut candidate = visible_candidate(&mut *tx, actor, id).await?;

    candidate.resume_file_name = Some(file_name.clone());
    candidate.resume_url = Some(url.clone());
    candidate.resume_text = clean(upload.text);
    candidate.updated_at = time::now();
    db::candidates::update(&mut *tx, &candidate).await?;

    for jc in db::applications::list_for_candidate(&mut *tx, id).await? {
        db::applications::record_activity(
            &mut *tx,
            jc.id,
            ActivityType::ResumeUploaded,
            Some(actor.user_id),
            &format!("Resume uploaded: {}", file_name),
            json!({ "file_name": file_name, "url": url }),
        )
        .await?;
    }
    tx.commit().await?;

    Ok(candidate)
}
