//! Bulk stage moves and candidate imports
//!
//! Each call runs in a single transaction; every item gets its own
//! savepoint so a failing item rolls back only its own writes and is
//! reported instead of aborting the batch.

use super::applications::{job_watchers, move_application};
use super::candidates::{entry_stage, upsert_candidate, CandidateFields};
use super::notifications::{self, NotificationDraft};
use super::visible_job;
use crate::db;
use crate::models::{Actor, ApplicationStatus, Job, PipelineStage};
use crate::AppState;
use hireflow_common::auth::Permission;
use hireflow_common::events::AtsEvent;
use hireflow_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BULK_MOVE: usize = 500;
pub const MAX_IMPORT_ROWS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct BulkMoveRequest {
    pub job_candidate_ids: Vec<Uuid>,
    pub target_stage_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BulkMoveFailure {
    pub job_candidate_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkMoveResult {
    pub moved: Vec<Uuid>,
    pub failed: Vec<BulkMoveFailure>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<CandidateFields>,
    pub job_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    /// Applied to rows that carry no source of their own
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportFailure {
    /// 1-based row number
    pub row: usize,
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub linked: usize,
    pub already_applied: usize,
    pub failed: Vec<ImportFailure>,
}

/// Human-readable reason for a failed item
fn failure_reason(err: &Error) -> String {
    match err {
        Error::InvalidInput(m) | Error::Conflict(m) | Error::NotFound(m) => m.clone(),
        other => {
            warn!(error = %other, "Bulk item failed unexpectedly");
            other.to_string()
        }
    }
}

/// Unique ids in first-seen order
fn dedupe(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

async fn move_one(
    conn: &mut SqliteConnection,
    actor: &Actor,
    job: &Job,
    target: &PipelineStage,
    id: Uuid,
) -> Result<AtsEvent> {
    let jc = db::applications::get(&mut *conn, actor.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("not found".to_string()))?;

    if jc.job_id != job.id {
        return Err(Error::InvalidInput("belongs to another job".to_string()));
    }
    if jc.current_stage_id == target.id {
        return Err(Error::InvalidInput("already in target stage".to_string()));
    }
    if jc.status != ApplicationStatus::Active {
        return Err(Error::InvalidInput(format!("not active (status is {})", jc.status)));
    }

    let from = db::stages::get_any(&mut *conn, jc.current_stage_id)
        .await?
        .ok_or_else(|| Error::not_found("stage", jc.current_stage_id))?;

    move_application(conn, actor.company_id, &jc, &from, target, Some(actor.user_id), time::now()).await
}

/// Move many applications of one job to a target stage
pub async fn bulk_move(state: &AppState, actor: &Actor, job_id: Uuid, req: BulkMoveRequest) -> Result<BulkMoveResult> {
    actor.require(Permission::BulkOperations)?;

    if req.job_candidate_ids.is_empty() {
        return Err(Error::InvalidInput("job_candidate_ids must not be empty".to_string()));
    }
    if req.job_candidate_ids.len() > MAX_BULK_MOVE {
        return Err(Error::InvalidInput(format!(
            "at most {} candidates can be moved at once",
            MAX_BULK_MOVE
        )));
    }

    let mut tx = state.db.begin().await?;
    let job = db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;
    let target = db::stages::get(&mut *tx, job.id, req.target_stage_id)
        .await?
        .ok_or_else(|| {
            Error::InvalidInput(format!("stage {} is not part of this job", req.target_stage_id))
        })?;

    let mut result = BulkMoveResult::default();
    let mut events = Vec::new();

    for id in dedupe(&req.job_candidate_ids) {
        let mut savepoint = Connection::begin(&mut *tx).await?;
        match move_one(&mut *savepoint, actor, &job, &target, id).await {
            Ok(event) => {
                savepoint.commit().await?;
                result.moved.push(id);
                events.push(event);
            }
            Err(e) => {
                savepoint.rollback().await?;
                result.failed.push(BulkMoveFailure {
                    job_candidate_id: id,
                    reason: failure_reason(&e),
                });
            }
        }
    }

    tx.commit().await?;

    for event in events {
        state.event_bus.emit(event);
    }

    if !result.moved.is_empty() {
        let draft = NotificationDraft::new(
            "bulk_move",
            format!("{} candidate(s) moved to {}", result.moved.len(), target.name),
            format!(
                "{}: {} moved, {} failed",
                job.title,
                result.moved.len(),
                result.failed.len()
            ),
        )
        .with_link(format!("/jobs/{}", job.id));
        if let Err(e) = notifications::notify(state, actor.company_id, &job_watchers(&job, None), &draft).await {
            warn!(job_id = %job.id, error = %e, "Bulk move summary notification failed");
        }
    }

    info!(
        job_id = %job.id,
        target = %target.name,
        moved = result.moved.len(),
        failed = result.failed.len(),
        "Bulk move finished"
    );
    Ok(result)
}

/// What happened to one imported row
enum RowOutcome {
    Created { linked: bool, already_applied: bool },
    Updated { linked: bool, already_applied: bool },
}

async fn import_one(
    conn: &mut SqliteConnection,
    actor: &Actor,
    target: Option<&(Job, PipelineStage)>,
    fields: CandidateFields,
) -> Result<RowOutcome> {
    let (candidate, created) = upsert_candidate(&mut *conn, actor.company_id, fields, Some(actor.user_id)).await?;

    let (linked, already_applied) = match target {
        Some((job, stage)) => {
            if db::applications::find(&mut *conn, job.id, candidate.id).await?.is_some() {
                (false, true)
            } else {
                super::applications::create_application(conn, job, &candidate, stage, None, Some(actor.user_id))
                    .await?;
                (true, false)
            }
        }
        None => (false, false),
    };

    Ok(if created {
        RowOutcome::Created { linked, already_applied }
    } else {
        RowOutcome::Updated { linked, already_applied }
    })
}

/// Create or update many candidates, optionally applying them to a job
pub async fn bulk_import(state: &AppState, actor: &Actor, req: ImportRequest) -> Result<ImportResult> {
    actor.require(Permission::BulkOperations)?;

    if req.rows.is_empty() {
        return Err(Error::InvalidInput("rows must not be empty".to_string()));
    }
    if req.rows.len() > MAX_IMPORT_ROWS {
        return Err(Error::InvalidInput(format!(
            "at most {} rows can be imported at once",
            MAX_IMPORT_ROWS
        )));
    }
    let default_source = super::clean(req.source);

    let mut tx = state.db.begin().await?;
    let target = match req.job_id {
        Some(job_id) => {
            let job = visible_job(&mut *tx, actor, job_id).await?;
            let stage = entry_stage(&mut *tx, &job, req.stage_id).await?;
            Some((job, stage))
        }
        None => None,
    };

    let mut result = ImportResult::default();
    let mut seen_emails: HashSet<String> = HashSet::new();

    for (index, mut fields) in req.rows.into_iter().enumerate() {
        let row = index + 1;
        let raw_email = fields.email.trim().to_string();
        if fields.source.is_none() {
            fields.source = default_source.clone();
        }

        let fields = match fields.validated() {
            Ok(f) => f,
            Err(e) => {
                result.failed.push(ImportFailure {
                    row,
                    email: raw_email,
                    reason: failure_reason(&e),
                });
                continue;
            }
        };
        if !seen_emails.insert(fields.email.clone()) {
            result.failed.push(ImportFailure {
                row,
                email: fields.email,
                reason: "duplicate email in import".to_string(),
            });
            continue;
        }

        let email = fields.email.clone();
        let mut savepoint = Connection::begin(&mut *tx).await?;
        match import_one(&mut *savepoint, actor, target.as_ref(), fields).await {
            Ok(outcome) => {
                savepoint.commit().await?;
                let (linked, already_applied) = match outcome {
                    RowOutcome::Created { linked, already_applied } => {
                        result.created += 1;
                        (linked, already_applied)
                    }
                    RowOutcome::Updated { linked, already_applied } => {
                        result.updated += 1;
                        (linked, already_applied)
                    }
                };
                result.linked += linked as usize;
                result.already_applied += already_applied as usize;
            }
            Err(e) => {
                savepoint.rollback().await?;
                result.failed.push(ImportFailure {
                    row,
                    email,
                    reason: failure_reason(&e),
                });
            }
        }
    }

    tx.commit().await?;

    let job_id = target.as_ref().map(|(job, _)| job.id);
    state.event_bus.emit(AtsEvent::CandidatesImported {
        company_id: actor.company_id,
        job_id,
        created: result.created,
        updated: result.updated,
        failed: result.failed.len(),
        timestamp: time::now(),
    });

    let draft = NotificationDraft::new(
        "import_finished",
        "Candidate import finished",
        format!(
            "{} created, {} updated, {} linked, {} failed",
            result.created,
            result.updated,
            result.linked,
            result.failed.len()
        ),
    );
    if let Err(e) = notifications::notify(state, actor.company_id, &[actor.user_id], &draft).await {
        warn!(error = %e, "Import summary notification failed");
    }

    info!(
        created = result.created,
        updated = result.updated,
        linked = result.linked,
        failed = result.failed.len(),
        "Bulk import finished"
    );
    Ok(result)
}
