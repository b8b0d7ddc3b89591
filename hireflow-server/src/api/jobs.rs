//! Jobs, their pipeline stages and their applications

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Job, JobCandidate, JobCandidateView, JobStatus, JobSummary, PipelineStage, StageNode};
use crate::pagination::{Page, PageParams};
use crate::services::applications::{self, ApplicationQuery};
use crate::services::bulk::{self, BulkMoveRequest, BulkMoveResult};
use crate::services::candidates::{self, ApplyRequest};
use crate::services::jobs::{self, JobUpdate, NewJob};
use crate::services::pipeline::{self, NewStage, ReorderRequest, StageDeleted, StageUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusChange {
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct StageDeleteQuery {
    /// Where the stage's candidates go; defaults to the job's default stage
    pub move_to_stage_id: Option<Uuid>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<JobListQuery>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<JobSummary>>> {
    Ok(Json(jobs::list_jobs(&state, &actor, query.status, page).await?))
}

pub async fn create_job(
    State(state): State<AppState>,
    actor: Actor,
    Json(new): Json<NewJob>,
) -> ApiResult<(StatusCode, Json<JobSummary>)> {
    let job = jobs::create_job(&state, &actor, new).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(State(state): State<AppState>, actor: Actor, Path(id): Path<Uuid>) -> ApiResult<Json<JobSummary>> {
    Ok(Json(jobs::get_job(&state, &actor, id).await?))
}

pub async fn update_job(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<JobUpdate>,
) -> ApiResult<Json<JobSummary>> {
    Ok(Json(jobs::update_job(&state, &actor, id, update).await?))
}

pub async fn delete_job(State(state): State<AppState>, actor: Actor, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    jobs::delete_job(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(change): Json<JobStatusChange>,
) -> ApiResult<Json<Job>> {
    Ok(Json(jobs::set_status(&state, &actor, id, change.status).await?))
}

pub async fn list_stages(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<StageNode>>> {
    Ok(Json(pipeline::list_stages(&state, &actor, id).await?))
}

pub async fn add_stage(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(new): Json<NewStage>,
) -> ApiResult<(StatusCode, Json<PipelineStage>)> {
    let stage = pipeline::add_stage(&state, &actor, id, new).await?;
    Ok((StatusCode::CREATED, Json(stage)))
}

pub async fn reorder_stages(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<PipelineStage>>> {
    Ok(Json(pipeline::reorder_stages(&state, &actor, id, req).await?))
}

pub async fn update_stage(
    State(state): State<AppState>,
    actor: Actor,
    Path((job_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<StageUpdate>,
) -> ApiResult<Json<PipelineStage>> {
    Ok(Json(pipeline::update_stage(&state, &actor, job_id, stage_id, update).await?))
}

pub async fn delete_stage(
    State(state): State<AppState>,
    actor: Actor,
    Path((job_id, stage_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<StageDeleteQuery>,
) -> ApiResult<Json<StageDeleted>> {
    Ok(Json(
        pipeline::delete_stage(&state, &actor, job_id, stage_id, query.move_to_stage_id).await?,
    ))
}

pub async fn list_applications(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Json<Vec<JobCandidateView>>> {
    Ok(Json(applications::list_for_job(&state, &actor, id, query).await?))
}

pub async fn apply(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<JobCandidate>)> {
    let application = candidates::apply_to_job(&state, &actor, id, req).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn bulk_move(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<BulkMoveRequest>,
) -> ApiResult<Json<BulkMoveResult>> {
    Ok(Json(bulk::bulk_move(&state, &actor, id, req).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job).patch(update_job).delete(delete_job))
        .route("/jobs/:id/status", post(set_status))
        .route("/jobs/:id/stages", get(list_stages).post(add_stage))
        .route("/jobs/:id/stages/reorder", post(reorder_stages))
        .route("/jobs/:id/stages/:stage_id", patch(update_stage).delete(delete_stage))
        .route("/jobs/:id/candidates", get(list_applications).post(apply))
        .route("/jobs/:id/candidates/bulk-move", post(bulk_move))
}
