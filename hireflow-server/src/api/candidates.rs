//! Candidate records, bulk import and resumes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Candidate};
use crate::pagination::{Page, PageParams};
use crate::services::bulk::{self, ImportRequest, ImportResult};
use crate::services::candidates::{
    self, CandidateCreated, CandidateQuery, CandidateUpdate, NewCandidate, ResumeUpload,
};
use crate::AppState;

pub async fn list_candidates(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<CandidateQuery>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<Candidate>>> {
    Ok(Json(candidates::list_candidates(&state, &actor, query, page).await?))
}

/// POST /api/candidates
///
/// 201 when a new record was created, 200 when an existing email matched.
pub async fn create_candidate(
    State(state): State<AppState>,
    actor: Actor,
    Json(new): Json<NewCandidate>,
) -> ApiResult<(StatusCode, Json<CandidateCreated>)> {
    let created = candidates::create_candidate(&state, &actor, new).await?;
    let status = if created.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(created)))
}

pub async fn import_candidates(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ImportRequest>,
) -> ApiResult<Json<ImportResult>> {
    Ok(Json(bulk::bulk_import(&state, &actor, req).await?))
}

pub async fn get_candidate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Candidate>> {
    Ok(Json(candidates::get_candidate(&state, &actor, id).await?))
}

pub async fn update_candidate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<CandidateUpdate>,
) -> ApiResult<Json<Candidate>> {
    Ok(Json(candidates::update_candidate(&state, &actor, id, update).await?))
}

pub async fn delete_candidate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    candidates::delete_candidate(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_resume(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(upload): Json<ResumeUpload>,
) -> ApiResult<Json<Candidate>> {
    Ok(Json(candidates::attach_resume(&state, &actor, id, upload).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/candidates", get(list_candidates).post(create_candidate))
        .route("/candidates/import", post(import_candidates))
        .route(
            "/candidates/:id",
            get(get_candidate).patch(update_candidate).delete(delete_candidate),
        )
        .route("/candidates/:id/resume", post(attach_resume))
}
