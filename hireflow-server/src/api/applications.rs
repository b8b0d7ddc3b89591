//! Single application (job candidate) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Activity, Actor, JobCandidate, StageHistoryEntry};
use crate::services::applications::{self, StatusChange};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub stage_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score: i64,
}

pub async fn get_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobCandidate>> {
    Ok(Json(applications::get(&state, &actor, id).await?))
}

pub async fn move_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<JobCandidate>> {
    Ok(Json(applications::move_to_stage(&state, &actor, id, req.stage_id).await?))
}

pub async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<JobCandidate>> {
    Ok(Json(applications::set_status(&state, &actor, id, change).await?))
}

pub async fn add_note(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    let activity = applications::add_note(&state, &actor, id, &req.note).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn update_score(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ScoreRequest>,
) -> ApiResult<Json<JobCandidate>> {
    Ok(Json(applications::update_score(&state, &actor, id, req.score).await?))
}

pub async fn timeline(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Activity>>> {
    Ok(Json(applications::timeline(&state, &actor, id).await?))
}

pub async fn stage_history(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<StageHistoryEntry>>> {
    Ok(Json(applications::stage_history(&state, &actor, id).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/job-candidates/:id", get(get_application))
        .route("/job-candidates/:id/move", post(move_application))
        .route("/job-candidates/:id/status", post(set_status))
        .route("/job-candidates/:id/notes", post(add_note))
        .route("/job-candidates/:id/score", put(update_score))
        .route("/job-candidates/:id/activities", get(timeline))
        .route("/job-candidates/:id/stage-history", get(stage_history))
}
