//! Interview scheduling and feedback

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Feedback, Interview, InterviewDetail};
use crate::services::interviews::{
    self, CancelRequest, FeedbackRequest, InterviewQuery, InterviewUpdate, ScheduleRequest,
};
use crate::AppState;

pub async fn list_interviews(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<InterviewQuery>,
) -> ApiResult<Json<Vec<Interview>>> {
    Ok(Json(interviews::list(&state, &actor, query).await?))
}

pub async fn schedule(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<InterviewDetail>)> {
    let detail = interviews::schedule(&state, &actor, req).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_interview(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InterviewDetail>> {
    Ok(Json(interviews::get(&state, &actor, id).await?))
}

pub async fn reschedule(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<InterviewUpdate>,
) -> ApiResult<Json<InterviewDetail>> {
    Ok(Json(interviews::reschedule(&state, &actor, id, update).await?))
}

/// POST /api/interviews/:id/cancel (body optional)
pub async fn cancel(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Json<InterviewDetail>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(interviews::cancel(&state, &actor, id, req).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InterviewDetail>> {
    Ok(Json(interviews::complete(&state, &actor, id).await?))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Feedback>>> {
    Ok(Json(interviews::list_feedback(&state, &actor, id).await?))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Json<Feedback>> {
    Ok(Json(interviews::submit_feedback(&state, &actor, id, req).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/interviews", get(list_interviews).post(schedule))
        .route("/interviews/:id", get(get_interview).patch(reschedule))
        .route("/interviews/:id/cancel", post(cancel))
        .route("/interviews/:id/complete", post(complete))
        .route("/interviews/:id/feedback", get(list_feedback).post(submit_feedback))
}
