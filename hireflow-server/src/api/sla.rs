//! Stage SLA configuration and breach reporting

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, SlaConfig};
use crate::services::sla::{self, SlaBreach, SlaConfigRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub alerts_sent: usize,
}

pub async fn list_configs(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<SlaConfig>>> {
    Ok(Json(sla::list_configs(&state, &actor).await?))
}

pub async fn upsert_config(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<SlaConfigRequest>,
) -> ApiResult<Json<SlaConfig>> {
    Ok(Json(sla::upsert_config(&state, &actor, req).await?))
}

pub async fn delete_config(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    sla::delete_config(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn breaches(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<SlaBreach>>> {
    Ok(Json(sla::breaches(&state, &actor).await?))
}

/// POST /api/sla/check runs the sweep for the caller's company now
pub async fn check_now(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<CheckResponse>> {
    let alerts_sent = sla::check_now(&state, &actor).await?;
    Ok(Json(CheckResponse { alerts_sent }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sla/configs", get(list_configs).put(upsert_config))
        .route("/sla/configs/:id", delete(delete_config))
        .route("/sla/breaches", get(breaches))
        .route("/sla/check", post(check_now))
}
