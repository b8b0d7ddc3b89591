//! Calendar connections and availability

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::error::ApiResult;
use crate::models::{Actor, CalendarConnection, CalendarProviderKind};
use crate::services::calendar::{self, Availability, AvailabilityQuery, CallbackRequest, ConnectStart};
use crate::AppState;

/// GET /api/calendar/connect/:provider returns the provider's consent URL
pub async fn begin_connect(
    State(state): State<AppState>,
    actor: Actor,
    Path(provider): Path<CalendarProviderKind>,
) -> ApiResult<Json<ConnectStart>> {
    Ok(Json(calendar::begin_connect(&state, &actor, provider).await?))
}

pub async fn complete_connect(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CallbackRequest>,
) -> ApiResult<Json<CalendarConnection>> {
    Ok(Json(calendar::complete_connect(&state, &actor, req).await?))
}

pub async fn list_connections(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<CalendarConnection>>> {
    Ok(Json(calendar::list_connections(&state, &actor).await?))
}

pub async fn disconnect(
    State(state): State<AppState>,
    actor: Actor,
    Path(provider): Path<CalendarProviderKind>,
) -> ApiResult<StatusCode> {
    calendar::disconnect(&state, &actor, provider).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn availability(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<Availability>> {
    Ok(Json(calendar::availability(&state, &actor, query).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/calendar/connect/:provider", get(begin_connect))
        .route("/calendar/callback", post(complete_connect))
        .route("/calendar/connections", get(list_connections))
        .route("/calendar/connections/:provider", delete(disconnect))
        .route("/calendar/availability", get(availability))
}
