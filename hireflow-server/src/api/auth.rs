//! Registration, login and the current user

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};

use crate::error::ApiResult;
use crate::models::{Actor, User};
use crate::services::auth::{self, AuthResponse, LoginRequest, RegisterRequest, RegisterResponse};
use crate::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let response = auth::register(&state, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(auth::login(&state, req).await?))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<User>> {
    Ok(Json(auth::me(&state, &actor).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
