//! hireflow-server library
//!
//! Multi-tenant applicant tracking backend: jobs with configurable
//! pipelines, candidates and applications, interviews with calendar sync,
//! vendor access, stage SLAs, boolean search and reporting.

use std::sync::Arc;

use axum::Router;
use hireflow_common::events::EventBus;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::auth::TokenSettings;
use services::calendar::CalendarRegistry;

/// Buffered events per SSE subscriber before it starts lagging
pub const EVENT_BUS_CAPACITY: usize = 1000;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub tokens: TokenSettings,
    pub calendar: Arc<CalendarRegistry>,
}

impl AppState {
    pub fn new(db: SqlitePool, tokens: TokenSettings, calendar: CalendarRegistry) -> Self {
        Self {
            db,
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
            tokens,
            calendar: Arc::new(calendar),
        }
    }
}

/// Build the application router
///
/// `/health` is public; everything else lives under `/api`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .nest("/api", api::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
