//! Health Check API Handler

use axum::{Json, extract::State};
use sluice_core::dto::health::HealthStatus;

use super::AppState;

/// GET /health
/// Liveness plus the number of runs in flight
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::ok(state.registry.active_count()))
}
