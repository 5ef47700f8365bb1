//! Run API Handlers
//!
//! Read-only views over the run registry.

use axum::{
    Json,
    extract::{Path, State},
};
use sluice_core::dto::run::RunRecord;
use uuid::Uuid;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /runs
/// List recent runs, newest first
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    tracing::debug!("Listing runs");
    Json(state.registry.list())
}

/// GET /runs/{id}
/// Get one run, including its report once finished
pub async fn get_run(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<RunRecord>> {
    tracing::debug!("Getting run: {}", id);

    state
        .registry
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Run {} not found", id)))
}
