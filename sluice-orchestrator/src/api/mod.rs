//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod run;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::{RunRegistry, RunScheduler};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<RunScheduler>,
    pub registry: Arc<RunRegistry>,
}

impl AppState {
    pub fn new(scheduler: Arc<RunScheduler>) -> Self {
        let registry = Arc::clone(scheduler.registry());
        Self {
            scheduler,
            registry,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Push notifications
        .route("/webhook", post(webhook::receive_push))
        // Run inspection
        .route("/runs", get(run::list_runs))
        .route("/runs/{id}", get(run::get_run))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
