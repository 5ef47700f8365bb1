//! Sluice Orchestrator
//!
//! HTTP front end of the build pipeline. Receives push notifications from
//! the source-control gateway, schedules a pipeline run for each one and
//! exposes the outcome of recent runs.

pub mod api;
pub mod config;
pub mod service;

use std::sync::Arc;

use sluice_runner::PipelineRunner;

use crate::api::AppState;
use crate::config::Config;
use crate::service::{RunRegistry, RunScheduler};

/// Builds the application state from a runner and configuration
pub fn build_state(runner: PipelineRunner, config: &Config) -> AppState {
    let registry = Arc::new(RunRegistry::new(config.run_history));
    let scheduler = Arc::new(RunScheduler::new(
        Arc::new(runner),
        registry,
        config.max_parallel_runs,
        config.run_timeout,
    ));
    AppState::new(scheduler)
}
