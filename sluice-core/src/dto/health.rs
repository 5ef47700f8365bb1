//! Health DTOs

use serde::{Deserialize, Serialize};

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Runs accepted but not yet finished
    pub active_runs: usize,
}

impl HealthStatus {
    pub fn ok(active_runs: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_runs,
        }
    }
}
