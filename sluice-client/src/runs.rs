//! Run inspection endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::dto::health::HealthStatus;
use sluice_core::dto::run::RunRecord;
use uuid::Uuid;

impl OrchestratorClient {
    /// List recent runs, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let url = format!("{}/runs", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Get one run by id
    pub async fn get_run(&self, run_id: Uuid) -> Result<RunRecord> {
        let url = format!("{}/runs/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Orchestrator liveness and number of runs in flight
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }
}
