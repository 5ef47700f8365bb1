//! Push notification endpoint

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::push::PushNotification;
use sluice_core::dto::webhook::WebhookAck;

impl OrchestratorClient {
    /// Notify the orchestrator of a push
    ///
    /// Returns as soon as the orchestrator has accepted the run; the run
    /// itself continues in the background. Poll [`OrchestratorClient::get_run`]
    /// with the returned id for its outcome.
    pub async fn notify_push(&self, push: &PushNotification) -> Result<WebhookAck> {
        let url = format!("{}/webhook", self.base_url);
        tracing::debug!("Notifying {} of push to {}", url, push.repo_name);

        let response = self.client.post(&url).json(push).send().await?;
        self.handle_response(response).await
    }
}
