//! Webhook DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immediate acknowledgement returned by `POST /webhook`
///
/// Sent before the run has made any progress; poll `/runs/{run_id}` for
/// the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub run_id: Uuid,
    pub status: String,
}

impl WebhookAck {
    pub fn accepted(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: "accepted".to_string(),
        }
    }
}
