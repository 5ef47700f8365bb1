//! Webhook API Handler
//!
//! Entry point for push notifications from the source-control gateway.

use axum::{Json, body::Bytes, extract::State};
use sluice_core::domain::push::PushNotification;
use sluice_core::dto::webhook::WebhookAck;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /webhook
/// Accept a push and start its run in the background
///
/// The body is parsed here rather than through the `Json` extractor so that
/// every malformed body (bad JSON, wrong shape, missing content type) gets
/// the same 400 response.
pub async fn receive_push(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<WebhookAck>> {
    let push: PushNotification = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid push notification: {}", e)))?;

    push.validate().map_err(ApiError::BadRequest)?;

    tracing::info!(
        "Push received: {} {} {} by {}",
        push.repo_name,
        push.branch,
        push.revision().unwrap_or("HEAD"),
        push.pusher
    );

    let handle = state.scheduler.submit(push);
    Ok(Json(WebhookAck::accepted(handle.run_id)))
}
