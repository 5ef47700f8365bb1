//! Sluice HTTP Client
//!
//! A small, type-safe client for the Sluice orchestrator API, used by the
//! CLI and by anything that needs to emit push notifications (for example
//! a git `post-receive` hook).
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::OrchestratorClient;
//! use sluice_core::domain::push::PushNotification;
//!
//! #[tokio::main]
//! async fn main() -> sluice_client::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8081");
//!
//!     let ack = client.notify_push(&PushNotification {
//!         repo_name: "demo.git".to_string(),
//!         branch: "master".to_string(),
//!         commit_id: "abc123".to_string(),
//!         pusher: "developer".to_string(),
//!     }).await?;
//!
//!     println!("Run accepted: {}", ack.run_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod runs;
mod webhook;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use sluice_core::dto::run::RunRecord;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Sluice orchestrator API
///
/// Endpoints are grouped by concern:
/// - Push notifications (`/webhook`)
/// - Run inspection (`/runs`, `/runs/{id}`)
/// - Health (`/health`)
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8081")
    base_url: String,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8081")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client around a preconfigured reqwest `Client`
    ///
    /// Use this to set timeouts, proxies or TLS options.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code and deserialize a JSON body
    ///
    /// Error bodies of the form `{"error": "..."}` are unwrapped into the
    /// returned [`ClientError`]; anything else is passed through verbatim.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(error_text);

            return Err(match status.as_u16() {
                404 => ClientError::NotFound(message),
                400 => ClientError::InvalidRequest(message),
                code => ClientError::api_error(code, message),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;

    /// Serves `app` on an ephemeral port and returns a client for it
    pub(crate) async fn client_for(app: Router) -> OrchestratorClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        OrchestratorClient::new(format!("http://{}", addr))
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8081/");
        assert_eq!(client.base_url(), "http://localhost:8081");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = OrchestratorClient::with_client("http://localhost:8081", Client::new());
        assert_eq!(client.base_url(), "http://localhost:8081");
    }
}
