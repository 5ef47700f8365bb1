//! Diagnostic advisor
//!
//! Sends the tail of a failed stage's output to a chat-completion API and
//! returns its suggestion. Purely advisory: callers record the result next
//! to the run outcome and never let it change that outcome.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AdvisorConfig;
use crate::error::AdvisorError;

/// Returned when the service answers without any usable content
pub const NO_SUGGESTION: &str = "The advisor had no suggestion.";

/// Turns failure output into a human-readable suggestion
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn analyze(&self, excerpt: &str) -> Result<String, AdvisorError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

/// Services send `"content": null` for refusals and tool calls
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`Advisor`] backed by an OpenAI-compatible chat-completion endpoint
pub struct ChatAdvisor {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

impl ChatAdvisor {
    /// Creates an advisor from configuration
    ///
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>, AdvisorError> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Some(Self::with_client(
            &config.base_url,
            &config.model,
            api_key,
            client,
        )))
    }

    /// Creates an advisor with a preconfigured HTTP client
    pub fn with_client(base_url: &str, model: &str, api_key: &str, client: Client) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }
}

fn prompt(excerpt: &str) -> String {
    format!(
        "You are a DevOps expert. Analyze the following build/deployment error log \
         and give a short suggestion for fixing it.\n\
         Be direct: state the cause and the fix.\n\n\
         Error log:\n{}\n",
        excerpt
    )
}

#[async_trait]
impl Advisor for ChatAdvisor {
    async fn analyze(&self, excerpt: &str) -> Result<String, AdvisorError> {
        info!("Asking advisor about {} chars of failure output", excerpt.chars().count());

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt(excerpt),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdvisorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| AdvisorError::Malformed(e.to_string()))?;

        let suggestion = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty());

        match suggestion {
            Some(text) => Ok(text),
            None => {
                debug!("Advisor returned no content");
                Ok(NO_SUGGESTION.to_string())
            }
        }
    }
}
