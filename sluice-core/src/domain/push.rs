//! Push notification domain type

use serde::{Deserialize, Serialize};

/// Notification emitted by the source-control gateway after a push
///
/// Consumed once per run and never retained beyond the run's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    /// Repository name as served by the gateway (e.g. "demo.git")
    pub repo_name: String,
    pub branch: String,
    /// Revision to build; empty means "whatever the clone checks out"
    pub commit_id: String,
    pub pusher: String,
}

impl PushNotification {
    /// The revision to check out, if one was supplied
    pub fn revision(&self) -> Option<&str> {
        let rev = self.commit_id.trim();
        if rev.is_empty() { None } else { Some(rev) }
    }

    /// Checks the fields the orchestrator relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.repo_name.trim().is_empty() {
            return Err("repo_name cannot be empty".to_string());
        }
        if self.repo_name.contains("..") || self.repo_name.starts_with('/') {
            return Err(format!("invalid repo_name '{}'", self.repo_name));
        }
        if let Some(rev) = self.revision() {
            if !is_revision_shaped(rev) {
                return Err(format!("invalid commit_id '{}'", rev));
            }
        }
        Ok(())
    }
}

/// Accepts hashes, ref names and `rev~n`/`rev^` forms, never an option
fn is_revision_shaped(rev: &str) -> bool {
    !rev.starts_with('-')
        && rev
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '~' | '^'))
}
