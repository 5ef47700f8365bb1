//! Error types for pipeline runs
//!
//! Two lanes: [`RunError`] (and the fetch/stage errors it wraps) aborts a
//! run, while [`AdvisorError`] is only ever reported next to the outcome.

use std::path::PathBuf;
use std::time::Duration;

use sluice_core::domain::pipeline::DefinitionError;
use thiserror::Error;

/// Errors raised while preparing a run's workspace and definition
#[derive(Debug, Error)]
pub enum FetchError {
    /// The workspace directory could not be created
    #[error("failed to create workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `git clone` failed
    #[error("git clone of {url} failed: {output}")]
    Clone { url: String, output: String },

    /// The requested revision could not be checked out
    #[error("git checkout of {revision} failed: {output}")]
    Checkout { revision: String, output: String },

    /// The repository has no definition file
    #[error("repository is missing {}", .path.display())]
    MissingDefinition { path: PathBuf },

    /// The definition file exists but could not be read
    #[error("failed to read {}: {source}", .path.display())]
    ReadDefinition {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The definition file is malformed
    #[error(transparent)]
    DefinitionParse(#[from] DefinitionError),
}

/// Errors raised by a stage executor
#[derive(Debug, Error)]
pub enum StageError {
    /// A command, container or update submission failed
    #[error("stage '{stage}' failed{}{}",
        .command.as_ref().map(|c| format!(" running `{}`", c)).unwrap_or_default(),
        .status.map(|s| format!(" with exit code {}", s)).unwrap_or_default())]
    Execution {
        stage: String,
        command: Option<String>,
        status: Option<i32>,
    },

    /// The deployment to update is missing or has no workload container
    #[error("stage '{stage}': deployment '{target}' {reason}")]
    DeploymentTarget {
        stage: String,
        target: String,
        reason: String,
    },

    /// The backend itself failed (spawn error, runtime unavailable, ...)
    #[error("stage '{stage}': {message}")]
    Backend { stage: String, message: String },
}

impl StageError {
    pub fn backend(stage: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Exit status carried by the error, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StageError::Execution { status, .. } => *status,
            _ => None,
        }
    }
}

/// Fatal errors that end a run in `Failed`
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("run timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors from the diagnostic advisor; never fatal to a run
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The request could not be sent or timed out
    #[error("advisor request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The advisor answered with a non-success status
    #[error("advisor returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a chat completion
    #[error("malformed advisor response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_messages() {
        let err = StageError::Execution {
            stage: "build".to_string(),
            command: Some("exit 1".to_string()),
            status: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "stage 'build' failed running `exit 1` with exit code 1"
        );
        assert_eq!(err.exit_code(), Some(1));

        let err = StageError::Execution {
            stage: "deploy".to_string(),
            command: None,
            status: None,
        };
        assert_eq!(err.to_string(), "stage 'deploy' failed");
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::MissingDefinition {
            path: PathBuf::from("/tmp/ws/.sluice.yaml"),
        };
        assert_eq!(err.to_string(), "repository is missing /tmp/ws/.sluice.yaml");

        let run_err: RunError = err.into();
        assert!(matches!(
            run_err,
            RunError::Fetch(FetchError::MissingDefinition { .. })
        ));
    }
}
