//! Run domain types
//!
//! A run is one end-to-end execution of a pipeline definition triggered by
//! one push notification. Runs are transient: the report below is the only
//! trace a run leaves, and it lives in memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::pipeline::BackendKind;
use super::push::PushNotification;

/// Run lifecycle state
///
/// `Queued` is held while the run waits for a scheduler slot. The runner
/// itself starts in `Fetching` and ends in `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Fetching,
    Running { stage: usize },
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Queued => write!(f, "Queued"),
            RunState::Fetching => write!(f, "Fetching"),
            RunState::Running { stage } => write!(f, "Running({})", stage),
            RunState::Succeeded => write!(f, "Succeeded"),
            RunState::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub kind: BackendKind,
    pub succeeded: bool,
    /// Exit status of the failing command or container, when there was one
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Result of consulting the diagnostic advisor about a failed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Diagnosis {
    Suggestion(String),
    /// The advisor could not be reached or answered badly
    Unavailable(String),
}

/// Everything known about a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub revision: Option<String>,
    pub pusher: String,
    /// Pipeline name, once the definition was fetched
    pub pipeline: Option<String>,
    /// Terminal state
    pub state: RunState,
    /// Every state the run went through, in order
    pub transitions: Vec<RunState>,
    pub stages: Vec<StageReport>,
    pub error: Option<String>,
    pub diagnosis: Option<Diagnosis>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunReport {
    /// Starts a report for a run triggered by `push`
    pub fn begin(run_id: Uuid, push: &PushNotification) -> Self {
        let now = chrono::Utc::now();
        Self {
            run_id,
            repository: push.repo_name.clone(),
            branch: push.branch.clone(),
            revision: push.revision().map(str::to_string),
            pusher: push.pusher.clone(),
            pipeline: None,
            state: RunState::Fetching,
            transitions: vec![RunState::Fetching],
            stages: Vec::new(),
            error: None,
            diagnosis: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Records a state change
    pub fn enter(&mut self, state: RunState) {
        self.state = state;
        self.transitions.push(state);
    }

    /// Marks the run failed with `error`
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.enter(RunState::Failed);
        self.finished_at = chrono::Utc::now();
    }

    /// Marks the run succeeded
    pub fn succeed(&mut self) {
        self.enter(RunState::Succeeded);
        self.finished_at = chrono::Utc::now();
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// The stage that ended the run, if a stage failed
    pub fn failed_stage(&self) -> Option<&StageReport> {
        self.stages.iter().find(|s| !s.succeeded)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
