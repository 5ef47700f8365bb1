//! Run DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::push::PushNotification;
use crate::domain::run::{RunReport, RunState};

/// Registry entry for a submitted run
///
/// `report` is filled in once the run reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub revision: Option<String>,
    pub state: RunState,
    pub accepted_at: chrono::DateTime<chrono::Utc>,
    pub report: Option<RunReport>,
}

impl RunRecord {
    /// A freshly accepted run that has not started yet
    pub fn queued(run_id: Uuid, push: &PushNotification) -> Self {
        Self {
            run_id,
            repository: push.repo_name.clone(),
            branch: push.branch.clone(),
            revision: push.revision().map(str::to_string),
            state: RunState::Queued,
            accepted_at: chrono::Utc::now(),
            report: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_record() {
        let push = PushNotification {
            repo_name: "demo.git".to_string(),
            branch: "master".to_string(),
            commit_id: String::new(),
            pusher: "developer".to_string(),
        };
        let record = RunRecord::queued(Uuid::new_v4(), &push);
        assert_eq!(record.state, RunState::Queued);
        assert_eq!(record.revision, None);
        assert!(!record.is_finished());
        assert!(record.report.is_none());
    }
}
