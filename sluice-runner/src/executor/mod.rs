//! Stage executors
//!
//! One executor per backend kind. All three share the same contract: the
//! stage either completes or returns the first failure, and whatever output
//! was produced up to that point is left in the caller's [`OutputBuffer`].
//! That lets the pipeline runner treat them uniformly.

mod container;
mod deployment;
mod local;

pub use container::{ContainerExecutor, ContainerRuntime, UnitSpec};
pub use deployment::{ClusterApi, Deployment, DeploymentExecutor};
pub use local::LocalExecutor;

use async_trait::async_trait;
use sluice_core::domain::pipeline::{Stage, StageKind};
use std::path::Path;
use std::sync::Arc;

use crate::error::StageError;
use crate::output::OutputBuffer;

/// Runs one stage against a backend
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Executes `stage` against the checkout in `workspace`
    ///
    /// # Arguments
    /// * `stage` - The stage to run; must be of this executor's kind
    /// * `workspace` - Host path of the run's checkout
    /// * `output` - Buffer receiving the stage's output
    async fn run(
        &self,
        stage: &Stage,
        workspace: &Path,
        output: &OutputBuffer,
    ) -> Result<(), StageError>;
}

/// The executor for each backend kind
#[derive(Clone)]
pub struct Executors {
    pub local: Arc<dyn StageExecutor>,
    pub container: Arc<dyn StageExecutor>,
    pub deployment: Arc<dyn StageExecutor>,
}

impl Executors {
    /// Selects the executor for a stage's kind
    pub fn for_stage(&self, kind: &StageKind) -> &dyn StageExecutor {
        match kind {
            StageKind::Local { .. } => self.local.as_ref(),
            StageKind::Container { .. } => self.container.as_ref(),
            StageKind::Deployment { .. } => self.deployment.as_ref(),
        }
    }
}

/// Error for an executor handed a stage of another kind
pub(crate) fn wrong_kind(stage: &Stage, expected: &str) -> StageError {
    StageError::backend(
        &stage.name,
        format!(
            "{} stage cannot run on the {} executor",
            stage.backend(),
            expected
        ),
    )
}
