//! Container executor
//!
//! Runs a stage's script inside a container built from the stage's image,
//! with the run's workspace bind-mounted. The script is joined into one
//! `sh -c "a && b && c"` invocation so an early failure skips the rest,
//! matching the local executor's short-circuit behaviour.

use async_trait::async_trait;
use sluice_core::domain::pipeline::{Stage, StageKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{StageExecutor, wrong_kind};
use crate::error::StageError;
use crate::output::OutputBuffer;

/// Everything needed to create one execution unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub name: String,
    pub image: String,
    /// Entry point and arguments, e.g. `["/bin/sh", "-c", "make && make test"]`
    pub command: Vec<String>,
    /// Host directory mounted into the unit
    pub mount_source: PathBuf,
    /// Mount point inside the unit
    pub mount_target: String,
    pub working_dir: String,
}

/// Capabilities the container executor needs from a container runtime
///
/// Implementations are stateless clients and may be shared between runs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, image: &str) -> anyhow::Result<bool>;

    async fn pull_image(&self, image: &str) -> anyhow::Result<()>;

    /// Creates a unit and returns its id
    async fn create_unit(&self, spec: &UnitSpec) -> anyhow::Result<String>;

    async fn start_unit(&self, id: &str) -> anyhow::Result<()>;

    /// Follows the unit's stdout/stderr into `output` until the unit stops
    async fn stream_logs(&self, id: &str, output: &OutputBuffer) -> anyhow::Result<()>;

    /// Blocks until the unit reaches a terminal state and returns its exit code
    async fn wait_unit(&self, id: &str) -> anyhow::Result<i32>;

    async fn remove_unit(&self, id: &str) -> anyhow::Result<()>;
}

/// Executes container stages on a [`ContainerRuntime`]
pub struct ContainerExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    workdir: String,
}

impl ContainerExecutor {
    /// Creates a container executor
    ///
    /// # Arguments
    /// * `runtime` - Container runtime client
    /// * `workdir` - Mount point of the workspace inside containers
    pub fn new(runtime: Arc<dyn ContainerRuntime>, workdir: impl Into<String>) -> Self {
        Self {
            runtime,
            workdir: workdir.into(),
        }
    }

    async fn ensure_image(&self, stage: &Stage, image: &str) -> Result<(), StageError> {
        let present = self.runtime.image_exists(image).await.map_err(|e| {
            StageError::backend(&stage.name, format!("failed to inspect image {}: {:#}", image, e))
        })?;

        if present {
            debug!("Image {} already present", image);
            return Ok(());
        }

        info!("Pulling image {} for stage '{}'", image, stage.name);
        self.runtime.pull_image(image).await.map_err(|e| {
            StageError::backend(&stage.name, format!("failed to pull image {}: {:#}", image, e))
        })
    }

    /// Start, capture, wait. Removal is the caller's job.
    async fn drive(
        &self,
        stage: &Stage,
        id: &str,
        shell_cmd: &str,
        output: &OutputBuffer,
    ) -> Result<(), StageError> {
        self.runtime.start_unit(id).await.map_err(|e| {
            StageError::backend(&stage.name, format!("failed to start container: {:#}", e))
        })?;

        // Logs are fully drained here, before anyone reads the buffer
        if let Err(e) = self.runtime.stream_logs(id, output).await {
            warn!("Log stream for container {} ended with error: {:#}", id, e);
        }

        let status = self.runtime.wait_unit(id).await.map_err(|e| {
            StageError::backend(&stage.name, format!("failed waiting for container: {:#}", e))
        })?;

        if status != 0 {
            return Err(StageError::Execution {
                stage: stage.name.clone(),
                command: Some(shell_cmd.to_string()),
                status: Some(status),
            });
        }

        info!("Container stage '{}' completed", stage.name);
        Ok(())
    }
}

#[async_trait]
impl StageExecutor for ContainerExecutor {
    async fn run(
        &self,
        stage: &Stage,
        workspace: &Path,
        output: &OutputBuffer,
    ) -> Result<(), StageError> {
        let StageKind::Container { image, script } = &stage.kind else {
            return Err(wrong_kind(stage, "container"));
        };

        self.ensure_image(stage, image).await?;

        let shell_cmd = script.join(" && ");
        let spec = UnitSpec {
            name: format!("sluice-{}", Uuid::new_v4()),
            image: image.clone(),
            command: vec!["/bin/sh".to_string(), "-c".to_string(), shell_cmd.clone()],
            mount_source: workspace.to_path_buf(),
            mount_target: self.workdir.clone(),
            working_dir: self.workdir.clone(),
        };

        let id = self.runtime.create_unit(&spec).await.map_err(|e| {
            StageError::backend(&stage.name, format!("failed to create container: {:#}", e))
        })?;
        info!("Container {} created for stage '{}'", id, stage.name);

        let guard = UnitGuard::new(Arc::clone(&self.runtime), id.clone());
        let result = self.drive(stage, &id, &shell_cmd, output).await;
        guard.release().await;

        result
    }
}

/// Removes a unit when dropped without having been released
///
/// The normal path calls [`UnitGuard::release`]. If the run is cancelled
/// mid-stage the future is dropped instead, and removal is handed to the
/// runtime in the background.
struct UnitGuard {
    runtime: Arc<dyn ContainerRuntime>,
    id: Option<String>,
}

impl UnitGuard {
    fn new(runtime: Arc<dyn ContainerRuntime>, id: String) -> Self {
        Self {
            runtime,
            id: Some(id),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            remove_logged(self.runtime.as_ref(), &id).await;
        }
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let runtime = Arc::clone(&self.runtime);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    remove_logged(runtime.as_ref(), &id).await;
                });
            }
            Err(_) => warn!("Container {} abandoned: no runtime to remove it", id),
        }
    }
}

async fn remove_logged(runtime: &dyn ContainerRuntime, id: &str) {
    match runtime.remove_unit(id).await {
        Ok(()) => debug!("Container {} removed", id),
        Err(e) => warn!("Failed to remove container {}: {:#}", id, e),
    }
}
