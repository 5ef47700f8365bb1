//! Local process executor
//!
//! Runs each command of a stage through a shell on the orchestrator's host.
//! The working directory is set on each child process rather than on the
//! orchestrator itself, so concurrent runs never observe each other's
//! directory and there is nothing to restore when a stage ends.

use async_trait::async_trait;
use sluice_core::domain::output::OutputStream;
use sluice_core::domain::pipeline::{Stage, StageKind};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{StageExecutor, wrong_kind};
use crate::error::StageError;
use crate::output::OutputBuffer;
use crate::process::run_streamed;

/// Executes local stages with `<shell> -c <command>`
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl StageExecutor for LocalExecutor {
    async fn run(
        &self,
        stage: &Stage,
        workspace: &Path,
        output: &OutputBuffer,
    ) -> Result<(), StageError> {
        let StageKind::Local { script } = &stage.kind else {
            return Err(wrong_kind(stage, "local"));
        };

        info!(
            "Running {} command(s) for stage '{}' in {}",
            script.len(),
            stage.name,
            workspace.display()
        );

        for command in script {
            debug!("[{}] $ {}", stage.name, command);

            let mut cmd = Command::new(&self.shell);
            cmd.arg("-c").arg(command).current_dir(workspace);

            let status = run_streamed(cmd, output).await.map_err(|e| {
                output.push(
                    OutputStream::Stderr,
                    format!("failed to run {}: {}", self.shell, e),
                );
                StageError::backend(&stage.name, format!("failed to run `{}`: {}", command, e))
            })?;

            if !status.success() {
                return Err(StageError::Execution {
                    stage: stage.name.clone(),
                    command: Some(command.clone()),
                    status: status.code(),
                });
            }
        }

        Ok(())
    }
}
