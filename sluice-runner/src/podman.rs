//! Container runtime over the podman (or docker) command line
//!
//! Both CLIs accept the same subset used here, so the binary name is the
//! only thing that changes between them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::executor::{ContainerRuntime, UnitSpec};
use crate::output::OutputBuffer;
use crate::process::{Captured, describe_status, run_captured, run_streamed};

/// Checks that the container CLI is installed and answers `--version`
pub async fn check_runtime_available(binary: &str) -> Result<()> {
    let mut cmd = Command::new(binary);
    cmd.arg("--version");

    let captured = run_captured(cmd)
        .await
        .with_context(|| format!("Failed to execute '{} --version'. Is it installed?", binary))?;

    if !captured.success() {
        anyhow::bail!("{} is not working correctly: {}", binary, captured.combined());
    }

    info!("Container runtime is available: {}", captured.stdout.trim());
    Ok(())
}

/// [`ContainerRuntime`] driving a container CLI
pub struct PodmanRuntime {
    binary: String,
}

impl PodmanRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    async fn checked(&self, cmd: Command, what: &str) -> Result<Captured> {
        let captured = run_captured(cmd)
            .await
            .with_context(|| format!("Failed to execute {} {}", self.binary, what))?;

        if !captured.success() {
            anyhow::bail!(
                "{} {} {}: {}",
                self.binary,
                what,
                describe_status(&captured.status),
                captured.combined().trim()
            );
        }
        Ok(captured)
    }
}

impl Default for PodmanRuntime {
    fn default() -> Self {
        Self::new("podman")
    }
}

/// Arguments for `<binary> create`
fn create_args(spec: &UnitSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "-v".to_string(),
        format!("{}:{}", spec.mount_source.display(), spec.mount_target),
        "-w".to_string(),
        spec.working_dir.clone(),
    ];

    // Override the image entrypoint so images like alpine/git still run the script
    let mut command = spec.command.iter();
    if let Some(entrypoint) = command.next() {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }
    args.push(spec.image.clone());
    args.extend(command.cloned());
    args
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        let mut cmd = self.command();
        cmd.arg("image").arg("inspect").arg(image);

        let captured = run_captured(cmd)
            .await
            .with_context(|| format!("Failed to execute {} image inspect", self.binary))?;
        Ok(captured.success())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("pull").arg("--quiet").arg(image);
        self.checked(cmd, "pull").await?;
        Ok(())
    }

    async fn create_unit(&self, spec: &UnitSpec) -> Result<String> {
        let mut cmd = self.command();
        cmd.args(create_args(spec));

        let captured = self.checked(cmd, "create").await?;
        let id = captured.stdout.trim().to_string();
        if id.is_empty() {
            anyhow::bail!("{} create returned no container id", self.binary);
        }

        debug!("Created container {} ({})", spec.name, id);
        Ok(id)
    }

    async fn start_unit(&self, id: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("start").arg(id);
        self.checked(cmd, "start").await?;
        Ok(())
    }

    async fn stream_logs(&self, id: &str, output: &OutputBuffer) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("logs").arg("--follow").arg(id);

        let status = run_streamed(cmd, output)
            .await
            .with_context(|| format!("Failed to execute {} logs", self.binary))?;

        if !status.success() {
            anyhow::bail!("{} logs {}", self.binary, describe_status(&status));
        }
        Ok(())
    }

    async fn wait_unit(&self, id: &str) -> Result<i32> {
        let mut cmd = self.command();
        cmd.arg("wait").arg(id);

        let captured = self.checked(cmd, "wait").await?;
        let code = captured
            .stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim();

        code.parse::<i32>()
            .with_context(|| format!("Unexpected {} wait output: '{}'", self.binary, code))
    }

    async fn remove_unit(&self, id: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("rm").arg("--force").arg(id);

        if let Err(e) = self.checked(cmd, "rm").await {
            warn!("Failed to remove container {}: {:#}", id, e);
            return Err(e);
        }

        debug!("Container {} removed", id);
        Ok(())
    }
}
