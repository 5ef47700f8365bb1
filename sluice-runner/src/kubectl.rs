//! Cluster access through `kubectl`
//!
//! Reads deployments as JSON and writes them back with `kubectl replace`,
//! which fails on a stale `resourceVersion` instead of overwriting a
//! concurrent change.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::executor::{ClusterApi, Deployment};
use crate::process::{run_captured, run_with_stdin};

/// [`ClusterApi`] driving the `kubectl` command line
pub struct KubectlCluster {
    binary: String,
}

impl KubectlCluster {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for KubectlCluster {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl ClusterApi for KubectlCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["get", "deployment", name, "-n", namespace, "-o", "json"]);

        let captured = run_captured(cmd)
            .await
            .with_context(|| format!("Failed to execute {} get", self.binary))?;
        if !captured.success() {
            anyhow::bail!("{}", captured.combined());
        }

        let value = serde_json::from_str(&captured.stdout)
            .with_context(|| format!("{} returned invalid JSON for deployment {}", self.binary, name))?;
        debug!("Fetched deployment {}/{}", namespace, name);
        Ok(Deployment(value))
    }

    async fn update_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        let body = serde_json::to_vec(&deployment.0).context("Failed to serialize deployment")?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(["replace", "-n", namespace, "-f", "-"]);

        let captured = run_with_stdin(cmd, &body)
            .await
            .with_context(|| format!("Failed to execute {} replace", self.binary))?;
        if !captured.success() {
            anyhow::bail!("{}", captured.combined());
        }

        debug!("{}", captured.stdout.trim());
        Ok(())
    }
}
