//! Cluster deployment executor
//!
//! Rolls a deployment to a new image by rewriting the image of its first
//! container and submitting the object back. Updating to the image that is
//! already configured is a no-op, which makes the stage safe to re-run.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sluice_core::domain::output::OutputStream;
use sluice_core::domain::pipeline::{Stage, StageKind};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{StageExecutor, wrong_kind};
use crate::error::StageError;
use crate::output::OutputBuffer;

/// A deployment object as returned by the cluster API
///
/// Kept as raw JSON so that fields this crate does not model survive the
/// read-modify-write round trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment(pub JsonValue);

impl Deployment {
    fn containers(&self) -> Option<&Vec<JsonValue>> {
        self.0
            .pointer("/spec/template/spec/containers")
            .and_then(JsonValue::as_array)
            .filter(|c| !c.is_empty())
    }

    /// Whether the pod template has at least one container
    pub fn has_containers(&self) -> bool {
        self.containers().is_some()
    }

    /// Image of the first container
    pub fn primary_image(&self) -> Option<&str> {
        self.containers()?.first()?.get("image")?.as_str()
    }

    /// Replaces the image of the first container
    ///
    /// Returns `false` if there is no container to update.
    pub fn set_primary_image(&mut self, image: &str) -> bool {
        match self.0.pointer_mut("/spec/template/spec/containers/0") {
            Some(JsonValue::Object(container)) => {
                container.insert("image".to_string(), JsonValue::String(image.to_string()));
                true
            }
            _ => false,
        }
    }
}

/// Capabilities the deployment executor needs from a cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_deployment(&self, namespace: &str, name: &str) -> anyhow::Result<Deployment>;

    async fn update_deployment(&self, namespace: &str, deployment: &Deployment) -> anyhow::Result<()>;
}

/// Executes deployment stages against a [`ClusterApi`]
pub struct DeploymentExecutor {
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
}

impl DeploymentExecutor {
    pub fn new(cluster: Arc<dyn ClusterApi>, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl StageExecutor for DeploymentExecutor {
    async fn run(
        &self,
        stage: &Stage,
        _workspace: &Path,
        output: &OutputBuffer,
    ) -> Result<(), StageError> {
        let StageKind::Deployment { target, new_image } = &stage.kind else {
            return Err(wrong_kind(stage, "deployment"));
        };

        info!(
            "Updating deployment {}/{} to {}",
            self.namespace, target, new_image
        );

        let target_error = |reason: String| {
            output.push(OutputStream::Stderr, format!("deployment {}: {}", target, reason));
            StageError::DeploymentTarget {
                stage: stage.name.clone(),
                target: target.clone(),
                reason,
            }
        };

        let mut deployment = self
            .cluster
            .get_deployment(&self.namespace, target)
            .await
            .map_err(|e| target_error(format!("could not be read: {:#}", e)))?;

        let Some(current) = deployment.primary_image().map(str::to_string) else {
            return Err(target_error("has no containers".to_string()));
        };

        if current == *new_image {
            output.push(
                OutputStream::Stdout,
                format!("deployment {} already runs {}, nothing to do", target, new_image),
            );
            info!("Deployment {} already at {}, skipping update", target, new_image);
            return Ok(());
        }

        if !deployment.set_primary_image(new_image) {
            return Err(target_error("has no containers".to_string()));
        }

        if let Err(e) = self.cluster.update_deployment(&self.namespace, &deployment).await {
            warn!("Failed to update deployment {}: {:#}", target, e);
            output.push(
                OutputStream::Stderr,
                format!("update of deployment {} failed: {:#}", target, e),
            );
            return Err(StageError::Execution {
                stage: stage.name.clone(),
                command: None,
                status: None,
            });
        }

        output.push(
            OutputStream::Stdout,
            format!("deployment {} updated: {} -> {}", target, current, new_image),
        );
        info!("Deployment {} updated from {} to {}", target, current, new_image);
        Ok(())
    }
}
