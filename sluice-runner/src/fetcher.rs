//! Definition fetcher
//!
//! Retrieves the exact revision a push refers to and loads the pipeline
//! definition committed with it.

use async_trait::async_trait;
use sluice_core::domain::pipeline::PipelineDefinition;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::FetchError;
use crate::process::run_captured;
use crate::workspace::Workspace;

/// A parsed definition together with the workspace it was read from
#[derive(Debug)]
pub struct FetchedPipeline {
    pub definition: PipelineDefinition,
    pub workspace: Workspace,
}

/// Produces a workspace and pipeline definition for a run
#[async_trait]
pub trait DefinitionFetcher: Send + Sync {
    /// Checks out `repository_url` at `revision` into a fresh workspace
    ///
    /// # Arguments
    /// * `run_id` - Run the workspace belongs to
    /// * `repository_url` - Clone URL
    /// * `revision` - Revision to check out; `None` keeps the clone's default
    async fn fetch(
        &self,
        run_id: Uuid,
        repository_url: &str,
        revision: Option<&str>,
    ) -> Result<FetchedPipeline, FetchError>;
}

/// Fetcher backed by the `git` command line
pub struct GitFetcher {
    workspace_base: PathBuf,
    definition_file: String,
    git: String,
}

impl GitFetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    /// * `workspace_base` - Directory under which run workspaces are created
    /// * `definition_file` - Definition file name at the repository root
    pub fn new(workspace_base: PathBuf, definition_file: impl Into<String>) -> Self {
        Self {
            workspace_base,
            definition_file: definition_file.into(),
            git: "git".to_string(),
        }
    }

    async fn clone_into(&self, url: &str, dir: &Path) -> Result<(), FetchError> {
        info!("Cloning {} into {}", url, dir.display());

        let mut cmd = Command::new(&self.git);
        cmd.arg("clone").arg("--quiet").arg(url).arg(dir);

        let captured = run_captured(cmd).await.map_err(|e| FetchError::Clone {
            url: url.to_string(),
            output: format!("failed to run {}: {}", self.git, e),
        })?;

        if !captured.success() {
            return Err(FetchError::Clone {
                url: url.to_string(),
                output: captured.combined(),
            });
        }
        Ok(())
    }

    async fn checkout(&self, dir: &Path, revision: &str) -> Result<(), FetchError> {
        if revision.starts_with('-') {
            return Err(FetchError::Checkout {
                revision: revision.to_string(),
                output: "revision must not start with '-'".to_string(),
            });
        }
        info!("Checking out {} in {}", revision, dir.display());

        let mut cmd = Command::new(&self.git);
        cmd.arg("checkout")
            .arg("--quiet")
            .arg(revision)
            .arg("--")
            .current_dir(dir);

        let captured = run_captured(cmd).await.map_err(|e| FetchError::Checkout {
            revision: revision.to_string(),
            output: format!("failed to run {}: {}", self.git, e),
        })?;

        if !captured.success() {
            return Err(FetchError::Checkout {
                revision: revision.to_string(),
                output: captured.combined(),
            });
        }
        Ok(())
    }

    async fn prepare(
        &self,
        dir: &Path,
        repository_url: &str,
        revision: Option<&str>,
    ) -> Result<PipelineDefinition, FetchError> {
        self.clone_into(repository_url, dir).await?;

        if let Some(revision) = revision.filter(|r| !r.trim().is_empty()) {
            self.checkout(dir, revision).await?;
        }

        let definition = load_definition(dir, &self.definition_file).await?;
        debug!(
            "Loaded pipeline '{}' with stages {:?}",
            definition.name,
            definition.stage_names()
        );
        Ok(definition)
    }
}

#[async_trait]
impl DefinitionFetcher for GitFetcher {
    async fn fetch(
        &self,
        run_id: Uuid,
        repository_url: &str,
        revision: Option<&str>,
    ) -> Result<FetchedPipeline, FetchError> {
        let workspace = Workspace::create(&self.workspace_base, run_id).await?;

        let prepared = self.prepare(workspace.path(), repository_url, revision).await;
        match prepared {
            Ok(definition) => Ok(FetchedPipeline {
                definition,
                workspace,
            }),
            Err(e) => {
                workspace.remove().await;
                Err(e)
            }
        }
    }
}

/// Reads and parses `<dir>/<file_name>`
pub async fn load_definition(dir: &Path, file_name: &str) -> Result<PipelineDefinition, FetchError> {
    let path = dir.join(file_name);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::MissingDefinition { path });
        }
        Err(source) => return Err(FetchError::ReadDefinition { path, source }),
    };

    Ok(PipelineDefinition::from_yaml(&content)?)
}
