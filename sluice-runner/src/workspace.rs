//! Run workspaces
//!
//! A workspace is the directory one run checks its revision out into. It is
//! created fresh for each run, named after the run id so concurrent runs
//! never collide. Finished runs delete it with [`Workspace::remove`]; if the
//! value is dropped instead (timeout, panic) the directory is deleted in
//! `Drop`, so every exit path releases it.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FetchError;

/// Exclusively owned checkout directory of one run
#[derive(Debug)]
pub struct Workspace {
    run_id: Uuid,
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Creates `<base>/sluice-<run_id>`
    ///
    /// Fails if the directory already exists; a workspace is never reused.
    pub async fn create(base: &Path, run_id: Uuid) -> Result<Self, FetchError> {
        let path = base.join(format!("sluice-{}", run_id));

        tokio::fs::create_dir_all(base)
            .await
            .map_err(|source| FetchError::Workspace {
                path: base.to_path_buf(),
                source,
            })?;
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| FetchError::Workspace {
                path: path.clone(),
                source,
            })?;

        info!("Workspace created for run {}: {}", run_id, path.display());
        Ok(Self {
            run_id,
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Deletes the directory without blocking the runtime
    ///
    /// Runs that end normally release their workspace here. Dropping the
    /// value instead (a cancelled run) deletes it synchronously.
    pub async fn remove(mut self) {
        self.removed = true;
        let result = tokio::fs::remove_dir_all(&self.path).await;
        self.log_removal(result);
    }

    fn log_removal(&self, result: std::io::Result<()>) {
        match result {
            Ok(()) => debug!("Workspace {} removed", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove workspace {} for run {}: {}",
                self.path.display(),
                self.run_id,
                e
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.removed {
            let result = std::fs::remove_dir_all(&self.path);
            self.log_removal(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_is_unique_and_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();

        let workspace = Workspace::create(base.path(), run_id).await.unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path.ends_with(format!("sluice-{}", run_id)));

        std::fs::write(path.join("artifact.txt"), "built").unwrap();
        drop(workspace);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workspace_removed_asynchronously() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path(), Uuid::new_v4()).await.unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::create_dir_all(path.join("target/debug")).unwrap();
        std::fs::write(path.join("target/debug/app"), "binary").unwrap();

        workspace.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workspace_never_reused() {
        let base = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();

        let _first = Workspace::create(base.path(), run_id).await.unwrap();
        let second = Workspace::create(base.path(), run_id).await;
        assert!(matches!(second, Err(FetchError::Workspace { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_runs_get_distinct_directories() {
        let base = tempfile::tempdir().unwrap();
        let a = Workspace::create(base.path(), Uuid::new_v4()).await.unwrap();
        let b = Workspace::create(base.path(), Uuid::new_v4()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
