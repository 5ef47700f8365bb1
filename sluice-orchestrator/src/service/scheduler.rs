//! Run scheduler
//!
//! Turns an accepted push into a background run. Each run gets its own
//! tokio task; a semaphore caps how many execute at once and a timeout
//! bounds each one. Callers get a [`RunHandle`] back immediately.

use sluice_core::domain::push::PushNotification;
use sluice_core::domain::run::RunReport;
use sluice_runner::PipelineRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::registry::RunRegistry;

/// A submitted run
pub struct RunHandle {
    pub run_id: Uuid,
    /// Resolves to the final report; dropping it detaches the run
    pub task: JoinHandle<RunReport>,
}

/// Spawns and bounds pipeline runs
pub struct RunScheduler {
    runner: Arc<PipelineRunner>,
    registry: Arc<RunRegistry>,
    permits: Arc<Semaphore>,
    run_timeout: Duration,
}

impl RunScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    /// * `runner` - Pipeline runner shared by all runs
    /// * `registry` - Where run state and reports are recorded
    /// * `max_parallel_runs` - Number of runs allowed to execute at once
    /// * `run_timeout` - Upper bound on a single run
    pub fn new(
        runner: Arc<PipelineRunner>,
        registry: Arc<RunRegistry>,
        max_parallel_runs: usize,
        run_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            registry,
            permits: Arc::new(Semaphore::new(max_parallel_runs.max(1))),
            run_timeout,
        }
    }

    /// Registers the run as queued and starts it in the background
    pub fn submit(&self, push: PushNotification) -> RunHandle {
        let run_id = Uuid::new_v4();
        self.registry.register(run_id, &push);
        info!(
            "Run {} queued for {} ({} by {})",
            run_id, push.repo_name, push.branch, push.pusher
        );

        let runner = Arc::clone(&self.runner);
        let registry = Arc::clone(&self.registry);
        let permits = Arc::clone(&self.permits);
        let run_timeout = self.run_timeout;

        let task = tokio::spawn(async move {
            // Held for the whole run; the semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            debug!("Run {} acquired an execution slot", run_id);

            let report = runner
                .run_within(run_id, &push, registry.as_ref(), run_timeout)
                .await;
            registry.complete(report.clone());
            report
        });

        RunHandle { run_id, task }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_core::domain::pipeline::{PipelineDefinition, Stage, StageKind};
    use sluice_core::domain::run::RunState;
    use sluice_runner::error::{FetchError, StageError};
    use sluice_runner::executor::{Executors, StageExecutor};
    use sluice_runner::fetcher::{DefinitionFetcher, FetchedPipeline};
    use sluice_runner::output::OutputBuffer;
    use sluice_runner::workspace::Workspace;
    use sluice_runner::RunnerConfig;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneStageFetcher {
        base: PathBuf,
    }

    #[async_trait]
    impl DefinitionFetcher for OneStageFetcher {
        async fn fetch(
            &self,
            run_id: Uuid,
            _repository_url: &str,
            _revision: Option<&str>,
        ) -> Result<FetchedPipeline, FetchError> {
            Ok(FetchedPipeline {
                definition: PipelineDefinition {
                    name: "ci".to_string(),
                    stages: vec![Stage {
                        name: "build".to_string(),
                        kind: StageKind::Local {
                            script: vec!["true".to_string()],
                        },
                    }],
                },
                workspace: Workspace::create(&self.base, run_id).await?,
            })
        }
    }

    /// Sleeps, tracking the highest number of concurrent stages seen
    #[derive(Default)]
    struct SlowExecutor {
        current: AtomicUsize,
        peak: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl StageExecutor for SlowExecutor {
        async fn run(
            &self,
            _stage: &Stage,
            _workspace: &Path,
            _output: &OutputBuffer,
        ) -> Result<(), StageError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scheduler(
        base: &Path,
        executor: Arc<SlowExecutor>,
        parallel: usize,
        timeout: Duration,
    ) -> RunScheduler {
        let executors = Executors {
            local: executor.clone(),
            container: executor.clone(),
            deployment: executor,
        };
        let runner = PipelineRunner::new(
            RunnerConfig::new("http://git.local".to_string(), base.to_path_buf()),
            Arc::new(OneStageFetcher {
                base: base.to_path_buf(),
            }),
            executors,
            None,
        );
        RunScheduler::new(
            Arc::new(runner),
            Arc::new(RunRegistry::new(100)),
            parallel,
            timeout,
        )
    }

    fn push() -> PushNotification {
        PushNotification {
            repo_name: "demo.git".to_string(),
            branch: "master".to_string(),
            commit_id: String::new(),
            pusher: "developer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_records_outcome() {
        let base = tempfile::tempdir().unwrap();
        let executor = Arc::new(SlowExecutor::default());
        let scheduler = scheduler(base.path(), executor, 4, Duration::from_secs(10));

        let handle = scheduler.submit(push());
        let run_id = handle.run_id;
        let report = handle.task.await.unwrap();

        assert!(report.is_success());
        let record = scheduler.registry().get(run_id).unwrap();
        assert_eq!(record.state, RunState::Succeeded);
        assert_eq!(record.report.unwrap().run_id, run_id);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let base = tempfile::tempdir().unwrap();
        let executor = Arc::new(SlowExecutor {
            delay_ms: 50,
            ..Default::default()
        });
        let scheduler = scheduler(base.path(), executor.clone(), 2, Duration::from_secs(10));

        let handles: Vec<RunHandle> = (0..6).map(|_| scheduler.submit(push())).collect();
        for handle in handles {
            assert!(handle.task.await.unwrap().is_success());
        }

        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(scheduler.registry().active_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_run() {
        let base = tempfile::tempdir().unwrap();
        let executor = Arc::new(SlowExecutor {
            delay_ms: 10_000,
            ..Default::default()
        });
        let scheduler = scheduler(base.path(), executor, 1, Duration::from_millis(100));

        let report = scheduler.submit(push()).task.await.unwrap();

        assert_eq!(report.state, RunState::Failed);
        assert!(report.error.unwrap().starts_with("run timed out after"));
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }
}
