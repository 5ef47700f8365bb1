//! Pipeline runner
//!
//! Drives one run through its states:
//!
//! ```text
//! Fetching -> Running(0) -> Running(1) -> ... -> Succeeded
//!     |            |             |
//!     +------------+-------------+--> Failed
//! ```
//!
//! Stages run strictly in definition order and the first failing stage ends
//! the run. When a stage fails, the tail of its output goes to the advisor
//! before the run is marked failed; the advisor's answer is attached to the
//! report and never changes the outcome.

use sluice_core::domain::output::tail_chars;
use sluice_core::domain::pipeline::Stage;
use sluice_core::domain::push::PushNotification;
use sluice_core::domain::run::{Diagnosis, RunReport, RunState, StageReport};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::advisor::{Advisor, ChatAdvisor};
use crate::config::RunnerConfig;
use crate::error::{RunError, StageError};
use crate::executor::{
    ContainerExecutor, DeploymentExecutor, Executors, LocalExecutor, StageExecutor,
};
use crate::fetcher::{DefinitionFetcher, FetchedPipeline, GitFetcher};
use crate::kubectl::KubectlCluster;
use crate::output::OutputBuffer;
use crate::podman::PodmanRuntime;

/// Receives every state change of a run as it happens
pub trait RunObserver: Send + Sync {
    fn on_state(&self, run_id: Uuid, state: RunState);
}

/// Observer that ignores everything
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn on_state(&self, _run_id: Uuid, _state: RunState) {}
}

/// Runs pipelines end to end
///
/// Holds only shared, stateless collaborators, so one runner serves every
/// concurrent run.
#[derive(Clone)]
pub struct PipelineRunner {
    config: RunnerConfig,
    fetcher: Arc<dyn DefinitionFetcher>,
    executors: Executors,
    advisor: Option<Arc<dyn Advisor>>,
}

impl PipelineRunner {
    pub fn new(
        config: RunnerConfig,
        fetcher: Arc<dyn DefinitionFetcher>,
        executors: Executors,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Self {
        Self {
            config,
            fetcher,
            executors,
            advisor,
        }
    }

    /// Wires the git fetcher, the CLI-driven backends and the chat advisor
    pub fn from_config(config: RunnerConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(GitFetcher::new(
            config.workspace_base.clone(),
            config.definition_file.clone(),
        ));

        let executors = Executors {
            local: Arc::new(LocalExecutor::new(config.shell.clone())),
            container: Arc::new(ContainerExecutor::new(
                Arc::new(PodmanRuntime::new(config.container_runtime.clone())),
                config.container_workdir.clone(),
            )),
            deployment: Arc::new(DeploymentExecutor::new(
                Arc::new(KubectlCluster::new(config.kubectl.clone())),
                config.namespace.clone(),
            )),
        };

        let advisor = match ChatAdvisor::from_config(&config.advisor)? {
            Some(advisor) => Some(Arc::new(advisor) as Arc<dyn Advisor>),
            None => {
                warn!("SLUICE_ADVISOR_API_KEY not set, failed stages will not be diagnosed");
                None
            }
        };

        Ok(Self::new(config, fetcher, executors, advisor))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs the pipeline for `push` to completion
    pub async fn run(
        &self,
        run_id: Uuid,
        push: &PushNotification,
        observer: &dyn RunObserver,
    ) -> RunReport {
        let mut report = RunReport::begin(run_id, push);
        observer.on_state(run_id, report.state);

        if let Err(e) = self.drive(push, &mut report, observer).await {
            self.finish_failed(&mut report, &e, observer);
        }
        log_outcome(&report);
        report
    }

    /// Like [`PipelineRunner::run`], but gives up after `limit`
    ///
    /// On timeout the in-flight stage is dropped, which kills its child
    /// processes, schedules removal of its container and deletes the
    /// workspace. Stages that already finished stay in the report.
    pub async fn run_within(
        &self,
        run_id: Uuid,
        push: &PushNotification,
        observer: &dyn RunObserver,
        limit: Duration,
    ) -> RunReport {
        let mut report = RunReport::begin(run_id, push);
        observer.on_state(run_id, report.state);

        let outcome = tokio::time::timeout(limit, self.drive(push, &mut report, observer)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(RunError::TimedOut(limit)),
        };

        if let Err(e) = result {
            self.finish_failed(&mut report, &e, observer);
        }
        log_outcome(&report);
        report
    }

    async fn drive(
        &self,
        push: &PushNotification,
        report: &mut RunReport,
        observer: &dyn RunObserver,
    ) -> Result<(), RunError> {
        let run_id = report.run_id;
        let url = self.config.repository_url(&push.repo_name);
        info!(
            "Run {} fetching {} at {}",
            run_id,
            url,
            push.revision().unwrap_or("HEAD")
        );

        let FetchedPipeline {
            definition,
            workspace,
        } = self.fetcher.fetch(run_id, &url, push.revision()).await?;
        report.pipeline = Some(definition.name.clone());

        info!(
            "Run {} executing pipeline '{}' with {} stage(s)",
            run_id,
            definition.name,
            definition.stages.len()
        );

        let mut outcome = Ok(());
        for (index, stage) in definition.stages.iter().enumerate() {
            transition(report, RunState::Running { stage: index }, observer);
            outcome = self.run_stage(report, stage, workspace.path()).await;
            if outcome.is_err() {
                break;
            }
        }
        workspace.remove().await;
        outcome?;

        report.succeed();
        observer.on_state(run_id, RunState::Succeeded);
        Ok(())
    }

    async fn run_stage(
        &self,
        report: &mut RunReport,
        stage: &Stage,
        workspace: &Path,
    ) -> Result<(), StageError> {
        info!(
            "Run {} stage '{}' ({}) started",
            report.run_id,
            stage.name,
            stage.backend()
        );

        let executor: &dyn StageExecutor = self.executors.for_stage(&stage.kind);
        let output = OutputBuffer::echoing(&stage.name);
        let started = Instant::now();
        let result = executor.run(stage, workspace, &output).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!("Stage '{}' succeeded in {} ms", stage.name, duration_ms);
                report.stages.push(StageReport {
                    name: stage.name.clone(),
                    kind: stage.backend(),
                    succeeded: true,
                    exit_code: None,
                    error: None,
                    duration_ms,
                });
                Ok(())
            }
            Err(e) => {
                error!("Stage '{}' failed: {}", stage.name, e);
                report.stages.push(StageReport {
                    name: stage.name.clone(),
                    kind: stage.backend(),
                    succeeded: false,
                    exit_code: e.exit_code(),
                    error: Some(e.to_string()),
                    duration_ms,
                });

                let excerpt = if output.is_empty() {
                    tail_chars(&e.to_string(), self.config.excerpt_limit).to_string()
                } else {
                    output.excerpt(self.config.excerpt_limit)
                };
                report.diagnosis = self.diagnose(&excerpt).await;
                Err(e)
            }
        }
    }

    async fn diagnose(&self, excerpt: &str) -> Option<Diagnosis> {
        let Some(advisor) = &self.advisor else {
            warn!("No advisor configured, skipping diagnosis");
            return None;
        };

        match advisor.analyze(excerpt).await {
            Ok(text) => {
                info!("Advisor suggestion:\n{}", text);
                Some(Diagnosis::Suggestion(text))
            }
            Err(e) => {
                warn!("Advisor unavailable: {}", e);
                Some(Diagnosis::Unavailable(e.to_string()))
            }
        }
    }

    fn finish_failed(&self, report: &mut RunReport, err: &RunError, observer: &dyn RunObserver) {
        report.fail(err.to_string());
        observer.on_state(report.run_id, RunState::Failed);
    }
}

fn transition(report: &mut RunReport, state: RunState, observer: &dyn RunObserver) {
    report.enter(state);
    observer.on_state(report.run_id, state);
}

fn log_outcome(report: &RunReport) {
    let elapsed = report.duration().num_milliseconds();
    match report.state {
        RunState::Succeeded => info!(
            "Run {} for {} succeeded in {} ms",
            report.run_id, report.repository, elapsed
        ),
        _ => error!(
            "Run {} for {} failed after {} ms: {}",
            report.run_id,
            report.repository,
            elapsed,
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdvisorError, FetchError};
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use sluice_core::domain::output::OutputStream;
    use sluice_core::domain::pipeline::{PipelineDefinition, StageKind};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Serves a fixed definition, or a missing-definition error
    struct FakeFetcher {
        base: PathBuf,
        definition: Option<PipelineDefinition>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl DefinitionFetcher for FakeFetcher {
        async fn fetch(
            &self,
            run_id: Uuid,
            repository_url: &str,
            revision: Option<&str>,
        ) -> Result<FetchedPipeline, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((repository_url.to_string(), revision.map(str::to_string)));

            let workspace = Workspace::create(&self.base, run_id).await?;
            match &self.definition {
                Some(definition) => Ok(FetchedPipeline {
                    definition: definition.clone(),
                    workspace,
                }),
                None => Err(FetchError::MissingDefinition {
                    path: workspace.path().join(".sluice.yaml"),
                }),
            }
        }
    }

    /// Records stage names; fails stages whose name starts with "fail"
    ///
    /// With `silent_command` set, failing stages print nothing and report
    /// that command instead.
    #[derive(Default)]
    struct ScriptedExecutor {
        ran: Mutex<Vec<String>>,
        output: Option<String>,
        delay: Option<Duration>,
        silent_command: Option<String>,
    }

    impl ScriptedExecutor {
        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StageExecutor for ScriptedExecutor {
        async fn run(
            &self,
            stage: &Stage,
            workspace: &Path,
            output: &OutputBuffer,
        ) -> Result<(), StageError> {
            assert!(workspace.exists());
            self.ran.lock().unwrap().push(stage.name.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(text) = &self.output {
                output.push_text(OutputStream::Stdout, text);
            }
            if stage.name.starts_with("fail") {
                if let Some(command) = &self.silent_command {
                    return Err(StageError::Execution {
                        stage: stage.name.clone(),
                        command: Some(command.clone()),
                        status: Some(2),
                    });
                }
                output.push(OutputStream::Stderr, "make: *** [all] Error 1");
                return Err(StageError::Execution {
                    stage: stage.name.clone(),
                    command: Some("make".to_string()),
                    status: Some(1),
                });
            }
            Ok(())
        }
    }

    struct FakeAdvisor {
        excerpts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeAdvisor {
        fn new(fail: bool) -> Self {
            Self {
                excerpts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl Advisor for FakeAdvisor {
        async fn analyze(&self, excerpt: &str) -> Result<String, AdvisorError> {
            self.excerpts.lock().unwrap().push(excerpt.to_string());
            if self.fail {
                return Err(AdvisorError::Malformed("no json".to_string()));
            }
            Ok("Install make.".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<RunState>>,
    }

    impl RunObserver for RecordingObserver {
        fn on_state(&self, _run_id: Uuid, state: RunState) {
            self.states.lock().unwrap().push(state);
        }
    }

    struct Harness {
        base: tempfile::TempDir,
        fetcher: Arc<FakeFetcher>,
        executor: Arc<ScriptedExecutor>,
        advisor: Arc<FakeAdvisor>,
        runner: PipelineRunner,
    }

    fn local(name: &str) -> Stage {
        Stage {
            name: name.to_string(),
            kind: StageKind::Local {
                script: vec!["true".to_string()],
            },
        }
    }

    fn harness(stages: Option<Vec<Stage>>, executor: ScriptedExecutor, advisor_fails: bool) -> Harness {
        let base = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            base: base.path().to_path_buf(),
            definition: stages.map(|stages| PipelineDefinition {
                name: "ci".to_string(),
                stages,
            }),
            calls: Mutex::new(Vec::new()),
        });
        let executor = Arc::new(executor);
        let advisor = Arc::new(FakeAdvisor::new(advisor_fails));

        let executors = Executors {
            local: executor.clone(),
            container: executor.clone(),
            deployment: executor.clone(),
        };
        let runner = PipelineRunner::new(
            RunnerConfig::new("http://git.local".to_string(), base.path().to_path_buf()),
            fetcher.clone(),
            executors,
            Some(advisor.clone()),
        );

        Harness {
            base,
            fetcher,
            executor,
            advisor,
            runner,
        }
    }

    fn push() -> PushNotification {
        PushNotification {
            repo_name: "demo.git".to_string(),
            branch: "master".to_string(),
            commit_id: "abc123".to_string(),
            pusher: "developer".to_string(),
        }
    }

    fn workspace_count(h: &Harness) -> usize {
        std::fs::read_dir(h.base.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let h = harness(
            Some(vec![local("build"), local("test")]),
            ScriptedExecutor::default(),
            false,
        );
        let observer = RecordingObserver::default();

        let report = h.runner.run(Uuid::new_v4(), &push(), &observer).await;

        assert!(report.is_success());
        assert_eq!(
            report.transitions,
            vec![
                RunState::Fetching,
                RunState::Running { stage: 0 },
                RunState::Running { stage: 1 },
                RunState::Succeeded,
            ]
        );
        assert_eq!(*observer.states.lock().unwrap(), report.transitions);
        assert_eq!(h.executor.ran(), vec!["build", "test"]);
        assert!(report.stages.iter().all(|s| s.succeeded));
        assert!(report.diagnosis.is_none());
        assert!(h.advisor.excerpts.lock().unwrap().is_empty());
        assert_eq!(report.pipeline.as_deref(), Some("ci"));
        assert_eq!(
            *h.fetcher.calls.lock().unwrap(),
            vec![(
                "http://git.local/demo.git".to_string(),
                Some("abc123".to_string())
            )]
        );
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_failed_stage_consults_advisor() {
        let h = harness(
            Some(vec![local("build"), local("fail-tests"), local("deploy")]),
            ScriptedExecutor::default(),
            false,
        );

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(
            report.transitions,
            vec![
                RunState::Fetching,
                RunState::Running { stage: 0 },
                RunState::Running { stage: 1 },
                RunState::Failed,
            ]
        );
        assert_eq!(h.executor.ran(), vec!["build", "fail-tests"]);

        let failed = report.failed_stage().unwrap();
        assert_eq!(failed.name, "fail-tests");
        assert_eq!(failed.exit_code, Some(1));

        let excerpts = h.advisor.excerpts.lock().unwrap();
        assert_eq!(excerpts.len(), 1);
        assert!(excerpts[0].contains("Error 1"));
        assert_eq!(
            report.diagnosis,
            Some(Diagnosis::Suggestion("Install make.".to_string()))
        );
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_missing_definition_runs_nothing() {
        let h = harness(None, ScriptedExecutor::default(), false);

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        assert_eq!(report.transitions, vec![RunState::Fetching, RunState::Failed]);
        assert!(report.error.as_deref().unwrap().contains(".sluice.yaml"));
        assert!(h.executor.ran().is_empty());
        assert!(h.advisor.excerpts.lock().unwrap().is_empty());
        assert!(report.diagnosis.is_none());
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let h = harness(Some(Vec::new()), ScriptedExecutor::default(), false);

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        assert_eq!(report.transitions, vec![RunState::Fetching, RunState::Succeeded]);
    }

    #[tokio::test]
    async fn test_advisor_error_does_not_change_outcome() {
        let h = harness(Some(vec![local("fail")]), ScriptedExecutor::default(), true);

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(report.diagnosis, Some(Diagnosis::Unavailable(_))));
        assert!(report.error.as_deref().unwrap().contains("exit code 1"));
    }

    #[tokio::test]
    async fn test_excerpt_is_tail_of_output() {
        let long = "x".repeat(5000);
        let executor = ScriptedExecutor {
            output: Some(long),
            ..Default::default()
        };
        let h = harness(Some(vec![local("fail")]), executor, false);

        h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        let excerpts = h.advisor.excerpts.lock().unwrap();
        assert_eq!(excerpts[0].chars().count(), 2000);
        assert!(excerpts[0].ends_with("make: *** [all] Error 1"));
    }

    #[tokio::test]
    async fn test_excerpt_of_silent_failure_is_bounded() {
        let executor = ScriptedExecutor {
            silent_command: Some(format!("{} && make", "x".repeat(5000))),
            ..Default::default()
        };
        let h = harness(Some(vec![local("fail")]), executor, false);

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        let excerpts = h.advisor.excerpts.lock().unwrap();
        assert_eq!(excerpts[0].chars().count(), 2000);
        assert!(excerpts[0].ends_with("with exit code 2"));
        // The stage record keeps the full error
        assert!(report.stages[0].error.as_deref().unwrap().chars().count() > 5000);
    }

    #[tokio::test]
    async fn test_no_advisor_leaves_diagnosis_empty() {
        let mut h = harness(Some(vec![local("fail")]), ScriptedExecutor::default(), false);
        h.runner.advisor = None;

        let report = h.runner.run(Uuid::new_v4(), &push(), &NullObserver).await;

        assert_eq!(report.state, RunState::Failed);
        assert!(report.diagnosis.is_none());
    }

    #[tokio::test]
    async fn test_timeout_fails_run_and_cleans_up() {
        let executor = ScriptedExecutor {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let h = harness(Some(vec![local("slow"), local("never")]), executor, false);

        let report = h
            .runner
            .run_within(Uuid::new_v4(), &push(), &NullObserver, Duration::from_millis(100))
            .await;

        assert_eq!(report.state, RunState::Failed);
        assert!(report.error.as_deref().unwrap().starts_with("run timed out after"));
        assert_eq!(h.executor.ran(), vec!["slow"]);
        assert_eq!(workspace_count(&h), 0);
    }
}
