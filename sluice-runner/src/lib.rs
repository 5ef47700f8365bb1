//! Sluice Runner
//!
//! Executes one pipeline run from push to report.
//!
//! Architecture:
//! - Fetcher: clones the pushed revision into a run-owned workspace and
//!   loads the pipeline definition
//! - Executors: one per backend (local process, container, cluster deployment)
//! - Advisor: asks a chat-completion service about failed stages
//! - Pipeline: the state machine tying the above together
//!
//! Nothing here holds global state. Everything a run needs is passed in
//! through [`config::RunnerConfig`] and the constructors.

pub mod advisor;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod kubectl;
pub mod output;
pub mod pipeline;
pub mod podman;
pub mod process;
pub mod workspace;

pub use config::{AdvisorConfig, RunnerConfig};
pub use error::{AdvisorError, FetchError, RunError, StageError};
pub use pipeline::{NullObserver, PipelineRunner, RunObserver};
