//! Orchestrator configuration
//!
//! Server-level settings (bind address, concurrency, run timeout, history
//! size) plus the [`RunnerConfig`] handed to every run.

use sluice_runner::RunnerConfig;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Maximum number of runs executing at once; further runs wait in `Queued`
    pub max_parallel_runs: usize,

    /// Maximum time a run can take before it is failed
    pub run_timeout: Duration,

    /// Number of run records kept in memory
    pub run_history: usize,

    pub runner: RunnerConfig,
}

impl Config {
    /// Creates a configuration with defaults
    pub fn new(runner: RunnerConfig) -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            max_parallel_runs: 4,
            run_timeout: Duration::from_secs(3600),
            run_history: 100,
            runner,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - SLUICE_BIND_ADDR (default: 0.0.0.0:8081)
    /// - SLUICE_MAX_PARALLEL_RUNS (default: 4)
    /// - SLUICE_RUN_TIMEOUT (seconds, default: 3600)
    /// - SLUICE_RUN_HISTORY (default: 100)
    ///
    /// plus everything [`RunnerConfig::from_env`] reads.
    pub fn from_env() -> Self {
        let mut config = Self::new(RunnerConfig::from_env());

        if let Ok(addr) = std::env::var("SLUICE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        config.max_parallel_runs = std::env::var("SLUICE_MAX_PARALLEL_RUNS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(config.max_parallel_runs);

        config.run_timeout = std::env::var("SLUICE_RUN_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.run_timeout);

        config.run_history = std::env::var("SLUICE_RUN_HISTORY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(config.run_history);

        config
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        if self.run_timeout.as_secs() == 0 {
            anyhow::bail!("run_timeout must be greater than 0");
        }

        if self.run_history == 0 {
            anyhow::bail!("run_history must be greater than 0");
        }

        self.runner.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}
