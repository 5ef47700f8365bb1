//! Runner configuration
//!
//! Defines every tunable the pipeline runner needs: where repositories are
//! cloned from, where workspaces live, which binaries drive the container
//! and cluster backends, and how to reach the diagnostic advisor.
//!
//! Values come from the environment at process start and are passed into
//! constructors; nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use sluice_core::domain::pipeline::DEFINITION_FILE;

/// Pipeline runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Base URL of the git gateway; repositories are `<base>/<repo_name>`
    pub git_base_url: String,

    /// Directory under which per-run workspaces are created
    pub workspace_base: PathBuf,

    /// Definition file name at the workspace root
    pub definition_file: String,

    /// Shell used by local stages (`<shell> -c <command>`)
    pub shell: String,

    /// Container CLI binary (`podman` or `docker`)
    pub container_runtime: String,

    /// Mount point of the workspace inside stage containers
    pub container_workdir: String,

    /// `kubectl` binary used by deployment stages
    pub kubectl: String,

    /// Namespace deployment stages operate in
    pub namespace: String,

    /// Number of trailing characters of stage output sent to the advisor
    pub excerpt_limit: usize,

    /// Diagnostic advisor settings
    pub advisor: AdvisorConfig,
}

/// Diagnostic advisor configuration
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Chat-completion API base URL (e.g., "https://api.deepseek.com")
    pub base_url: String,

    pub model: String,

    /// Bearer token; `None` disables the advisor
    pub api_key: Option<String>,

    /// Timeout for one analysis request
    pub timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with defaults
    pub fn new(git_base_url: String, workspace_base: PathBuf) -> Self {
        Self {
            git_base_url,
            workspace_base,
            definition_file: DEFINITION_FILE.to_string(),
            shell: "sh".to_string(),
            container_runtime: "podman".to_string(),
            container_workdir: "/workspace".to_string(),
            kubectl: "kubectl".to_string(),
            namespace: "default".to_string(),
            excerpt_limit: 2000,
            advisor: AdvisorConfig::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - SLUICE_GIT_BASE_URL (default: http://localhost:8080)
    /// - SLUICE_WORKSPACE_BASE (default: system temp dir)
    /// - SLUICE_DEFINITION_FILE (default: .sluice.yaml)
    /// - SLUICE_SHELL (default: sh)
    /// - SLUICE_CONTAINER_RUNTIME (default: podman)
    /// - SLUICE_KUBECTL (default: kubectl)
    /// - SLUICE_KUBE_NAMESPACE (default: default)
    /// - SLUICE_EXCERPT_LIMIT (default: 2000)
    /// - SLUICE_ADVISOR_URL, SLUICE_ADVISOR_MODEL, SLUICE_ADVISOR_API_KEY,
    ///   SLUICE_ADVISOR_TIMEOUT (seconds, default: 30)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_string("SLUICE_GIT_BASE_URL") {
            config.git_base_url = url;
        }
        if let Some(base) = env_string("SLUICE_WORKSPACE_BASE") {
            config.workspace_base = PathBuf::from(base);
        }
        if let Some(file) = env_string("SLUICE_DEFINITION_FILE") {
            config.definition_file = file;
        }
        if let Some(shell) = env_string("SLUICE_SHELL") {
            config.shell = shell;
        }
        if let Some(runtime) = env_string("SLUICE_CONTAINER_RUNTIME") {
            config.container_runtime = runtime;
        }
        if let Some(kubectl) = env_string("SLUICE_KUBECTL") {
            config.kubectl = kubectl;
        }
        if let Some(namespace) = env_string("SLUICE_KUBE_NAMESPACE") {
            config.namespace = namespace;
        }
        config.excerpt_limit = std::env::var("SLUICE_EXCERPT_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(config.excerpt_limit);

        if let Some(url) = env_string("SLUICE_ADVISOR_URL") {
            config.advisor.base_url = url;
        }
        if let Some(model) = env_string("SLUICE_ADVISOR_MODEL") {
            config.advisor.model = model;
        }
        config.advisor.api_key = env_string("SLUICE_ADVISOR_API_KEY");
        config.advisor.timeout = std::env::var("SLUICE_ADVISOR_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.advisor.timeout);

        config
    }

    /// Clone URL for a repository served by the git gateway
    pub fn repository_url(&self, repo_name: &str) -> String {
        format!(
            "{}/{}",
            self.git_base_url.trim_end_matches('/'),
            repo_name.trim_start_matches('/')
        )
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.git_base_url.starts_with("http://")
            && !self.git_base_url.starts_with("https://")
            && !self.git_base_url.starts_with("file://")
        {
            anyhow::bail!("git_base_url must start with http://, https:// or file://");
        }

        if self.definition_file.trim().is_empty() {
            anyhow::bail!("definition_file cannot be empty");
        }

        if self.shell.trim().is_empty() {
            anyhow::bail!("shell cannot be empty");
        }

        if !self.container_workdir.starts_with('/') {
            anyhow::bail!("container_workdir must be an absolute path");
        }

        if self.excerpt_limit == 0 {
            anyhow::bail!("excerpt_limit must be greater than 0");
        }

        if self.advisor.api_key.is_some() && self.advisor.timeout.is_zero() {
            anyhow::bail!("advisor timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string(), std::env::temp_dir())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
