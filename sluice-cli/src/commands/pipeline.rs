//! Pipeline command handlers
//!
//! Work with definition files locally: check that one parses, or run a
//! repository's pipeline in this process without an orchestrator.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use sluice_core::domain::pipeline::{DEFINITION_FILE, PipelineDefinition, StageKind};
use sluice_core::domain::push::PushNotification;
use sluice_core::domain::run::RunState;
use sluice_runner::{PipelineRunner, RunObserver, RunnerConfig};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::run::{colorize_state, print_report};

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Parse a definition file and show its stages
    Validate {
        /// Path to the definition file
        #[arg(default_value = DEFINITION_FILE)]
        file: PathBuf,
    },
    /// Run a repository's pipeline in-process
    Exec {
        /// Repository name, resolved against SLUICE_GIT_BASE_URL
        #[arg(short, long)]
        repo: String,

        /// Branch recorded in the report
        #[arg(short, long, default_value = "master")]
        branch: String,

        /// Revision to check out
        #[arg(short, long, default_value = "")]
        commit: String,

        /// Override SLUICE_GIT_BASE_URL
        #[arg(long)]
        git_base_url: Option<String>,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands) -> Result<()> {
    match command {
        PipelineCommands::Validate { file } => validate(&file),
        PipelineCommands::Exec {
            repo,
            branch,
            commit,
            git_base_url,
        } => exec(repo, branch, commit, git_base_url).await,
    }
}

fn validate(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let definition = PipelineDefinition::from_yaml(&content)
        .with_context(|| format!("{} is not a valid pipeline definition", file.display()))?;

    println!("{}", "✓ Definition is valid".green().bold());
    println!("  Name:   {}", definition.name.bold());
    println!("  Stages: {}", definition.stages.len());
    for (index, stage) in definition.stages.iter().enumerate() {
        let detail = match &stage.kind {
            StageKind::Local { script } => format!("{} command(s)", script.len()),
            StageKind::Container { image, script } => {
                format!("{} command(s) in {}", script.len(), image)
            }
            StageKind::Deployment { target, new_image } => format!("{} -> {}", target, new_image),
        };
        println!(
            "    {}. {:<20} {:<10} {}",
            index,
            stage.name.cyan(),
            stage.backend().to_string(),
            detail.dimmed()
        );
    }

    Ok(())
}

/// Prints each state change as it happens
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_state(&self, _run_id: Uuid, state: RunState) {
        println!("{} {}", "==>".blue().bold(), colorize_state(&state));
    }
}

async fn exec(
    repo: String,
    branch: String,
    commit: String,
    git_base_url: Option<String>,
) -> Result<()> {
    let mut config = RunnerConfig::from_env();
    if let Some(url) = git_base_url {
        config.git_base_url = url;
    }
    config.validate().context("Invalid runner configuration")?;

    let runner = PipelineRunner::from_config(config)?;
    let push = PushNotification {
        repo_name: repo,
        branch,
        commit_id: commit,
        pusher: std::env::var("USER").unwrap_or_else(|_| "sluice-cli".to_string()),
    };
    push.validate().map_err(|e| anyhow::anyhow!(e))?;

    let run_id = Uuid::new_v4();
    println!("Run {}", run_id.to_string().cyan());
    let report = runner.run(run_id, &push, &ConsoleObserver).await;

    println!();
    print_report(&report);

    if !report.is_success() {
        anyhow::bail!("pipeline failed");
    }
    Ok(())
}
