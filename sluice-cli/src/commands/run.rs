//! Run command handlers
//!
//! Inspects runs recorded by the orchestrator.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::domain::run::{Diagnosis, RunReport, RunState};
use sluice_core::dto::run::RunRecord;

use crate::config::Config;
use crate::id_resolver::resolve_run_id;
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List recent runs
    List,
    /// Get run details
    Get {
        /// Run ID or unambiguous prefix
        id: IdOrPrefix,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunCommands::List => {
            let runs = client.list_runs().await?;
            if runs.is_empty() {
                println!("{}", "No runs found.".yellow());
            } else {
                println!("{}", format!("Found {} run(s):", runs.len()).bold());
                println!();
                for run in &runs {
                    print_run_summary(run);
                }
            }
            Ok(())
        }
        RunCommands::Get { id } => {
            let run_id = resolve_run_id(&client, &id).await?;
            let run = client.get_run(run_id).await?;
            print_run_details(&run);
            Ok(())
        }
    }
}

pub(crate) fn colorize_state(state: &RunState) -> ColoredString {
    let text = state.to_string();
    match state {
        RunState::Queued => text.dimmed(),
        RunState::Fetching | RunState::Running { .. } => text.yellow(),
        RunState::Succeeded => text.green(),
        RunState::Failed => text.red(),
    }
}

fn print_run_summary(run: &RunRecord) {
    let id = run.run_id.to_string();
    println!(
        "  {}  {:<12}  {} @ {}  {}",
        id[..8].cyan(),
        colorize_state(&run.state),
        run.repository.bold(),
        run.branch,
        run.accepted_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );
}

fn print_run_details(run: &RunRecord) {
    println!("{}", "Run Details:".bold());
    println!("  ID:         {}", run.run_id.to_string().cyan());
    println!("  Repository: {}", run.repository);
    println!("  Branch:     {}", run.branch);
    println!(
        "  Revision:   {}",
        run.revision.as_deref().unwrap_or("(default)")
    );
    println!("  State:      {}", colorize_state(&run.state));
    println!(
        "  Accepted:   {}",
        run.accepted_at.format("%Y-%m-%d %H:%M:%S")
    );

    match &run.report {
        Some(report) => print_report(report),
        None => println!("\n{}", "Run has not finished yet.".dimmed()),
    }
}

/// Prints the stage table, error and diagnosis of a finished run
pub(crate) fn print_report(report: &RunReport) {
    if let Some(pipeline) = &report.pipeline {
        println!("  Pipeline:   {}", pipeline.bold());
    }
    println!("  Duration:   {}ms", report.duration().num_milliseconds());

    if !report.stages.is_empty() {
        println!("\n{}", "Stages:".bold());
        for stage in &report.stages {
            let mark = if stage.succeeded { "✓".green() } else { "✗".red() };
            let exit = stage
                .exit_code
                .map(|c| format!(" (exit {})", c))
                .unwrap_or_default();
            println!(
                "  {} {:<20} {:<10} {}ms{}",
                mark,
                stage.name,
                stage.kind.to_string().dimmed(),
                stage.duration_ms,
                exit
            );
        }
    }

    if let Some(error) = &report.error {
        println!("\n{}", "Error:".bold());
        println!("  {}", error.red());
    }

    match &report.diagnosis {
        Some(Diagnosis::Suggestion(text)) => {
            println!("\n{}", "Advisor:".bold());
            for line in text.lines() {
                println!("  {}", line);
            }
        }
        Some(Diagnosis::Unavailable(reason)) => {
            println!("\n{}", "Advisor:".bold());
            println!("  {} {}", "unavailable:".yellow(), reason.dimmed());
        }
        None => {}
    }
}
