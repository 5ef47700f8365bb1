//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pipeline;
mod push;
mod run;

pub use pipeline::PipelineCommands;
pub use push::PushArgs;
pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Send a push notification to the orchestrator
    Push(PushArgs),
    /// Inspect runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Validate or execute pipeline definitions locally
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
}

/// Route a command to its handler
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Push(args) => push::handle_push_command(args, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command).await,
    }
}
