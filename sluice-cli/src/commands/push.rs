//! Push command handler
//!
//! Emits a push notification to the orchestrator, the same way the git
//! gateway's post-receive hook does.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use sluice_core::domain::push::PushNotification;

use crate::config::Config;

/// Arguments of `sluice push`
#[derive(Args)]
pub struct PushArgs {
    /// Repository name as served by the git gateway (e.g. demo.git)
    #[arg(short, long)]
    pub repo: String,

    /// Branch that was pushed
    #[arg(short, long, default_value = "master")]
    pub branch: String,

    /// Revision to build; omitted means the repository's default branch head
    #[arg(short, long, default_value = "")]
    pub commit: String,

    /// Who pushed
    #[arg(short, long, env = "USER", default_value = "unknown")]
    pub pusher: String,
}

impl From<PushArgs> for PushNotification {
    fn from(args: PushArgs) -> Self {
        PushNotification {
            repo_name: args.repo,
            branch: args.branch,
            commit_id: args.commit,
            pusher: args.pusher,
        }
    }
}

/// Handle `sluice push`
pub async fn handle_push_command(args: PushArgs, config: &Config) -> Result<()> {
    let push = PushNotification::from(args);
    push.validate().map_err(|e| anyhow::anyhow!(e))?;

    let ack = config
        .client()
        .notify_push(&push)
        .await
        .with_context(|| format!("Failed to notify {}", config.orchestrator_url))?;

    println!("{}", "✓ Push accepted".green().bold());
    println!("  Run ID:     {}", ack.run_id.to_string().cyan());
    println!("  Repository: {}", push.repo_name.bold());
    println!(
        "  Revision:   {}",
        push.revision().unwrap_or("(default branch head)").dimmed()
    );
    println!();
    println!(
        "Follow it with: {}",
        format!("sluice run get {}", &ack.run_id.to_string()[..8]).cyan()
    );

    Ok(())
}
