use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sluice_orchestrator::{api, build_state, config::Config};
use sluice_runner::PipelineRunner;
use sluice_runner::podman::check_runtime_available;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sluice_orchestrator=info,sluice_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sluice Orchestrator...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    tracing::info!(
        "Loaded configuration: git_base_url={}, workspace_base={}, max_parallel_runs={}",
        config.runner.git_base_url,
        config.runner.workspace_base.display(),
        config.max_parallel_runs
    );

    // Container stages fail at run time without a runtime; warn early instead
    if let Err(e) = check_runtime_available(&config.runner.container_runtime).await {
        tracing::warn!("Container stages will fail: {:#}", e);
    }

    let runner = PipelineRunner::from_config(config.runner.clone())
        .context("Failed to initialize pipeline runner")?;

    // Build router with all API endpoints
    let app = api::create_router(build_state(runner, &config));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
