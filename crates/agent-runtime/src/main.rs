//! # DID Agent
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from the environment
//! 3. Build the runtime and initiate every controller
//! 4. Serve until Ctrl+C, then drain and shut the controllers down

use std::sync::Arc;

use agent_runtime::{load_config, AgentRuntime};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config().context("Invalid configuration")?;

    let runtime = Arc::new(AgentRuntime::new(config).await?);
    let server = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.serve().await }
    });

    info!("Agent is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.trigger_shutdown();
    server.await.context("HTTP server task panicked")??;
    runtime.shutdown().await;

    Ok(())
}
