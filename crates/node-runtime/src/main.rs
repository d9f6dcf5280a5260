//! # Dispatch Gateway
//!
//! Entry point: telemetry first, then configuration, then the runtime.

use anyhow::{Context, Result};
use gateway_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::{select_broker, NodeConfig, NodeRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _guard = init_telemetry(&telemetry).context("failed to initialise telemetry")?;

    let config = NodeConfig::from_env().context("failed to load configuration")?;
    let broker = select_broker(&config.channel.uri)?;

    let node = NodeRuntime::start(config, broker).await?;

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    node.shutdown().await;
    Ok(())
}
