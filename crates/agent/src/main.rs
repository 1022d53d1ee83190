use anyhow::Result;
use domain::models::ConnectionTestTrigger;
use tracing::{info, warn};

use monitoring_agent::config::{Config, StartupMode};
use monitoring_agent::telemetry;
use monitoring_agent::Agent;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    telemetry::init_logging(&config.logging);

    info!("Starting Monitoring Agent v{}", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        telemetry::init_metrics(&config.metrics)?;
    }

    let agent = Agent::from_config(&config)?;

    match config.agent.startup_mode {
        StartupMode::Monitor => {
            if config.agent.verify_on_start {
                let result = agent.test_connection(ConnectionTestTrigger::Startup).await;
                if !result.is_success() {
                    warn!(result = ?result, "Connection test failed, monitoring anyway");
                }
            }
            agent.start_monitoring();
        }
        StartupMode::TestConnection => {
            let result = agent.test_connection(ConnectionTestTrigger::Probe).await;
            if !result.is_success() {
                warn!(result = ?result, "Connection test failed, monitoring not started");
            }
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    agent.stop().await;
    info!("Monitoring Agent stopped");

    Ok(())
}
