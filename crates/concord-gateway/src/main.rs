//! Concord Gateway Server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p concord-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use concord_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so the log format can follow the environment
    let config = AppConfig::from_env()?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!("Starting Concord Gateway...");
    config.validate()?;

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        version = config.gateway.version,
        "Configuration loaded"
    );

    concord_gateway::run(config).await?;

    Ok(())
}
