mod commands;
mod http;
mod ops;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use restream_core::{logging, Config};

#[derive(Parser)]
#[command(name = "restream", about = "Webhook-driven live stream relay service", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "RESTREAM_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        anyhow::bail!("Configuration validation failed with {} error(s)", errors.len());
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Relay service starting...");
    info!("HTTP address: {}", config.http_address());
    info!("Webhook callback: {}", config.webhook_callback_url());

    // 4. Build shared state (settings store, platform clients, session manager)
    let bind_addr = config.http_address();
    let state = http::AppState::from_config(config).await?;

    // 5. Serve until shutdown
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, http::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Relay service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
