use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use live_notify::api::{ApiServer, AppState};
use live_notify::config::{AppConfig, DEFAULT_CONFIG_PATH};
use live_notify::logging;
use live_notify::services::ServiceContainer;

#[derive(Debug, Parser)]
#[command(name = "live-notify", version, about = "Live room notifier")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "LIVE_NOTIFY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!("live-notify {} starting", env!("CARGO_PKG_VERSION"));

    let services = Arc::new(
        ServiceContainer::build(&config)
            .await
            .context("failed to initialize services")?,
    );
    services.start();

    let api = if config.api.enabled {
        let server = ApiServer::new(
            config.api_bind()?,
            AppState::new(Arc::clone(&services)),
            services.cancellation_token().child_token(),
        );
        Some(server.spawn().await.context("failed to start API server")?)
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    // In-flight API requests are answered while the pool is still open.
    if let Some(api) = api
        && let Err(e) = api.stop().await
    {
        tracing::error!("API server failed: {}", e);
    }
    services.shutdown().await?;

    Ok(())
}
