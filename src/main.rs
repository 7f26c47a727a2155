use cert_sentinel::config::{AppConfig, CliArgs};
use cert_sentinel::{run, shutdown};
use clap::Parser; // Needed to use CliArgs:parse
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args = CliArgs::parse();
    let app_config = AppConfig::build(cli_args)?;

    // Initialize tracing subscriber
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("cert_sentinel={}", &app_config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("cert_sentinel=info")); // Fallback to default if parsing fails

    tracing_fmt().with_env_filter(env_filter).init();

    tracing::info!("Logger initialized");
    tracing::debug!(config = ?app_config, "Effective configuration loaded");

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for ctrl-c, shutting down"),
        }
        trigger.trigger();
    });

    run(app_config, shutdown).await
}
