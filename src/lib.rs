pub mod certs;
pub mod commands;
pub mod config;
pub mod errors;
pub mod formatter;
pub mod host;
pub mod inspector;
pub mod monitor;
pub mod notifier;
pub mod scanner;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod signature;
pub mod slack;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::inspector::{CertificateSource, TlsInspector};
use crate::monitor::Monitor;
use crate::notifier::Notifier;
use crate::scanner::Scanner;
use crate::server::AppState;
use crate::shutdown::Shutdown;
use crate::slack::SlackMessenger;
use crate::store::{HostStore, SqliteStore};

pub use crate::certs::CertificateSummary;
pub use crate::host::{Host, HostStatus};
pub use crate::scanner::{ScanMode, ScanReport};

/// Wires store, inspector, notifier, scheduler and the command endpoint, then
/// serves until `shutdown` fires.
pub async fn run(app_config: AppConfig, shutdown: Shutdown) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        database = %app_config.database_path.display(),
        alert_window_days = app_config.alert_window_days,
        removal_policy = ?app_config.removal_policy,
        "Starting certificate monitor"
    );

    let store: Arc<dyn HostStore> = Arc::new(SqliteStore::open(&app_config.database_path)?);
    let inspector: Arc<dyn CertificateSource> = Arc::new(TlsInspector::new(
        app_config.tls_port,
        app_config.connect_timeout,
    )?);

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    let notifier = Notifier::new(Arc::new(SlackMessenger::new(
        client,
        app_config.slack_api_url.clone(),
        app_config.slack_bot_token.clone(),
    )));

    let scanner = Arc::new(Scanner::new(
        store.clone(),
        inspector.clone(),
        notifier,
        app_config.max_concurrent_checks,
    ));
    let monitor = Arc::new(Monitor::new(
        store,
        inspector,
        scanner.clone(),
        app_config.removal_policy,
    ));

    let scheduler = tokio::spawn(scheduler::run_periodic(
        scanner,
        app_config.scan_interval,
        app_config.alert_window_days,
        shutdown.clone(),
    ));

    let app = server::router(
        AppState {
            monitor,
            shutdown: shutdown.clone(),
        },
        app_config.slack_signing_secret.clone(),
    );
    let listener = tokio::net::TcpListener::bind(app_config.listen_addr).await?;
    tracing::info!(addr = %app_config.listen_addr, "Listening for commands");

    let mut server_shutdown = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await?;

    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }
    tracing::info!("Certificate monitor stopped");
    Ok(())
}
