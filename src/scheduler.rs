use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::errors::ScanError;
use crate::scanner::{ScanMode, Scanner};
use crate::shutdown::Shutdown;

/// Runs a threshold scan every `every` until shutdown. The first scan happens
/// one full interval after start.
pub async fn run_periodic(
    scanner: Arc<Scanner>,
    every: Duration,
    window_days: i64,
    mut shutdown: Shutdown,
) {
    tracing::info!(
        interval_secs = every.as_secs(),
        window_days,
        "Periodic scan scheduler started"
    );

    let mode = ScanMode::ThresholdAlert { window_days };
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tick.tick() => {}
        }

        match scanner.run_scan(mode, &shutdown).await {
            Ok(report) => tracing::info!(%report, "Periodic scan completed"),
            Err(ScanError::Cancelled(_)) => break,
            Err(ScanError::AlreadyRunning) => {
                tracing::warn!("Skipping periodic scan, another scan is running")
            }
            Err(e) => tracing::error!(error = %e, "Periodic scan failed"),
        }
    }

    tracing::info!("Periodic scan scheduler stopped");
}
