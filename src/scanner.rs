use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::certs::CertificateSummary;
use crate::errors::{InspectError, ScanError, StoreError};
use crate::host::Host;
use crate::inspector::CertificateSource;
use crate::notifier::{DeliveryFailure, Notifier};
use crate::shutdown::Shutdown;
use crate::store::HostStore;

pub const DEFAULT_ALERT_WINDOW_DAYS: i64 = 21;
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;
pub const MAX_ALERT_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Notify every subscriber of every host, whatever the expiry.
    Full,
    /// Notify only for hosts expiring within `window_days`.
    ThresholdAlert { window_days: i64 },
}

impl ScanMode {
    pub fn is_notify_worthy(&self, host: &Host, now: DateTime<Utc>) -> bool {
        match self {
            ScanMode::Full => true,
            ScanMode::ThresholdAlert { window_days } => match Duration::try_days(*window_days) {
                Some(window) => host.expires_within(now, window),
                // Wider than any representable time: every known expiry is inside.
                None => host.expires_at.is_some(),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub checked: usize,
    pub failed_checks: usize,
    /// Hosts removed while the scan was running.
    pub skipped: usize,
    pub notified: usize,
    pub delivery_failures: Vec<DeliveryFailure>,
}

/// Runs scans over every stored host. At most one scan runs at a time; the
/// scheduler and the command handler share one `Scanner` behind an `Arc`.
pub struct Scanner {
    store: Arc<dyn HostStore>,
    inspector: Arc<dyn CertificateSource>,
    notifier: Notifier,
    max_concurrent: usize,
    in_progress: Mutex<()>,
}

impl Scanner {
    pub fn new(
        store: Arc<dyn HostStore>,
        inspector: Arc<dyn CertificateSource>,
        notifier: Notifier,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            inspector,
            notifier,
            max_concurrent: max_concurrent.max(1),
            in_progress: Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.try_lock().is_err()
    }

    /// Inspects one host and records the result. `None` if the host is not stored.
    pub async fn check_host(&self, hostname: &str) -> Result<Option<Host>, StoreError> {
        let outcome = self.inspector.inspect(hostname).await;
        log_outcome(hostname, &outcome);
        self.store.record_check(hostname, &outcome, Utc::now())
    }

    pub async fn run_scan(
        &self,
        mode: ScanMode,
        shutdown: &Shutdown,
    ) -> Result<ScanReport, ScanError> {
        let _running = self
            .in_progress
            .try_lock()
            .map_err(|_| ScanError::AlreadyRunning)?;
        let mut shutdown = shutdown.clone();

        let hosts = self.store.list_hosts()?;
        tracing::info!(%mode, hosts = hosts.len(), "Scan started");

        // Checks run as their own tasks so handshakes keep progressing while
        // results are being persisted and delivered below.
        let inspector = self.inspector.clone();
        let mut checks = stream::iter(hosts)
            .map(|host| {
                let inspector = inspector.clone();
                async move {
                    let hostname = host.hostname;
                    let task_hostname = hostname.clone();
                    let joined =
                        tokio::spawn(async move { inspector.inspect(&task_hostname).await }).await;
                    (hostname, joined)
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut report = ScanReport::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::warn!(checked = report.checked, "Scan cancelled");
                    return Err(ScanError::Cancelled(report));
                }
                next = checks.next() => next,
            };
            let Some((hostname, joined)) = next else {
                break;
            };

            match joined {
                Ok(outcome) => self.process(&hostname, outcome, mode, &mut report).await?,
                Err(e) => {
                    report.checked += 1;
                    report.failed_checks += 1;
                    tracing::error!(hostname, error = %e, "Certificate check task failed");
                }
            }
        }

        tracing::info!(%mode, %report, "Scan finished");
        if report.delivery_failures.is_empty() {
            Ok(report)
        } else {
            for failure in &report.delivery_failures {
                tracing::error!(%failure, "Undelivered notification");
            }
            Err(ScanError::PartialDelivery(report))
        }
    }

    async fn process(
        &self,
        hostname: &str,
        outcome: Result<CertificateSummary, InspectError>,
        mode: ScanMode,
        report: &mut ScanReport,
    ) -> Result<(), ScanError> {
        report.checked += 1;
        if outcome.is_err() {
            report.failed_checks += 1;
        }
        log_outcome(hostname, &outcome);

        let now = Utc::now();
        let Some(host) = self.store.record_check(hostname, &outcome, now)? else {
            tracing::debug!(hostname, "Host removed during scan, skipping");
            report.skipped += 1;
            return Ok(());
        };

        if !mode.is_notify_worthy(&host, now) {
            return Ok(());
        }

        let channels = self.store.list_subscribers_for(hostname)?;
        if channels.is_empty() {
            tracing::debug!(hostname, "No subscribers to notify");
            return Ok(());
        }

        let (delivered, failures) = self.notifier.notify_all(&channels, &host).await;
        report.notified += delivered;
        report.delivery_failures.extend(failures);
        Ok(())
    }
}

fn log_outcome(hostname: &str, outcome: &Result<CertificateSummary, InspectError>) {
    match outcome {
        Ok(summary) => tracing::info!(
            hostname,
            expires_at = %summary.expires_at,
            issuer = %summary.issuer,
            "Certificate checked"
        ),
        Err(e) => tracing::warn!(hostname, error = %e, "Certificate check failed"),
    }
}
