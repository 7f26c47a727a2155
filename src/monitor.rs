use std::str::FromStr;
use std::sync::Arc;

use crate::certs::CertificateSummary;
use crate::errors::{InspectError, ScanError, StoreError};
use crate::host::Host;
use crate::inspector::CertificateSource;
use crate::scanner::{ScanMode, ScanReport, Scanner};
use crate::shutdown::Shutdown;
use crate::store::HostStore;

/// What happens to a host when a channel unsubscribes from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Drop the host once its last subscription is gone.
    #[default]
    WhenUnsubscribed,
    /// Drop the host (and every other subscription to it) straight away.
    Always,
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "when-unsubscribed" => Ok(RemovalPolicy::WhenUnsubscribed),
            "always" => Ok(RemovalPolicy::Always),
            other => Err(format!(
                "expected 'when-unsubscribed' or 'always', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    NotSubscribed,
    Unsubscribed,
    HostRemoved,
}

/// Entry points used by the inbound command surface.
pub struct Monitor {
    store: Arc<dyn HostStore>,
    inspector: Arc<dyn CertificateSource>,
    scanner: Arc<Scanner>,
    removal_policy: RemovalPolicy,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn HostStore>,
        inspector: Arc<dyn CertificateSource>,
        scanner: Arc<Scanner>,
        removal_policy: RemovalPolicy,
    ) -> Self {
        Self {
            store,
            inspector,
            scanner,
            removal_policy,
        }
    }

    /// Registers the host if it is new and subscribes the channel, then checks
    /// a new host before returning. Re-adding an existing host keeps its state.
    pub async fn add_and_subscribe(
        &self,
        channel_id: &str,
        hostname: &str,
    ) -> Result<Host, StoreError> {
        let (mut host, created) = self.store.create_host(hostname)?;
        if created {
            tracing::info!(hostname, "New host registered");
        }
        if self.store.subscribe(hostname, channel_id)? {
            tracing::info!(hostname, channel_id, "Channel subscribed");
        }
        if created {
            if let Some(checked) = self.scanner.check_host(hostname).await? {
                host = checked;
            }
        }
        Ok(host)
    }

    pub fn remove(&self, channel_id: &str, hostname: &str) -> Result<Removal, StoreError> {
        if !self.store.unsubscribe(hostname, channel_id)? {
            return Ok(Removal::NotSubscribed);
        }
        tracing::info!(hostname, channel_id, "Channel unsubscribed");

        let remove_host = match self.removal_policy {
            RemovalPolicy::Always => true,
            RemovalPolicy::WhenUnsubscribed => self.store.count_subscribers(hostname)? == 0,
        };
        if remove_host {
            self.store.delete_host(hostname)?;
            tracing::info!(hostname, policy = ?self.removal_policy, "Host removed");
            return Ok(Removal::HostRemoved);
        }
        Ok(Removal::Unsubscribed)
    }

    /// One-off inspection; nothing is stored.
    pub async fn check(&self, hostname: &str) -> Result<CertificateSummary, InspectError> {
        self.inspector.inspect(hostname).await
    }

    pub async fn run_full(&self, shutdown: &Shutdown) -> Result<ScanReport, ScanError> {
        self.scanner.run_scan(ScanMode::Full, shutdown).await
    }
}
