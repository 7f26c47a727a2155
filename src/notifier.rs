use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::DeliveryError;
use crate::formatter::{expiry_message, failure_message};
use crate::host::{Host, HostStatus};

/// Outbound messaging capability: put `text` in front of `channel_id`.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError>;
}

/// One (host, channel) pair whose alert did not go out.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub channel_id: String,
    pub hostname: String,
    pub error: DeliveryError,
}

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    pub async fn notify(
        &self,
        channel_id: &str,
        hostname: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let text = expiry_message(hostname, expires_at, Utc::now());
        self.deliver(channel_id, hostname, &text).await
    }

    pub async fn notify_failure(
        &self,
        channel_id: &str,
        host: &Host,
    ) -> Result<(), DeliveryError> {
        let text = failure_message(&host.hostname, &host.error_message, host.expires_at, Utc::now());
        self.deliver(channel_id, &host.hostname, &text).await
    }

    /// Picks the expiry alert or the failure notice depending on host state.
    pub async fn notify_host(&self, channel_id: &str, host: &Host) -> Result<(), DeliveryError> {
        match (host.status, host.expires_at) {
            (HostStatus::Valid, Some(expires_at)) => {
                self.notify(channel_id, &host.hostname, expires_at).await
            }
            _ => self.notify_failure(channel_id, host).await,
        }
    }

    /// Sends to every channel, collecting failures instead of stopping at the first.
    pub async fn notify_all(&self, channels: &[String], host: &Host) -> (usize, Vec<DeliveryFailure>) {
        let mut delivered = 0;
        let mut failures = Vec::new();
        for channel_id in channels {
            match self.notify_host(channel_id, host).await {
                Ok(()) => delivered += 1,
                Err(error) => failures.push(DeliveryFailure {
                    channel_id: channel_id.clone(),
                    hostname: host.hostname.clone(),
                    error,
                }),
            }
        }
        (delivered, failures)
    }

    async fn deliver(&self, channel_id: &str, hostname: &str, text: &str) -> Result<(), DeliveryError> {
        match self.messenger.send(channel_id, text).await {
            Ok(()) => {
                tracing::info!(channel_id, hostname, "Notification delivered");
                Ok(())
            }
            Err(e) => {
                tracing::error!(channel_id, hostname, error = %e, "Notification delivery failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        failing_channel: Option<String>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
            if self.failing_channel.as_deref() == Some(channel_id) {
                return Err(DeliveryError::Rejected("channel_not_found".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn valid_host(expires_at: DateTime<Utc>) -> Host {
        Host {
            expires_at: Some(expires_at),
            issuer: Some("Example CA".to_string()),
            status: HostStatus::Valid,
            last_checked_at: Some(Utc::now()),
            ..Host::new("example.com")
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_stop_the_rest() {
        let messenger = Arc::new(RecordingMessenger {
            failing_channel: Some("CA".to_string()),
            ..RecordingMessenger::default()
        });
        let notifier = Notifier::new(messenger.clone());
        let host = valid_host(Utc::now() + Duration::days(5));

        let (delivered, failures) = notifier
            .notify_all(&["CA".to_string(), "CB".to_string()], &host)
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].channel_id, "CA");
        assert_eq!(failures[0].hostname, "example.com");

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "CB");
        assert!(sent[0].1.starts_with("example.com's certificate expires in"));
    }

    #[tokio::test]
    async fn error_host_gets_failure_notice() {
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Notifier::new(messenger.clone());
        let host = Host {
            status: HostStatus::Error,
            error_message: "Timed out talking to example.com".to_string(),
            ..Host::new("example.com")
        };

        notifier.notify_host("C1", &host).await.unwrap();

        let sent = messenger.sent.lock().unwrap();
        assert!(sent[0].1.contains("Could not check example.com's certificate"));
    }
}
