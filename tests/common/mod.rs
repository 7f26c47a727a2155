#![allow(dead_code)]

use async_trait::async_trait;
use cert_sentinel::certs::CertificateSummary;
use cert_sentinel::errors::{DeliveryError, InspectError};
use cert_sentinel::inspector::CertificateSource;
use cert_sentinel::monitor::{Monitor, RemovalPolicy};
use cert_sentinel::notifier::{Messenger, Notifier};
use cert_sentinel::scanner::Scanner;
use cert_sentinel::store::{HostStore, SqliteStore};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers from a table instead of the network.
#[derive(Default)]
pub struct FakeInspector {
    outcomes: Mutex<HashMap<String, Result<DateTime<Utc>, String>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeInspector {
    pub fn set_valid(&self, hostname: &str, expires_at: DateTime<Utc>) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Ok(expires_at));
    }

    pub fn set_failing(&self, hostname: &str, reason: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Err(reason.to_string()));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most inspections that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateSource for FakeInspector {
    async fn inspect(&self, hostname: &str) -> Result<CertificateSummary, InspectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = self.outcomes.lock().unwrap().get(hostname).cloned();
        match outcome {
            Some(Ok(expires_at)) => Ok(CertificateSummary {
                expires_at,
                issuer: "Fake CA".to_string(),
                subject: hostname.to_string(),
                chain_len: 2,
            }),
            Some(Err(reason)) => Err(InspectError::Handshake(
                hostname.to_string(),
                std::io::Error::other(reason),
            )),
            None => Err(InspectError::Connect(
                hostname.to_string(),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no such host"),
            )),
        }
    }
}

/// Keeps every message instead of posting it.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failing_channels: Mutex<HashSet<String>>,
}

impl RecordingMessenger {
    pub fn fail_channel(&self, channel_id: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel_id.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(channel, _)| channel == channel_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        if self.failing_channels.lock().unwrap().contains(channel_id) {
            return Err(DeliveryError::Rejected("channel_not_found".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub inspector: Arc<FakeInspector>,
    pub messenger: Arc<RecordingMessenger>,
    pub scanner: Arc<Scanner>,
    pub monitor: Arc<Monitor>,
}

pub fn harness(removal_policy: RemovalPolicy) -> Harness {
    harness_with_store(
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        removal_policy,
        4,
    )
}

pub fn harness_with_store(
    store: Arc<SqliteStore>,
    removal_policy: RemovalPolicy,
    max_concurrent: usize,
) -> Harness {
    let store_handle: Arc<dyn HostStore> = store.clone();
    build(store, store_handle, removal_policy, max_concurrent)
}

/// Same wiring, but the scanner talks to `store_handle` (e.g. a failing wrapper).
pub fn build(
    store: Arc<SqliteStore>,
    store_handle: Arc<dyn HostStore>,
    removal_policy: RemovalPolicy,
    max_concurrent: usize,
) -> Harness {
    let inspector = Arc::new(FakeInspector::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let scanner = Arc::new(Scanner::new(
        store_handle.clone(),
        inspector.clone(),
        Notifier::new(messenger.clone()),
        max_concurrent,
    ));
    let monitor = Arc::new(Monitor::new(
        store_handle,
        inspector.clone(),
        scanner.clone(),
        removal_policy,
    ));
    Harness {
        store,
        inspector,
        messenger,
        scanner,
        monitor,
    }
}
