use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use crate::certs::CertificateSummary;
use crate::errors::InspectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Unknown,
    Valid,
    Error,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Unknown => "unknown",
            HostStatus::Valid => "valid",
            HostStatus::Error => "error",
        }
    }
}

impl FromStr for HostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(HostStatus::Unknown),
            "valid" => Ok(HostStatus::Valid),
            "error" => Ok(HostStatus::Error),
            other => Err(format!("unknown host status '{}'", other)),
        }
    }
}

/// Last known state of a monitored hostname.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub hostname: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub status: HostStatus,
    pub error_message: String,
}

impl Host {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            last_checked_at: None,
            expires_at: None,
            issuer: None,
            status: HostStatus::Unknown,
            error_message: String::new(),
        }
    }

    /// Folds one inspection result into the host.
    ///
    /// A failed check only touches `status`, `error_message` and `last_checked_at`;
    /// the last good `expires_at`/`issuer` stay so threshold checks keep working
    /// through transient outages.
    pub fn apply_check(
        &mut self,
        outcome: &Result<CertificateSummary, InspectError>,
        checked_at: DateTime<Utc>,
    ) {
        match outcome {
            Ok(summary) => {
                self.status = HostStatus::Valid;
                self.error_message.clear();
                self.expires_at = Some(summary.expires_at);
                self.issuer = Some(summary.issuer.clone());
            }
            Err(err) => {
                self.status = HostStatus::Error;
                self.error_message = err.to_string();
            }
        }
        self.last_checked_at = Some(checked_at);
    }

    /// True when the known expiry falls before `now + window`.
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => match now.checked_add_signed(window) {
                Some(deadline) => expires_at < deadline,
                None => true,
            },
            None => false,
        }
    }
}
