use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

use crate::certs::CertificateSummary;
use crate::host::HostStatus;
use crate::notifier::DeliveryFailure;
use crate::scanner::{ScanMode, ScanReport};

pub const GREEN_TICK: char = '\u{2705}';
pub const RED_CROSS: char = '\u{274C}';
pub const WHITE_QUESTION: char = '\u{2754}';
pub const WARNING_SIGN: char = '\u{26A0}';

impl Display for HostStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output_char = match &self {
            HostStatus::Unknown => WHITE_QUESTION,
            HostStatus::Valid => GREEN_TICK,
            HostStatus::Error => RED_CROSS,
        };

        write!(f, "{0} {1}", output_char, self.as_str())
    }
}

impl Display for ScanMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Full => write!(f, "full"),
            ScanMode::ThresholdAlert { window_days } => write!(f, "threshold({window_days}d)"),
        }
    }
}

impl Display for DeliveryFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{0} -> {1}: {2}",
            self.hostname, self.channel_id, self.error
        )
    }
}

impl Display for ScanReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Checked {0} hosts ({1} failed), sent {2} notifications",
            self.checked, self.failed_checks, self.notified
        )?;
        if !self.delivery_failures.is_empty() {
            write!(
                f,
                " {0} {1} could not be delivered",
                WARNING_SIGN,
                self.delivery_failures.len()
            )?;
        }
        Ok(())
    }
}

/// "expires in 12 days", "expired 3 days ago" and friends.
pub fn relative_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if expires_at < now {
        match (now - expires_at).num_days() {
            0 => "expired less than a day ago".to_string(),
            1 => "expired 1 day ago".to_string(),
            days => format!("expired {days} days ago"),
        }
    } else {
        match (expires_at - now).num_days() {
            0 => "expires in less than a day".to_string(),
            1 => "expires in 1 day".to_string(),
            days => format!("expires in {days} days"),
        }
    }
}

pub fn expiry_message(hostname: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "{hostname}'s certificate {} ({})",
        relative_expiry(expires_at, now),
        expires_at.to_rfc2822()
    )
}

pub fn failure_message(
    hostname: &str,
    error_message: &str,
    last_known_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let mut message = format!("{RED_CROSS} Could not check {hostname}'s certificate: {error_message}");
    if let Some(expires_at) = last_known_expiry {
        message.push_str(&format!(
            ". Last known certificate {} ({})",
            relative_expiry(expires_at, now),
            expires_at.to_rfc2822()
        ));
    }
    message
}

pub fn check_message(hostname: &str, summary: &CertificateSummary, now: DateTime<Utc>) -> String {
    format!(
        "{hostname}'s certificate is issued by {} and {} ({})",
        summary.issuer,
        relative_expiry(summary.expires_at, now),
        summary.expires_at.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_expiry_future_and_past() {
        let now = now();
        assert_eq!(relative_expiry(now + Duration::days(12), now), "expires in 12 days");
        assert_eq!(relative_expiry(now + Duration::hours(30), now), "expires in 1 day");
        assert_eq!(
            relative_expiry(now + Duration::hours(3), now),
            "expires in less than a day"
        );
        assert_eq!(relative_expiry(now - Duration::days(3), now), "expired 3 days ago");
        assert_eq!(
            relative_expiry(now - Duration::minutes(10), now),
            "expired less than a day ago"
        );
    }

    #[test]
    fn expiry_message_has_host_relative_and_absolute_time() {
        let now = now();
        let expires_at = now + Duration::days(10);
        let message = expiry_message("example.com", expires_at, now);
        assert_eq!(
            message,
            "example.com's certificate expires in 10 days (Wed, 11 Mar 2026 12:00:00 +0000)"
        );
    }

    #[test]
    fn failure_message_mentions_last_known_expiry() {
        let now = now();
        let message = failure_message(
            "example.com",
            "Timed out talking to example.com",
            Some(now + Duration::days(5)),
            now,
        );
        assert!(message.contains("Could not check example.com's certificate"));
        assert!(message.contains("Timed out talking to example.com"));
        assert!(message.contains("expires in 5 days"));

        let without = failure_message("example.com", "boom", None, now);
        assert!(!without.contains("Last known"));
    }

    #[test]
    fn scan_report_summary() {
        let report = ScanReport {
            checked: 3,
            failed_checks: 1,
            notified: 2,
            ..ScanReport::default()
        };
        assert_eq!(
            report.to_string(),
            "Checked 3 hosts (1 failed), sent 2 notifications"
        );
    }
}
