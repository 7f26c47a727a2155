use std::{fmt, path::PathBuf};

use crate::scanner::ScanReport;

// --- Configuration Error Type ---
#[derive(Debug)]
pub enum ConfigError {
    FileReadError(PathBuf, std::io::Error),
    TomlParseError(PathBuf, toml::de::Error),
    FileNotFound(PathBuf),
    MissingBotToken,
    MissingSigningSecret,
    InvalidListenAddr(String),
    InvalidValue(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileReadError(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::TomlParseError(path, err) => {
                write!(f, "Failed to parse TOML from {:?}: {}", path, err)
            }
            ConfigError::FileNotFound(path) => write!(
                f,
                "Configuration file {:?} not found. Ensure the path is correct and the file exists.",
                path
            ),
            ConfigError::MissingBotToken => write!(
                f,
                "No Slack bot token provided. Set --slack-bot-token, SLACK_BOT_TOKEN or 'slack_bot_token' in the configuration file."
            ),
            ConfigError::MissingSigningSecret => write!(
                f,
                "No Slack signing secret provided. Set --slack-signing-secret, SLACK_SIGNING_SECRET or 'slack_signing_secret' in the configuration file."
            ),
            ConfigError::InvalidListenAddr(addr) => {
                write!(f, "Listen address '{}' is not a valid socket address", addr)
            }
            ConfigError::InvalidValue(key, reason) => {
                write!(f, "Invalid value for '{}': {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// --- Certificate Inspection Error Type ---
#[derive(Debug)]
pub enum InspectError {
    InvalidHostname(String),
    Connect(String, std::io::Error),
    Timeout(String),
    Handshake(String, std::io::Error),
    NoCertificates(String),
    CertificateParse(String),
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectError::InvalidHostname(host) => write!(f, "Invalid hostname '{}'", host),
            InspectError::Connect(host, err) => {
                write!(f, "Could not connect to {}: {}", host, err)
            }
            InspectError::Timeout(host) => write!(f, "Timed out talking to {}", host),
            InspectError::Handshake(host, err) => {
                write!(f, "TLS handshake with {} failed: {}", host, err)
            }
            InspectError::NoCertificates(host) => {
                write!(f, "No certificates presented by {}", host)
            }
            InspectError::CertificateParse(reason) => {
                write!(f, "Failed to parse certificate: {}", reason)
            }
        }
    }
}

impl std::error::Error for InspectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InspectError::Connect(_, err) => Some(err),
            InspectError::Handshake(_, err) => Some(err),
            _ => None,
        }
    }
}

// --- Host State Store Error Type ---
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    CorruptRow(String),
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(err) => write!(f, "Database error: {}", err),
            StoreError::CorruptRow(reason) => write!(f, "Corrupt stored row: {}", reason),
            StoreError::LockPoisoned => write!(f, "Database connection lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

// --- Notification Delivery Error Type ---
#[derive(Debug)]
pub enum DeliveryError {
    NetworkError(reqwest::Error),
    HttpStatus(u16, String),
    Rejected(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::NetworkError(err) => write!(f, "Network error: {}", err),
            DeliveryError::HttpStatus(status, body) => {
                write!(f, "Messaging endpoint answered {}: {}", status, body)
            }
            DeliveryError::Rejected(code) => write!(f, "Message rejected: {}", code),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeliveryError::NetworkError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::NetworkError(err)
    }
}

// --- Inbound Command Error Type ---
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    UnknownAction(String),
    MissingHostname(&'static str),
    UnexpectedArguments(&'static str),
    InvalidHostname(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "No action given"),
            CommandError::UnknownAction(action) => write!(f, "Unknown action '{}'", action),
            CommandError::MissingHostname(action) => {
                write!(f, "Missing hostname, usage: {} <hostname>", action)
            }
            CommandError::UnexpectedArguments(action) => {
                write!(f, "'{}' takes no further arguments", action)
            }
            CommandError::InvalidHostname(host) => {
                write!(f, "'{}' is not a valid hostname", host)
            }
        }
    }
}

impl std::error::Error for CommandError {}

// --- Scan Error Type ---
#[derive(Debug)]
pub enum ScanError {
    AlreadyRunning,
    Cancelled(ScanReport),
    Persistence(StoreError),
    PartialDelivery(ScanReport),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::AlreadyRunning => write!(f, "A scan is already in progress"),
            ScanError::Cancelled(report) => {
                write!(f, "Scan cancelled after {} hosts", report.checked)
            }
            ScanError::Persistence(err) => write!(f, "Scan aborted: {}", err),
            ScanError::PartialDelivery(report) => write!(
                f,
                "{} of {} notifications could not be delivered",
                report.delivery_failures.len(),
                report.delivery_failures.len() + report.notified
            ),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        ScanError::Persistence(err)
    }
}

// --- Inbound Request Signature Error Type ---
#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    MissingTimestamp,
    MissingSignature,
    InvalidTimestamp(String),
    StaleTimestamp(u64),
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::MissingTimestamp => write!(f, "Missing request timestamp header"),
            SignatureError::MissingSignature => write!(f, "Missing request signature header"),
            SignatureError::InvalidTimestamp(raw) => {
                write!(f, "Request timestamp '{}' is not a unix time", raw)
            }
            SignatureError::StaleTimestamp(age) => {
                write!(f, "Request timestamp is {} seconds away from now", age)
            }
            SignatureError::Mismatch => write!(f, "Request signature does not match"),
        }
    }
}

impl std::error::Error for SignatureError {}
