use clap::Parser;
use serde::Deserialize;
use std::{fs, net::SocketAddr, path::PathBuf, time::Duration};

use crate::errors::ConfigError;
use crate::inspector::DEFAULT_TLS_PORT;
use crate::monitor::RemovalPolicy;
use crate::scanner::{
    DEFAULT_ALERT_WINDOW_DAYS, DEFAULT_MAX_CONCURRENT_CHECKS, MAX_ALERT_WINDOW_DAYS,
};
use crate::slack::DEFAULT_POST_MESSAGE_URL;

// Default values for the application
const DEFAULT_DATABASE_PATH: &str = "cert_sentinel.db";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SCAN_INTERVAL_HOURS: u64 = 24;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_LOG_LEVEL: &str = "info";

// --- Final application configuration structure ---
pub struct AppConfig {
    pub database_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub slack_bot_token: String,
    pub slack_signing_secret: String,
    pub slack_api_url: String,
    pub alert_window_days: i64,
    pub scan_interval: Duration,
    pub connect_timeout: Duration,
    pub tls_port: u16,
    pub max_concurrent_checks: usize,
    pub removal_policy: RemovalPolicy,
    pub log_level: String,
}

// Secrets stay out of debug logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("listen_addr", &self.listen_addr)
            .field("slack_bot_token", &"<redacted>")
            .field("slack_signing_secret", &"<redacted>")
            .field("slack_api_url", &self.slack_api_url)
            .field("alert_window_days", &self.alert_window_days)
            .field("scan_interval", &self.scan_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("tls_port", &self.tls_port)
            .field("max_concurrent_checks", &self.max_concurrent_checks)
            .field("removal_policy", &self.removal_policy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

// --- Configuration structure for TOML file ---
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    database_path: Option<PathBuf>,
    listen_addr: Option<String>,
    slack_bot_token: Option<String>,
    slack_signing_secret: Option<String>,
    slack_api_url: Option<String>,
    alert_window_days: Option<i64>,
    scan_interval_hours: Option<u64>,
    connect_timeout_ms: Option<u64>,
    tls_port: Option<u16>,
    max_concurrent_checks: Option<usize>,
    removal_policy: Option<String>,
    log_level: Option<String>,
}

impl AppConfig {
    pub fn build(args: CliArgs) -> Result<Self, ConfigError> {
        let mut toml_config = TomlConfig::default();

        if let Some(path_to_load) = &args.config_file {
            if !path_to_load.exists() {
                return Err(ConfigError::FileNotFound(path_to_load.clone()));
            }
            let toml_content = fs::read_to_string(path_to_load)
                .map_err(|e| ConfigError::FileReadError(path_to_load.clone(), e))?;
            toml_config = toml::from_str(&toml_content)
                .map_err(|e| ConfigError::TomlParseError(path_to_load.clone(), e))?;
        }

        let slack_bot_token = args
            .slack_bot_token
            .or(toml_config.slack_bot_token)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingBotToken)?;
        let slack_signing_secret = args
            .slack_signing_secret
            .or(toml_config.slack_signing_secret)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingSigningSecret)?;

        let listen_addr = args
            .listen_addr
            .or(toml_config.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListenAddr(listen_addr.clone()))?;

        let alert_window_days = args
            .alert_window_days
            .or(toml_config.alert_window_days)
            .unwrap_or(DEFAULT_ALERT_WINDOW_DAYS);
        if !(1..=MAX_ALERT_WINDOW_DAYS).contains(&alert_window_days) {
            return Err(ConfigError::InvalidValue(
                "alert_window_days",
                format!("must be between 1 and {MAX_ALERT_WINDOW_DAYS}"),
            ));
        }

        let scan_interval_hours = args
            .scan_interval_hours
            .or(toml_config.scan_interval_hours)
            .unwrap_or(DEFAULT_SCAN_INTERVAL_HOURS);
        if scan_interval_hours == 0 {
            return Err(ConfigError::InvalidValue(
                "scan_interval_hours",
                "must be at least 1".to_string(),
            ));
        }

        let connect_timeout_ms = args
            .connect_timeout_ms
            .or(toml_config.connect_timeout_ms)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
        if connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "connect_timeout_ms",
                "must be at least 1".to_string(),
            ));
        }

        let max_concurrent_checks = args
            .max_concurrent_checks
            .or(toml_config.max_concurrent_checks)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_CHECKS);
        if max_concurrent_checks == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent_checks",
                "must be at least 1".to_string(),
            ));
        }

        let removal_policy = match args.removal_policy.or(toml_config.removal_policy) {
            Some(raw) => raw
                .parse::<RemovalPolicy>()
                .map_err(|reason| ConfigError::InvalidValue("removal_policy", reason))?,
            None => RemovalPolicy::default(),
        };

        Ok(AppConfig {
            database_path: args
                .database_path
                .or(toml_config.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            listen_addr,
            slack_bot_token,
            slack_signing_secret,
            slack_api_url: args
                .slack_api_url
                .or(toml_config.slack_api_url)
                .unwrap_or_else(|| DEFAULT_POST_MESSAGE_URL.to_string()),
            alert_window_days,
            scan_interval: Duration::from_secs(scan_interval_hours * 60 * 60),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            tls_port: args
                .tls_port
                .or(toml_config.tls_port)
                .unwrap_or(DEFAULT_TLS_PORT),
            max_concurrent_checks,
            removal_policy,
            log_level: args
                .log_level
                .or(toml_config.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

// --- CLI arguments structure using clap ---
#[derive(Parser, Debug)]
#[clap(author, version, about = "TLS certificate expiry monitor with Slack alerts", long_about = None)]
pub struct CliArgs {
    /// Path to the SQLite database holding hosts and subscriptions
    #[clap(short, long, value_name = "FILE_PATH")]
    database_path: Option<PathBuf>,

    /// Address the slash-command endpoint listens on
    #[clap(long, value_name = "ADDR")]
    listen_addr: Option<String>,

    /// Slack bot token used to post alerts
    #[clap(long, env = "SLACK_BOT_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    slack_bot_token: Option<String>,

    /// Slack signing secret used to verify inbound commands
    #[clap(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true, value_name = "SECRET")]
    slack_signing_secret: Option<String>,

    /// Slack chat.postMessage endpoint
    #[clap(long, value_name = "URL")]
    slack_api_url: Option<String>,

    /// Alert when a certificate expires within this many days
    #[clap(short = 'w', long, value_name = "DAYS")]
    alert_window_days: Option<i64>,

    /// Hours between unattended threshold scans
    #[clap(long, value_name = "HOURS")]
    scan_interval_hours: Option<u64>,

    /// Connect and handshake deadline per host, in milliseconds
    #[clap(long, value_name = "MILLIS")]
    connect_timeout_ms: Option<u64>,

    /// Port dialed for TLS inspection
    #[clap(long, value_name = "PORT")]
    tls_port: Option<u16>,

    /// Maximum number of hosts checked at once
    #[clap(long, value_name = "COUNT")]
    max_concurrent_checks: Option<usize>,

    /// When to drop a host on remove: when-unsubscribed or always
    #[clap(long, value_name = "POLICY")]
    removal_policy: Option<String>,

    /// Logging level (e.g., error, warn, info, debug, trace)
    #[clap(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file
    #[clap(short, long, value_name = "FILE_PATH")]
    config_file: Option<PathBuf>,
}
