use chrono::Utc;

use crate::errors::{CommandError, ScanError};
use crate::formatter::{GREEN_TICK, RED_CROSS, check_message, relative_expiry};
use crate::host::HostStatus;
use crate::monitor::{Monitor, Removal};
use crate::shutdown::Shutdown;

pub const HELP_TEXT: &str = "Available actions:\n\
    add <hostname> - monitor a hostname and notify this channel before it expires\n\
    remove <hostname> - stop notifying this channel about a hostname\n\
    check <hostname> - inspect a hostname's certificate right now\n\
    run - check every monitored hostname and notify all subscribers\n\
    help - show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    Check(String),
    Run,
    Help,
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut tokens = text.split_whitespace();
        let action = tokens.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match action.to_ascii_lowercase().as_str() {
            "add" => Ok(Command::Add(single_hostname("add", &args)?)),
            "remove" => Ok(Command::Remove(single_hostname("remove", &args)?)),
            "check" => Ok(Command::Check(single_hostname("check", &args)?)),
            "run" => no_arguments("run", &args).map(|_| Command::Run),
            "help" => no_arguments("help", &args).map(|_| Command::Help),
            _ => Err(CommandError::UnknownAction(action.to_string())),
        }
    }

    pub async fn execute(&self, monitor: &Monitor, channel_id: &str, shutdown: &Shutdown) -> String {
        tracing::info!(channel_id, command = ?self, "Executing command");
        match self {
            Command::Add(hostname) => match monitor.add_and_subscribe(channel_id, hostname).await {
                Ok(host) => match (host.status, host.expires_at) {
                    (HostStatus::Valid, Some(expires_at)) => format!(
                        "{GREEN_TICK} Now monitoring {hostname}, its certificate {}",
                        relative_expiry(expires_at, Utc::now())
                    ),
                    (HostStatus::Error, _) => format!(
                        "{RED_CROSS} Now monitoring {hostname}, but the check failed: {}",
                        host.error_message
                    ),
                    _ => format!("Now monitoring {hostname}"),
                },
                Err(e) => {
                    tracing::error!(hostname, error = %e, "Add failed");
                    format!("Could not add {hostname}: {e}")
                }
            },
            Command::Remove(hostname) => match monitor.remove(channel_id, hostname) {
                Ok(Removal::NotSubscribed) => {
                    format!("{hostname} is not monitored for this channel")
                }
                Ok(Removal::Unsubscribed) => {
                    format!("Stopped notifying this channel about {hostname}")
                }
                Ok(Removal::HostRemoved) => format!("Stopped monitoring {hostname}"),
                Err(e) => {
                    tracing::error!(hostname, error = %e, "Remove failed");
                    format!("Could not remove {hostname}: {e}")
                }
            },
            Command::Check(hostname) => match monitor.check(hostname).await {
                Ok(summary) => check_message(hostname, &summary, Utc::now()),
                Err(e) => format!("{RED_CROSS} Could not check {hostname}: {e}"),
            },
            Command::Run => match monitor.run_full(shutdown).await {
                Ok(report) => format!("Scan complete. {report}"),
                Err(ScanError::PartialDelivery(report)) => format!("Scan complete. {report}"),
                Err(ScanError::AlreadyRunning) => {
                    "A scan is already running, try again in a moment".to_string()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Requested scan failed");
                    format!("Scan failed: {e}")
                }
            },
            Command::Help => HELP_TEXT.to_string(),
        }
    }
}

fn single_hostname(action: &'static str, args: &[&str]) -> Result<String, CommandError> {
    match args {
        [] => Err(CommandError::MissingHostname(action)),
        [hostname] => normalize_hostname(hostname),
        _ => Err(CommandError::UnexpectedArguments(action)),
    }
}

fn no_arguments(action: &'static str, args: &[&str]) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::UnexpectedArguments(action))
    }
}

/// Accepts bare hostnames, URLs, and Slack's `<http://host|host>` link markup.
pub fn normalize_hostname(raw: &str) -> Result<String, CommandError> {
    let invalid = || CommandError::InvalidHostname(raw.to_string());

    let mut candidate = raw.trim();
    if let Some(inner) = candidate.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        candidate = inner.split('|').next().unwrap_or(inner);
    }

    if candidate.contains("://") {
        let url = url::Url::parse(candidate).map_err(|_| invalid())?;
        if !matches!(url.path(), "" | "/") || url.port().is_some() {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?;
        return validate_host(host).ok_or_else(invalid);
    }

    validate_host(candidate).ok_or_else(invalid)
}

fn validate_host(candidate: &str) -> Option<String> {
    match url::Host::parse(candidate).ok()? {
        url::Host::Domain(domain) if !domain.is_empty() => {
            Some(domain.trim_end_matches('.').to_string())
        }
        url::Host::Domain(_) => None,
        url::Host::Ipv4(ip) => Some(ip.to_string()),
        url::Host::Ipv6(_) => None,
    }
}

/// Parse result turned into the text the requester sees.
pub fn rejection_message(err: &CommandError) -> String {
    match err {
        CommandError::Empty | CommandError::UnknownAction(_) => format!("{err}.\n{HELP_TEXT}"),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_actions() {
        assert_eq!(
            Command::parse("add example.com"),
            Ok(Command::Add("example.com".to_string()))
        );
        assert_eq!(
            Command::parse("  remove   Example.COM "),
            Ok(Command::Remove("example.com".to_string()))
        );
        assert_eq!(
            Command::parse("check example.org"),
            Ok(Command::Check("example.org".to_string()))
        );
        assert_eq!(Command::parse("run"), Ok(Command::Run));
        assert_eq!(Command::parse("HELP"), Ok(Command::Help));
    }

    #[test]
    fn parse_rejects_bad_arity() {
        assert_eq!(Command::parse("add"), Err(CommandError::MissingHostname("add")));
        assert_eq!(
            Command::parse("check"),
            Err(CommandError::MissingHostname("check"))
        );
        assert_eq!(
            Command::parse("add a.com b.com"),
            Err(CommandError::UnexpectedArguments("add"))
        );
        assert_eq!(
            Command::parse("run now"),
            Err(CommandError::UnexpectedArguments("run"))
        );
    }

    #[test]
    fn parse_rejects_unknown_and_empty() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            Command::parse("delete example.com"),
            Err(CommandError::UnknownAction("delete".to_string()))
        );
    }

    #[test]
    fn hostnames_are_normalized() {
        assert_eq!(normalize_hostname("Example.com"), Ok("example.com".to_string()));
        assert_eq!(
            normalize_hostname("https://example.com/"),
            Ok("example.com".to_string())
        );
        assert_eq!(
            normalize_hostname("<http://example.com|example.com>"),
            Ok("example.com".to_string())
        );
        assert_eq!(normalize_hostname("example.com."), Ok("example.com".to_string()));
    }

    #[test]
    fn bad_hostnames_are_rejected() {
        let rejected = [
            "https://example.com/login",
            "exa mple.com",
            "example.com/path",
            "https://example.com:8443",
        ];
        for raw in rejected {
            assert!(
                matches!(normalize_hostname(raw), Err(CommandError::InvalidHostname(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_action_rejection_includes_help() {
        let message = rejection_message(&CommandError::UnknownAction("nope".to_string()));
        assert!(message.starts_with("Unknown action 'nope'."));
        assert!(message.contains("add <hostname>"));
    }
}
