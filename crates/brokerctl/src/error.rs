//! Error types for brokerctl
//!
//! Library errors are mapped onto [`BrokerCtlError`], which knows how to
//! suggest a next step and prints as a cargo-style diagnostic.

use brokerctl_core::{ConfigError, CoreError, ErrorCode};
use colored::Colorize;
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// ```text
/// error: Profile 'prod' not found
///
///   tip: list available profiles:
///       brokerctl profile list
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands
    pub fn tip(mut self, description: &str, commands: &[&str]) -> Self {
        self.tips.push((
            description.to_string(),
            commands.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Print to stderr
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum BrokerCtlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No profile configured. Use 'brokerctl profile set' to configure a profile.")]
    NoProfileConfigured,

    #[error("Profile '{name}' has no broker binding: {message}")]
    NoBinding { name: String, message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// The cluster rejected the operation
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("Operation error: {message}")]
    OperationError { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

pub type Result<T> = std::result::Result<T, BrokerCtlError>;

impl BrokerCtlError {
    /// Suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            BrokerCtlError::ProfileNotFound { name } => vec![
                "List available profiles: brokerctl profile list".to_string(),
                format!(
                    "Create profile '{}': brokerctl profile set {} --bootstrap-servers <host:port>",
                    name, name
                ),
            ],
            BrokerCtlError::NoProfileConfigured => vec![
                "Create a profile: brokerctl profile set <name> --bootstrap-servers <host:port>"
                    .to_string(),
                "Pick a default: brokerctl profile default <name>".to_string(),
            ],
            BrokerCtlError::NoBinding { name, .. } => vec![format!(
                "Use the sandbox cluster: brokerctl profile set {} --bootstrap-servers <host:port> --sandbox-state <file>",
                name
            )],
            BrokerCtlError::AuthenticationFailed { .. } => vec![
                "Check the SASL settings: brokerctl profile show <profile>".to_string(),
                "Override the password with BROKERCTL_SASL_PASSWORD".to_string(),
            ],
            BrokerCtlError::Timeout { .. } => vec![
                "Retry with a longer budget: --timeout-ms <ms>".to_string(),
                "Check that the bootstrap servers are reachable".to_string(),
            ],
            BrokerCtlError::Rejected { code, .. } => match code {
                ErrorCode::UnknownTopicOrPartition => {
                    vec!["Check the topic name spelling".to_string()]
                }
                ErrorCode::GroupIdNotFound => {
                    vec!["List groups: brokerctl group list".to_string()]
                }
                ErrorCode::NonEmptyGroup => {
                    vec!["Stop the group's consumers before deleting it".to_string()]
                }
                ErrorCode::InvalidReplicationFactor => vec![
                    "Use a replication factor no larger than the broker count".to_string(),
                ],
                _ => vec![],
            },
            BrokerCtlError::InvalidInput { .. } => {
                vec!["Check the command syntax: brokerctl <command> --help".to_string()]
            }
            _ => vec![],
        }
    }

    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&self.to_string());
        if let BrokerCtlError::Rejected { code, .. } = self {
            diag = diag.detail(&format!("broker error code {} ({})", code.as_i32(), code.name()));
        }
        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion, &[]);
        }
        diag.print();
    }
}

impl From<CoreError> for BrokerCtlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConnected | CoreError::HandleCreation(_) => {
                BrokerCtlError::ConnectionError {
                    message: err.to_string(),
                }
            }
            CoreError::TimedOut(duration) => BrokerCtlError::Timeout {
                message: format!("no result after {} ms", duration.as_millis()),
            },
            CoreError::Auth(message) => BrokerCtlError::AuthenticationFailed { message },
            CoreError::Validation(message) => BrokerCtlError::InvalidInput { message },
            CoreError::Config(message) => BrokerCtlError::Configuration(message),
            CoreError::Cluster(ref e) | CoreError::Item { error: ref e, .. } => {
                if e.code == ErrorCode::TimedOut {
                    BrokerCtlError::Timeout {
                        message: err.to_string(),
                    }
                } else {
                    BrokerCtlError::Rejected {
                        code: e.code,
                        message: err.to_string(),
                    }
                }
            }
            other => BrokerCtlError::OperationError {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for BrokerCtlError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => BrokerCtlError::ProfileNotFound { name },
            ConfigError::NoProfiles { .. } => BrokerCtlError::NoProfileConfigured,
            other => BrokerCtlError::Configuration(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BrokerCtlError {
    fn from(err: serde_json::Error) -> Self {
        BrokerCtlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for BrokerCtlError {
    fn from(err: std::io::Error) -> Self {
        BrokerCtlError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<anyhow::Error> for BrokerCtlError {
    fn from(err: anyhow::Error) -> Self {
        BrokerCtlError::Configuration(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerctl_core::BrokerError;
    use std::time::Duration;

    #[test]
    fn test_item_error_becomes_rejection_with_tip() {
        let err = BrokerCtlError::from(CoreError::Item {
            name: "orders".to_string(),
            error: BrokerError::new(ErrorCode::UnknownTopicOrPartition),
        });
        assert!(matches!(
            err,
            BrokerCtlError::Rejected {
                code: ErrorCode::UnknownTopicOrPartition,
                ..
            }
        ));
        assert!(err.to_string().contains("orders"));
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn test_timeouts_map_to_timeout() {
        let local = BrokerCtlError::from(CoreError::TimedOut(Duration::from_millis(1500)));
        assert_eq!(local.to_string(), "Timeout: no result after 1500 ms");

        let remote = BrokerCtlError::from(CoreError::Cluster(BrokerError::new(ErrorCode::TimedOut)));
        assert!(matches!(remote, BrokerCtlError::Timeout { .. }));
    }

    #[test]
    fn test_config_errors_keep_profile_context() {
        let err = BrokerCtlError::from(ConfigError::ProfileNotFound {
            name: "prod".to_string(),
        });
        assert_eq!(err.to_string(), "Profile 'prod' not found");
        assert!(err.suggestions()[1].contains("brokerctl profile set prod"));
    }
}
