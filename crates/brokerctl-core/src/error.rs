//! Unified error handling for brokerctl-core
//!
//! Every admin operation reports its result as a value. Errors fall into a
//! small taxonomy (state, submission, timeout, cluster, per-item) with helper
//! predicates so callers can branch without matching on every variant.
//!
//! # Example
//!
//! ```rust
//! use brokerctl_core::{BrokerError, CoreError, ErrorCode};
//!
//! let err = CoreError::Item {
//!     name: "missing-topic".to_string(),
//!     error: BrokerError::new(ErrorCode::UnknownTopicOrPartition),
//! };
//! assert_eq!(err.code(), Some(ErrorCode::UnknownTopicOrPartition));
//! assert!(!err.is_timeout());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error codes reported by the cluster or raised locally by the client library.
///
/// Broker codes use the cluster's wire numbering; local codes are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ErrorCode {
    // Local (client-side) codes
    BadMessage,
    Destroy,
    Fail,
    Transport,
    TimedOut,
    State,
    InvalidArg,
    InvalidType,
    Authentication,
    NoEnt,

    // Broker codes
    UnknownServerError,
    UnknownTopicOrPartition,
    CoordinatorLoadInProgress,
    CoordinatorNotAvailable,
    NotCoordinator,
    InvalidTopic,
    GroupAuthorizationFailed,
    ClusterAuthorizationFailed,
    TopicAlreadyExists,
    InvalidPartitions,
    InvalidReplicationFactor,
    InvalidRequest,
    PolicyViolation,
    SaslAuthenticationFailed,
    NonEmptyGroup,
    GroupIdNotFound,
    TopicDeletionDisabled,

    /// Any code without a named variant
    Other(i32),
}

impl ErrorCode {
    /// Numeric code as carried on the wire (broker codes) or by the client library (local codes)
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::BadMessage => -199,
            ErrorCode::Destroy => -197,
            ErrorCode::Fail => -196,
            ErrorCode::Transport => -195,
            ErrorCode::TimedOut => -185,
            ErrorCode::State => -172,
            ErrorCode::InvalidArg => -186,
            ErrorCode::InvalidType => -154,
            ErrorCode::Authentication => -169,
            ErrorCode::NoEnt => -156,
            ErrorCode::UnknownServerError => -1,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::CoordinatorLoadInProgress => 14,
            ErrorCode::CoordinatorNotAvailable => 15,
            ErrorCode::NotCoordinator => 16,
            ErrorCode::InvalidTopic => 17,
            ErrorCode::GroupAuthorizationFailed => 30,
            ErrorCode::ClusterAuthorizationFailed => 31,
            ErrorCode::TopicAlreadyExists => 36,
            ErrorCode::InvalidPartitions => 37,
            ErrorCode::InvalidReplicationFactor => 38,
            ErrorCode::InvalidRequest => 42,
            ErrorCode::PolicyViolation => 44,
            ErrorCode::SaslAuthenticationFailed => 58,
            ErrorCode::NonEmptyGroup => 68,
            ErrorCode::GroupIdNotFound => 69,
            ErrorCode::TopicDeletionDisabled => 73,
            ErrorCode::Other(code) => code,
        }
    }

    /// Symbolic name, e.g. `UNKNOWN_TOPIC_OR_PART`
    pub fn name(self) -> String {
        let name = match self {
            ErrorCode::BadMessage => "_BAD_MSG",
            ErrorCode::Destroy => "_DESTROY",
            ErrorCode::Fail => "_FAIL",
            ErrorCode::Transport => "_TRANSPORT",
            ErrorCode::TimedOut => "_TIMED_OUT",
            ErrorCode::State => "_STATE",
            ErrorCode::InvalidArg => "_INVALID_ARG",
            ErrorCode::InvalidType => "_INVALID_TYPE",
            ErrorCode::Authentication => "_AUTHENTICATION",
            ErrorCode::NoEnt => "_NOENT",
            ErrorCode::UnknownServerError => "UNKNOWN",
            ErrorCode::UnknownTopicOrPartition => "UNKNOWN_TOPIC_OR_PART",
            ErrorCode::CoordinatorLoadInProgress => "COORDINATOR_LOAD_IN_PROGRESS",
            ErrorCode::CoordinatorNotAvailable => "COORDINATOR_NOT_AVAILABLE",
            ErrorCode::NotCoordinator => "NOT_COORDINATOR",
            ErrorCode::InvalidTopic => "TOPIC_EXCEPTION",
            ErrorCode::GroupAuthorizationFailed => "GROUP_AUTHORIZATION_FAILED",
            ErrorCode::ClusterAuthorizationFailed => "CLUSTER_AUTHORIZATION_FAILED",
            ErrorCode::TopicAlreadyExists => "TOPIC_ALREADY_EXISTS",
            ErrorCode::InvalidPartitions => "INVALID_PARTITIONS",
            ErrorCode::InvalidReplicationFactor => "INVALID_REPLICATION_FACTOR",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::PolicyViolation => "POLICY_VIOLATION",
            ErrorCode::SaslAuthenticationFailed => "SASL_AUTHENTICATION_FAILED",
            ErrorCode::NonEmptyGroup => "NON_EMPTY_GROUP",
            ErrorCode::GroupIdNotFound => "GROUP_ID_NOT_FOUND",
            ErrorCode::TopicDeletionDisabled => "TOPIC_DELETION_DISABLED",
            ErrorCode::Other(code) => return format!("ERR_{}", code),
        };
        name.to_string()
    }

    /// Default human-readable description for the code
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::BadMessage => "Local: Bad message format",
            ErrorCode::Destroy => "Local: Broker handle destroyed",
            ErrorCode::Fail => "Local: Communication failure with broker",
            ErrorCode::Transport => "Local: Broker transport failure",
            ErrorCode::TimedOut => "Local: Timed out",
            ErrorCode::State => "Local: Erroneous state",
            ErrorCode::InvalidArg => "Local: Invalid argument or configuration",
            ErrorCode::InvalidType => "Local: Invalid type",
            ErrorCode::Authentication => "Local: Authentication failure",
            ErrorCode::NoEnt => "Local: No such entry",
            ErrorCode::UnknownServerError => "Unknown broker error",
            ErrorCode::UnknownTopicOrPartition => "Broker: Unknown topic or partition",
            ErrorCode::CoordinatorLoadInProgress => "Broker: Coordinator load in progress",
            ErrorCode::CoordinatorNotAvailable => "Broker: Coordinator not available",
            ErrorCode::NotCoordinator => "Broker: Not coordinator",
            ErrorCode::InvalidTopic => "Broker: Invalid topic",
            ErrorCode::GroupAuthorizationFailed => "Broker: Group authorization failed",
            ErrorCode::ClusterAuthorizationFailed => "Broker: Cluster authorization failed",
            ErrorCode::TopicAlreadyExists => "Broker: Topic already exists",
            ErrorCode::InvalidPartitions => "Broker: Invalid number of partitions",
            ErrorCode::InvalidReplicationFactor => "Broker: Invalid replication factor",
            ErrorCode::InvalidRequest => "Broker: Invalid request",
            ErrorCode::PolicyViolation => "Broker: Policy violation",
            ErrorCode::SaslAuthenticationFailed => "Broker: SASL Authentication failed",
            ErrorCode::NonEmptyGroup => "Broker: The group is not empty",
            ErrorCode::GroupIdNotFound => "Broker: The group id does not exist",
            ErrorCode::TopicDeletionDisabled => "Broker: Topic deletion is disabled",
            ErrorCode::Other(_) => "Unknown error code",
        }
    }

    /// Returns true for codes raised by the client library rather than a broker
    pub fn is_local(self) -> bool {
        self.as_i32() < -1
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -199 => ErrorCode::BadMessage,
            -197 => ErrorCode::Destroy,
            -196 => ErrorCode::Fail,
            -195 => ErrorCode::Transport,
            -185 => ErrorCode::TimedOut,
            -172 => ErrorCode::State,
            -186 => ErrorCode::InvalidArg,
            -154 => ErrorCode::InvalidType,
            -169 => ErrorCode::Authentication,
            -156 => ErrorCode::NoEnt,
            -1 => ErrorCode::UnknownServerError,
            3 => ErrorCode::UnknownTopicOrPartition,
            14 => ErrorCode::CoordinatorLoadInProgress,
            15 => ErrorCode::CoordinatorNotAvailable,
            16 => ErrorCode::NotCoordinator,
            17 => ErrorCode::InvalidTopic,
            30 => ErrorCode::GroupAuthorizationFailed,
            31 => ErrorCode::ClusterAuthorizationFailed,
            36 => ErrorCode::TopicAlreadyExists,
            37 => ErrorCode::InvalidPartitions,
            38 => ErrorCode::InvalidReplicationFactor,
            42 => ErrorCode::InvalidRequest,
            44 => ErrorCode::PolicyViolation,
            58 => ErrorCode::SaslAuthenticationFailed,
            68 => ErrorCode::NonEmptyGroup,
            69 => ErrorCode::GroupIdNotFound,
            73 => ErrorCode::TopicDeletionDisabled,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

/// An error code plus the optional message a broker or the client library attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerError {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BrokerError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// The attached message, or the code's default description
    pub fn message_or_default(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.code.description())
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message_or_default(), self.code.name())
    }
}

impl std::error::Error for BrokerError {}

/// Core error type for every admin-engine operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Operation attempted while the connection is not established
    #[error("Client is not connected")]
    NotConnected,

    /// The broker library refused to create a client handle
    #[error("Failed to create client handle: {0}")]
    HandleCreation(String),

    /// An admin-options configuration step was rejected
    #[error("Failed to configure admin request: {0}")]
    Submission(BrokerError),

    /// No matching result event arrived within the polling budget
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The result event itself carried an error
    #[error("Cluster error: {0}")]
    Cluster(BrokerError),

    /// One item of a multi-item operation failed
    #[error("'{name}' failed: {error}")]
    Item { name: String, error: BrokerError },

    /// The bearer-token authentication hook failed
    #[error("Authentication setup failed: {0}")]
    Auth(String),

    /// The operation was dropped before it could complete
    #[error("Operation was canceled before completion")]
    Canceled,

    /// A raw result could not be decoded by the presentation layer
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// Invalid operation input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<crate::config::ConfigError> for CoreError {
    fn from(err: crate::config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl CoreError {
    /// Returns true for errors caused by the connection lifecycle state
    #[must_use]
    pub fn is_state(&self) -> bool {
        matches!(self, CoreError::NotConnected | CoreError::HandleCreation(_))
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CoreError::TimedOut(_) => true,
            CoreError::Cluster(e) | CoreError::Item { error: e, .. } => {
                e.code == ErrorCode::TimedOut
            }
            _ => false,
        }
    }

    /// Returns true if this error came back from the cluster (whole-request or per-item)
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        matches!(self, CoreError::Cluster(_) | CoreError::Item { .. })
    }

    /// Returns true if this is a bad request error
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        match self {
            CoreError::Validation(_) | CoreError::Submission(_) => true,
            CoreError::Cluster(e) | CoreError::Item { error: e, .. } => matches!(
                e.code,
                ErrorCode::InvalidTopic
                    | ErrorCode::InvalidPartitions
                    | ErrorCode::InvalidReplicationFactor
                    | ErrorCode::InvalidRequest
                    | ErrorCode::InvalidArg
            ),
            _ => false,
        }
    }

    /// Returns true if resubmitting the same operation might succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::TimedOut(_) => true, // Timeout might succeed on retry
            CoreError::Cluster(e) | CoreError::Item { error: e, .. } => matches!(
                e.code,
                ErrorCode::TimedOut
                    | ErrorCode::Transport
                    | ErrorCode::CoordinatorLoadInProgress
                    | ErrorCode::CoordinatorNotAvailable
                    | ErrorCode::NotCoordinator
            ),
            _ => false,
        }
    }

    /// The underlying error code, where one exists
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CoreError::NotConnected | CoreError::HandleCreation(_) => Some(ErrorCode::State),
            CoreError::TimedOut(_) => Some(ErrorCode::TimedOut),
            CoreError::Submission(e) | CoreError::Cluster(e) | CoreError::Item { error: e, .. } => {
                Some(e.code)
            }
            CoreError::Auth(_) => Some(ErrorCode::Authentication),
            _ => None,
        }
    }
}
