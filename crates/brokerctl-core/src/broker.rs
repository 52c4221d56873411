//! The broker client library seam
//!
//! The engine never speaks the cluster wire protocol itself. It drives a
//! broker library through the traits in this module:
//!
//! - [`Broker`] creates client handles (dropping a handle destroys it)
//! - [`BrokerHandle`] creates result queues and options objects and accepts
//!   admin submissions
//! - [`EventQueue`] is polled for result events (dropping it destroys it)
//! - [`AdminOptions`] carries per-request settings; setters may reject values
//!
//! [`StandardOptions`] is a ready-made options object with the validation
//! rules most libraries share.

use crate::error::{BrokerError, ErrorCode};
use crate::event::Event;
use crate::request::{AdminOp, AdminRequest};
use crate::types::GroupState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Largest request timeout a broker library accepts
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// String properties handed to the broker library when a handle is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    props: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any earlier value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.props.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClientConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = ClientConfig::new();
        for (k, v) in iter {
            config.set(k, v);
        }
        config
    }
}

/// Connection-level events a handle emits outside of any admin operation
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Log {
        level: i32,
        facility: String,
        message: String,
    },
    Error(BrokerError),
    Stats(String),
    /// The library wants a fresh OAuth bearer token
    OAuthBearerTokenRefresh { oauthbearer_config: Option<String> },
}

/// Where a handle emits [`ClientEvent`]s; delivered only while the listener is active
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ClientEvent>>,
    active: Arc<AtomicBool>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ClientEvent>, active: Arc<AtomicBool>) -> Self {
        Self {
            tx: Some(tx),
            active,
        }
    }

    /// A sink that discards everything
    pub fn detached() -> Self {
        Self {
            tx: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit an event; returns false when nobody is listening
    pub fn emit(&self, event: ClientEvent) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

/// Identity of a queue, used by libraries to route results to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(u64);

impl QueueId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        QueueId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// OAuth bearer token handed to the library after a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthBearerToken {
    pub value: String,
    pub lifetime: DateTime<Utc>,
    pub principal: String,
    pub extensions: BTreeMap<String, String>,
}

/// Factory for client handles
pub trait Broker: Send + Sync {
    /// Library name used in logs
    fn name(&self) -> &str;

    /// Create a client handle; the error string explains a rejected configuration
    fn create_handle(
        &self,
        config: &ClientConfig,
        events: EventSink,
    ) -> std::result::Result<Box<dyn BrokerHandle>, String>;
}

/// A live client handle. Not assumed safe for concurrent admin submission.
pub trait BrokerHandle: Send + Sync {
    /// Client instance name
    fn name(&self) -> String;

    /// Create a fresh queue; dropping it destroys it
    fn new_queue(&self) -> Box<dyn EventQueue>;

    /// Create an options object scoped to one admin action
    fn new_options(&self, op: AdminOp) -> Box<dyn AdminOptions>;

    /// Submit an admin request whose result will be posted on `queue`
    fn submit(&self, request: AdminRequest, options: &dyn AdminOptions, queue: &dyn EventQueue);

    fn set_sasl_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError>;

    fn set_oauth_bearer_token(&self, token: &OAuthBearerToken) -> Result<(), BrokerError>;

    fn set_oauth_bearer_token_failure(&self, reason: &str) -> Result<(), BrokerError>;

    /// Serve SASL token refresh from the library's background thread using `queue`
    fn enable_sasl_background_callbacks(&self, queue: &dyn EventQueue) -> Result<(), BrokerError>;
}

/// A FIFO event channel
#[async_trait]
pub trait EventQueue: Send + Sync {
    fn id(&self) -> QueueId;

    /// Wait up to `timeout` for the next event
    async fn poll(&mut self, timeout: Duration) -> Option<Event>;
}

/// Per-request settings; setters return the library's rejection
pub trait AdminOptions: Send + Sync {
    fn op(&self) -> AdminOp;

    fn set_request_timeout(&mut self, timeout: Duration) -> Result<(), BrokerError>;

    fn set_match_consumer_group_states(&mut self, states: &[GroupState]) -> Result<(), BrokerError>;

    fn set_include_authorized_operations(&mut self, include: bool) -> Result<(), BrokerError>;

    fn request_timeout(&self) -> Option<Duration>;

    fn match_consumer_group_states(&self) -> Option<&[GroupState]>;

    fn include_authorized_operations(&self) -> bool;
}

/// Options object enforcing the usual library rules
#[derive(Debug, Clone, PartialEq)]
pub struct StandardOptions {
    op: AdminOp,
    request_timeout: Option<Duration>,
    match_states: Option<Vec<GroupState>>,
    include_authorized_operations: bool,
}

impl StandardOptions {
    pub fn new(op: AdminOp) -> Self {
        Self {
            op,
            request_timeout: None,
            match_states: None,
            include_authorized_operations: false,
        }
    }
}

impl AdminOptions for StandardOptions {
    fn op(&self) -> AdminOp {
        self.op
    }

    fn set_request_timeout(&mut self, timeout: Duration) -> Result<(), BrokerError> {
        if timeout > MAX_REQUEST_TIMEOUT {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                format!(
                    "Expected request_timeout to be at most {} ms",
                    MAX_REQUEST_TIMEOUT.as_millis()
                ),
            ));
        }
        self.request_timeout = Some(timeout);
        Ok(())
    }

    fn set_match_consumer_group_states(&mut self, states: &[GroupState]) -> Result<(), BrokerError> {
        if self.op != AdminOp::ListConsumerGroups {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                format!("match_consumer_group_states is not supported by {}", self.op),
            ));
        }
        let mut seen = Vec::with_capacity(states.len());
        for state in states {
            if seen.contains(state) {
                return Err(BrokerError::with_message(
                    ErrorCode::InvalidArg,
                    "Duplicate states not allowed",
                ));
            }
            seen.push(*state);
        }
        self.match_states = Some(seen);
        Ok(())
    }

    fn set_include_authorized_operations(&mut self, include: bool) -> Result<(), BrokerError> {
        if self.op != AdminOp::DescribeConsumerGroups {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                format!(
                    "include_authorized_operations is not supported by {}",
                    self.op
                ),
            ));
        }
        self.include_authorized_operations = include;
        Ok(())
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    fn match_consumer_group_states(&self) -> Option<&[GroupState]> {
        self.match_states.as_deref()
    }

    fn include_authorized_operations(&self) -> bool {
        self.include_authorized_operations
    }
}
