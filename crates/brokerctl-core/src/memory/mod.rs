//! Sandbox broker: an in-process implementation of the broker library traits
//!
//! Topics and consumer groups live in a [`ClusterState`]. Each admin request
//! is applied when it is submitted and its result event is posted on the
//! submitting queue after the configured latency. A request whose latency
//! exceeds its request timeout gets a timed-out result instead.
//!
//! Fault injection covers the failure paths of a real cluster: handle
//! creation failure, an unresponsive cluster, a one-shot request-level error,
//! and unrelated events arriving on the result queue ahead of the answer.
//!
//! ```rust
//! use brokerctl_core::memory::MemoryBroker;
//! use std::time::Duration;
//!
//! let broker = MemoryBroker::builder()
//!     .brokers(3)
//!     .with_topic("orders", 3, 1)
//!     .latency(Duration::from_millis(20))
//!     .build();
//! assert!(broker.state().topics.contains_key("orders"));
//! ```

mod cluster;

pub use cluster::{ClusterState, ConsumerGroup, GroupMember, TopicState};

use crate::broker::{
    AdminOptions, Broker, BrokerHandle, ClientConfig, ClientEvent, EventQueue, EventSink,
    OAuthBearerToken, QueueId, StandardOptions,
};
use crate::error::{BrokerError, ErrorCode};
use crate::event::{Event, EventKind, EventPayload};
use crate::request::{AdminOp, AdminRequest};
use async_trait::async_trait;
use chrono::Utc;
use cluster::RequestOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default request timeout when none was set on the options
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
struct Faults {
    latency: Duration,
    unresponsive: bool,
    fail_handle_creation: Option<String>,
    noise: bool,
}

struct Shared {
    cluster: Mutex<ClusterState>,
    faults: Faults,
    fail_next: Mutex<Option<BrokerError>>,
    handles: AtomicUsize,
}

/// In-memory cluster shared by every handle created from it
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn builder() -> MemoryBrokerBuilder {
        MemoryBrokerBuilder::default()
    }

    /// An empty three-broker cluster that answers immediately
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Copy of the current cluster state
    pub fn state(&self) -> ClusterState {
        lock(&self.shared.cluster).clone()
    }

    /// Fail the next request as a whole with `error`
    pub fn fail_next_request(&self, error: BrokerError) {
        *lock(&self.shared.fail_next) = Some(error);
    }

    /// Number of handles created so far
    pub fn handles_created(&self) -> usize {
        self.shared.handles.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct MemoryBrokerBuilder {
    state: ClusterState,
    faults: Faults,
}

impl MemoryBrokerBuilder {
    /// Start from a saved state
    pub fn state(mut self, state: ClusterState) -> Self {
        self.state = state;
        self
    }

    pub fn brokers(mut self, brokers: i32) -> Self {
        self.state.brokers = brokers;
        self
    }

    pub fn with_topic(mut self, name: &str, partitions: i32, replication_factor: i32) -> Self {
        self.state.topics.insert(
            name.to_string(),
            TopicState {
                partitions,
                replication_factor,
                config: Default::default(),
            },
        );
        self
    }

    pub fn with_group(mut self, group_id: &str, group: ConsumerGroup) -> Self {
        self.state.groups.insert(group_id.to_string(), group);
        self
    }

    /// Delay before each result is posted
    pub fn latency(mut self, latency: Duration) -> Self {
        self.faults.latency = latency;
        self
    }

    /// Accept requests but never answer them
    pub fn unresponsive(mut self) -> Self {
        self.faults.unresponsive = true;
        self
    }

    /// Refuse to create client handles
    pub fn fail_handle_creation(mut self, reason: &str) -> Self {
        self.faults.fail_handle_creation = Some(reason.to_string());
        self
    }

    /// Post an unrelated log event on the result queue before each answer
    pub fn wrong_kind_noise(mut self) -> Self {
        self.faults.noise = true;
        self
    }

    pub fn build(self) -> MemoryBroker {
        MemoryBroker {
            shared: Arc::new(Shared {
                cluster: Mutex::new(self.state),
                faults: self.faults,
                fail_next: Mutex::new(None),
                handles: AtomicUsize::new(0),
            }),
        }
    }
}

impl Broker for MemoryBroker {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn create_handle(
        &self,
        config: &ClientConfig,
        events: EventSink,
    ) -> Result<Box<dyn BrokerHandle>, String> {
        if let Some(reason) = &self.shared.faults.fail_handle_creation {
            return Err(reason.clone());
        }
        if config
            .get("bootstrap.servers")
            .is_none_or(|s| s.trim().is_empty())
        {
            return Err("bootstrap.servers must be set".to_string());
        }

        let n = self.shared.handles.fetch_add(1, Ordering::SeqCst) + 1;
        let client_id = config.get("client.id").unwrap_or("brokerctl");
        let name = format!("{}#admin-{}", client_id, n);
        debug!(client = %name, "sandbox handle created");

        Ok(Box::new(MemoryHandle {
            name,
            shared: self.shared.clone(),
            events,
            routes: Arc::new(Mutex::new(HashMap::new())),
            oauthbearer_config: config.get("sasl.oauthbearer.config").map(str::to_string),
            credentials: Mutex::new(None),
            token: Mutex::new(None),
        }))
    }
}

type Routes = Arc<Mutex<HashMap<QueueId, mpsc::UnboundedSender<Event>>>>;

struct MemoryHandle {
    name: String,
    shared: Arc<Shared>,
    events: EventSink,
    routes: Routes,
    oauthbearer_config: Option<String>,
    credentials: Mutex<Option<(String, String)>>,
    token: Mutex<Option<OAuthBearerToken>>,
}

impl MemoryHandle {
    fn log(&self, message: String) {
        self.events.emit(ClientEvent::Log {
            level: 7,
            facility: "ADMIN".to_string(),
            message,
        });
    }
}

impl BrokerHandle for MemoryHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn new_queue(&self) -> Box<dyn EventQueue> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = QueueId::next();
        lock(&self.routes).insert(id, tx);
        Box::new(MemoryQueue {
            id,
            rx,
            routes: self.routes.clone(),
        })
    }

    fn new_options(&self, op: AdminOp) -> Box<dyn AdminOptions> {
        Box::new(StandardOptions::new(op))
    }

    fn submit(&self, request: AdminRequest, options: &dyn AdminOptions, queue: &dyn EventQueue) {
        let Some(tx) = lock(&self.routes).get(&queue.id()).cloned() else {
            debug!(queue = ?queue.id(), "submit to unknown queue ignored");
            return;
        };
        let kind = request.op().result_kind();
        self.log(format!("{} request received", request.op()));

        let injected = lock(&self.shared.fail_next).take();
        let event = match injected {
            Some(err) => Event::failed(kind, err),
            None => {
                let view = RequestOptions {
                    match_states: options.match_consumer_group_states().map(<[_]>::to_vec),
                    include_authorized_operations: options.include_authorized_operations(),
                };
                lock(&self.shared.cluster).apply(&request, &view)
            }
        };

        let faults = &self.shared.faults;
        if faults.noise {
            let _ = tx.send(Event::new(
                EventKind::Log,
                EventPayload::Message("sandbox: unrelated log line".to_string()),
            ));
        }
        if faults.unresponsive {
            trace!("sandbox is unresponsive; dropping {}", kind);
            return;
        }

        let request_timeout = options.request_timeout().unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let (delay, event) = if faults.latency > request_timeout {
            (
                request_timeout,
                Event::failed(
                    kind,
                    BrokerError::with_message(
                        ErrorCode::TimedOut,
                        "Failed while waiting for controller: Local: Timed out",
                    ),
                ),
            )
        } else {
            (faults.latency, event)
        };

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // The queue may already be gone
            let _ = tx.send(event);
        });
    }

    fn set_sasl_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        if username.is_empty() {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                "SASL username must not be empty",
            ));
        }
        *lock(&self.credentials) = Some((username.to_string(), password.to_string()));
        Ok(())
    }

    fn set_oauth_bearer_token(&self, token: &OAuthBearerToken) -> Result<(), BrokerError> {
        if token.value.is_empty() {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                "OAuth bearer token value must not be empty",
            ));
        }
        if token.principal.is_empty() {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                "OAuth bearer token principal must not be empty",
            ));
        }
        if token.lifetime <= Utc::now() {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                "Must supply an unexpired token",
            ));
        }
        *lock(&self.token) = Some(token.clone());
        Ok(())
    }

    fn set_oauth_bearer_token_failure(&self, reason: &str) -> Result<(), BrokerError> {
        if reason.is_empty() {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidArg,
                "A failure reason must be supplied",
            ));
        }
        self.events.emit(ClientEvent::Error(BrokerError::with_message(
            ErrorCode::Authentication,
            format!("Failed to acquire SASL OAUTHBEARER token: {}", reason),
        )));
        Ok(())
    }

    fn enable_sasl_background_callbacks(&self, queue: &dyn EventQueue) -> Result<(), BrokerError> {
        trace!(queue = ?queue.id(), "sasl background callbacks enabled");
        if lock(&self.token).is_none() {
            self.events.emit(ClientEvent::OAuthBearerTokenRefresh {
                oauthbearer_config: self.oauthbearer_config.clone(),
            });
        }
        Ok(())
    }
}

struct MemoryQueue {
    id: QueueId,
    rx: mpsc::UnboundedReceiver<Event>,
    routes: Routes,
}

impl Drop for MemoryQueue {
    fn drop(&mut self) {
        lock(&self.routes).remove(&self.id);
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    fn id(&self) -> QueueId {
        self.id
    }

    async fn poll(&mut self, timeout: Duration) -> Option<Event> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}
