//! Scripted broker library for unit tests
//!
//! Polls never sleep: each poll pops the next scripted reply (or times out
//! immediately when the script is empty) and records the timeout it was given.
//! Every handle, queue and options object counts its creation and drop.

use crate::broker::{
    AdminOptions, Broker, BrokerHandle, ClientConfig, EventQueue, EventSink, OAuthBearerToken,
    QueueId, StandardOptions,
};
use crate::error::BrokerError;
use crate::event::Event;
use crate::request::{AdminOp, AdminRequest};
use crate::types::GroupState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counts {
    pub handles_created: usize,
    pub handles_dropped: usize,
    pub queues_created: usize,
    pub queues_dropped: usize,
    pub options_created: usize,
    pub options_dropped: usize,
}

/// What the options object looked like when a request was submitted
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubmittedOptions {
    pub op: AdminOp,
    pub request_timeout: Option<Duration>,
    pub match_states: Option<Vec<GroupState>>,
    pub include_authorized_operations: bool,
}

#[derive(Default)]
struct Ledger {
    handles_created: AtomicUsize,
    handles_dropped: AtomicUsize,
    queues_created: AtomicUsize,
    queues_dropped: AtomicUsize,
    options_created: AtomicUsize,
    options_dropped: AtomicUsize,
    background_enabled: AtomicUsize,
    create_attempts: AtomicUsize,
    script: Mutex<VecDeque<Option<Event>>>,
    polls: Mutex<Vec<Duration>>,
    submitted: Mutex<Vec<(AdminRequest, SubmittedOptions)>>,
    sasl_credentials: Mutex<Option<(String, String)>>,
    tokens: Mutex<Vec<String>>,
    sink: Mutex<Option<EventSink>>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedBroker {
    ledger: Arc<Ledger>,
    fail_create: Option<String>,
    fail_first_create: Option<String>,
    reject_options: Option<BrokerError>,
    fail_background: Option<BrokerError>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(mut self, reason: &str) -> Self {
        self.fail_create = Some(reason.to_string());
        self
    }

    /// Only the first `create_handle` call fails
    pub fn failing_first_create(mut self, reason: &str) -> Self {
        self.fail_first_create = Some(reason.to_string());
        self
    }

    pub fn rejecting_options(mut self, error: BrokerError) -> Self {
        self.reject_options = Some(error);
        self
    }

    pub fn failing_background(mut self, error: BrokerError) -> Self {
        self.fail_background = Some(error);
        self
    }

    /// Queue a reply for the next poll; `None` is a poll timeout
    pub fn script_poll(&self, reply: Option<Event>) {
        self.ledger.script.lock().unwrap().push_back(reply);
    }

    /// A queue not tied to any handle
    pub fn standalone_queue(&self) -> Box<dyn EventQueue> {
        Box::new(ScriptedQueue::new(self.ledger.clone()))
    }

    pub fn counts(&self) -> Counts {
        let l = &self.ledger;
        Counts {
            handles_created: l.handles_created.load(Ordering::SeqCst),
            handles_dropped: l.handles_dropped.load(Ordering::SeqCst),
            queues_created: l.queues_created.load(Ordering::SeqCst),
            queues_dropped: l.queues_dropped.load(Ordering::SeqCst),
            options_created: l.options_created.load(Ordering::SeqCst),
            options_dropped: l.options_dropped.load(Ordering::SeqCst),
        }
    }

    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.ledger.polls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(AdminRequest, SubmittedOptions)> {
        self.ledger.submitted.lock().unwrap().clone()
    }

    pub fn background_enabled(&self) -> usize {
        self.ledger.background_enabled.load(Ordering::SeqCst)
    }

    pub fn sasl_credentials(&self) -> Option<(String, String)> {
        self.ledger.sasl_credentials.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.ledger.tokens.lock().unwrap().clone()
    }

    /// The event sink handed to the most recent handle
    pub fn sink(&self) -> Option<EventSink> {
        self.ledger.sink.lock().unwrap().clone()
    }
}

impl Broker for ScriptedBroker {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_handle(
        &self,
        config: &ClientConfig,
        events: EventSink,
    ) -> Result<Box<dyn BrokerHandle>, String> {
        let attempt = self.ledger.create_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_create {
            return Err(reason.clone());
        }
        if let Some(reason) = &self.fail_first_create
            && attempt == 0
        {
            return Err(reason.clone());
        }
        self.ledger.handles_created.fetch_add(1, Ordering::SeqCst);
        *self.ledger.sink.lock().unwrap() = Some(events);
        let n = self.ledger.handles_created.load(Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            name: format!(
                "{}#admin-{}",
                config.get("client.id").unwrap_or("scripted"),
                n
            ),
            broker: self.clone(),
        }))
    }
}

struct ScriptedHandle {
    name: String,
    broker: ScriptedBroker,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.broker
            .ledger
            .handles_dropped
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl BrokerHandle for ScriptedHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn new_queue(&self) -> Box<dyn EventQueue> {
        self.broker.standalone_queue()
    }

    fn new_options(&self, op: AdminOp) -> Box<dyn AdminOptions> {
        self.broker
            .ledger
            .options_created
            .fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedOptions {
            inner: StandardOptions::new(op),
            reject: self.broker.reject_options.clone(),
            ledger: self.broker.ledger.clone(),
        })
    }

    fn submit(&self, request: AdminRequest, options: &dyn AdminOptions, _queue: &dyn EventQueue) {
        let snapshot = SubmittedOptions {
            op: options.op(),
            request_timeout: options.request_timeout(),
            match_states: options.match_consumer_group_states().map(<[_]>::to_vec),
            include_authorized_operations: options.include_authorized_operations(),
        };
        self.broker
            .ledger
            .submitted
            .lock()
            .unwrap()
            .push((request, snapshot));
    }

    fn set_sasl_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        *self.broker.ledger.sasl_credentials.lock().unwrap() =
            Some((username.to_string(), password.to_string()));
        Ok(())
    }

    fn set_oauth_bearer_token(&self, token: &OAuthBearerToken) -> Result<(), BrokerError> {
        self.broker
            .ledger
            .tokens
            .lock()
            .unwrap()
            .push(token.value.clone());
        Ok(())
    }

    fn set_oauth_bearer_token_failure(&self, _reason: &str) -> Result<(), BrokerError> {
        Ok(())
    }

    fn enable_sasl_background_callbacks(&self, _queue: &dyn EventQueue) -> Result<(), BrokerError> {
        if let Some(err) = &self.broker.fail_background {
            return Err(err.clone());
        }
        self.broker
            .ledger
            .background_enabled
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedQueue {
    id: QueueId,
    ledger: Arc<Ledger>,
}

impl ScriptedQueue {
    fn new(ledger: Arc<Ledger>) -> Self {
        ledger.queues_created.fetch_add(1, Ordering::SeqCst);
        Self {
            id: QueueId::next(),
            ledger,
        }
    }
}

impl Drop for ScriptedQueue {
    fn drop(&mut self) {
        self.ledger.queues_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventQueue for ScriptedQueue {
    fn id(&self) -> QueueId {
        self.id
    }

    async fn poll(&mut self, timeout: Duration) -> Option<Event> {
        self.ledger.polls.lock().unwrap().push(timeout);
        self.ledger.script.lock().unwrap().pop_front().flatten()
    }
}

struct ScriptedOptions {
    inner: StandardOptions,
    reject: Option<BrokerError>,
    ledger: Arc<Ledger>,
}

impl Drop for ScriptedOptions {
    fn drop(&mut self) {
        self.ledger.options_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

impl AdminOptions for ScriptedOptions {
    fn op(&self) -> AdminOp {
        self.inner.op()
    }

    fn set_request_timeout(&mut self, timeout: Duration) -> Result<(), BrokerError> {
        match &self.reject {
            Some(err) => Err(err.clone()),
            None => self.inner.set_request_timeout(timeout),
        }
    }

    fn set_match_consumer_group_states(&mut self, states: &[GroupState]) -> Result<(), BrokerError> {
        self.inner.set_match_consumer_group_states(states)
    }

    fn set_include_authorized_operations(&mut self, include: bool) -> Result<(), BrokerError> {
        self.inner.set_include_authorized_operations(include)
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout()
    }

    fn match_consumer_group_states(&self) -> Option<&[GroupState]> {
        self.inner.match_consumer_group_states()
    }

    fn include_authorized_operations(&self) -> bool {
        self.inner.include_authorized_operations()
    }
}
