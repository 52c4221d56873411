//! Connection-scoped dispatch of client events to user callbacks
//!
//! The broker library emits log, error, statistics and token-refresh events
//! outside of any admin operation. While the listener is active a background
//! task pumps them into the registered [`ClientCallbacks`]; once deactivated,
//! emitted events are dropped.

use crate::broker::{ClientEvent, EventSink};
use crate::error::BrokerError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// User hooks for connection-level events. Every method defaults to a no-op.
pub trait ClientCallbacks: Send + Sync + 'static {
    fn on_log(&self, _level: i32, _facility: &str, _message: &str) {}

    fn on_error(&self, _error: &BrokerError) {}

    fn on_stats(&self, _json: &str) {}

    /// The library needs a new bearer token. Answer through
    /// `set_oauth_bearer_token` or `set_oauth_bearer_token_failure`.
    fn on_oauthbearer_token_refresh(&self, _oauthbearer_config: Option<&str>) {}
}

/// Forwards client events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCallbacks;

impl ClientCallbacks for TracingCallbacks {
    fn on_log(&self, level: i32, facility: &str, message: &str) {
        // syslog levels
        match level {
            0..=3 => error!(facility, "{}", message),
            4 => warn!(facility, "{}", message),
            5 | 6 => info!(facility, "{}", message),
            _ => debug!(facility, "{}", message),
        }
    }

    fn on_error(&self, error: &BrokerError) {
        warn!(code = error.code.as_i32(), "client error: {}", error);
    }

    fn on_stats(&self, json: &str) {
        trace!(stats = json, "client statistics");
    }
}

/// Explicit subscription between a connection's handle and its callbacks
pub struct EventListener {
    callbacks: Arc<dyn ClientCallbacks>,
    active: Arc<AtomicBool>,
    sink: Option<EventSink>,
    pump: Option<JoinHandle<()>>,
}

impl EventListener {
    pub fn new(callbacks: Arc<dyn ClientCallbacks>) -> Self {
        Self {
            callbacks,
            active: Arc::new(AtomicBool::new(false)),
            sink: None,
            pump: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.pump.is_some()
    }

    /// Start forwarding and return the sink a handle should emit into.
    /// Activating an active listener returns the existing sink.
    pub fn activate(&mut self) -> EventSink {
        if let Some(sink) = &self.sink {
            return sink.clone();
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
        let callbacks = self.callbacks.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch(callbacks.as_ref(), &event);
            }
        });

        // Sinks from an earlier activation stay dead
        self.active = Arc::new(AtomicBool::new(true));
        let sink = EventSink::new(tx, self.active.clone());
        self.sink = Some(sink.clone());
        self.pump = Some(pump);
        debug!("event listener activated");
        sink
    }

    /// Stop forwarding. Safe to call when already inactive.
    pub fn deactivate(&mut self) {
        self.active.store(false, Ordering::Release);
        self.sink = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("event listener deactivated");
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn dispatch(callbacks: &dyn ClientCallbacks, event: &ClientEvent) {
    match event {
        ClientEvent::Log {
            level,
            facility,
            message,
        } => callbacks.on_log(*level, facility, message),
        ClientEvent::Error(err) => callbacks.on_error(err),
        ClientEvent::Stats(json) => callbacks.on_stats(json),
        ClientEvent::OAuthBearerTokenRefresh { oauthbearer_config } => {
            callbacks.on_oauthbearer_token_refresh(oauthbearer_config.as_deref())
        }
    }
}
