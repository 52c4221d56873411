//! Connection lifecycle for a single broker client handle
//!
//! A [`Connection`] is either connected (it owns a live handle plus the
//! connection-scoped background queue) or not connected (it owns nothing).
//! One exclusive lock guards the handle. Connect, disconnect and every admin
//! call take it, so teardown can never race an operation in flight.
//!
//! The connected flag is an atomic that is read without the lock for a cheap
//! reject, then read again once the lock is held.

use crate::auth::{AuthHook, OAuthBearerSetup};
use crate::broker::{Broker, BrokerHandle, ClientConfig, EventQueue, OAuthBearerToken};
use crate::error::{CoreError, Result};
use crate::listener::{ClientCallbacks, EventListener, TracingCallbacks};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Handle storage behind the connection lock
#[derive(Default)]
pub struct Slot {
    // Dropped before the handle
    background: Option<Box<dyn EventQueue>>,
    handle: Option<Box<dyn BrokerHandle>>,
}

/// Exclusive access to the live handle, held for the length of one operation
pub type HandleGuard = OwnedMappedMutexGuard<Slot, dyn BrokerHandle>;

pub struct Connection {
    broker: Arc<dyn Broker>,
    config: ClientConfig,
    auth: Arc<dyn AuthHook>,
    connected: AtomicBool,
    slot: Arc<Mutex<Slot>>,
    listener: std::sync::Mutex<EventListener>,
}

impl Connection {
    /// Create a connection. Nothing is contacted until [`connect`](Self::connect).
    pub fn new(broker: Arc<dyn Broker>, config: ClientConfig) -> Self {
        Self {
            broker,
            config,
            auth: Arc::new(OAuthBearerSetup::new()),
            connected: AtomicBool::new(false),
            slot: Arc::new(Mutex::new(Slot::default())),
            listener: std::sync::Mutex::new(EventListener::new(Arc::new(TracingCallbacks))),
        }
    }

    /// Replace the authentication hook
    pub fn with_auth(mut self, auth: Arc<dyn AuthHook>) -> Self {
        self.auth = auth;
        self
    }

    /// Route connection-level events to `callbacks` instead of the log
    pub fn with_callbacks(mut self, callbacks: Arc<dyn ClientCallbacks>) -> Self {
        self.listener = std::sync::Mutex::new(EventListener::new(callbacks));
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether connection-level events are currently being dispatched
    pub fn is_listening(&self) -> bool {
        self.listener().is_active()
    }

    /// Create the client handle. Succeeds without effect when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let mut config = self.config.clone();
        self.auth.configure(&mut config)?;

        let mut slot = self.slot.lock().await;
        if self.is_connected() {
            debug!("connect raced with another connect; keeping existing handle");
            return Ok(());
        }

        // Under the lock so a failing concurrent connect cannot deactivate
        // the sink handed to this handle. Callbacks may fire during creation.
        let events = self.listener().activate();

        let handle = match self.broker.create_handle(&config, events) {
            Ok(handle) => handle,
            Err(reason) => {
                self.listener().deactivate();
                warn!(broker = self.broker.name(), "failed to create client handle: {}", reason);
                return Err(CoreError::HandleCreation(reason));
            }
        };

        let background = match slot.background.take() {
            Some(queue) => queue,
            None => handle.new_queue(),
        };
        let follow_up = self
            .auth
            .enable_background(&config, handle.as_ref(), background.as_ref());

        info!(broker = self.broker.name(), client = %handle.name(), "connected");
        slot.background = Some(background);
        slot.handle = Some(handle);
        self.connected.store(true, Ordering::Release);

        if let Err(err) = follow_up {
            self.listener().deactivate();
            warn!("authentication follow-up failed: {}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Destroy the client handle. Succeeds without effect when not connected.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let mut slot = self.slot.lock().await;
        if !self.is_connected() {
            return Ok(());
        }

        drop(slot.background.take());
        self.listener().deactivate();
        drop(slot.handle.take());
        self.connected.store(false, Ordering::Release);

        info!(broker = self.broker.name(), "disconnected");
        Ok(())
    }

    /// Take the exclusive lock and return the live handle.
    ///
    /// Fails with [`CoreError::NotConnected`] without touching the lock when
    /// not connected, and again if the connection went away while waiting.
    pub async fn lock_handle(&self) -> Result<HandleGuard> {
        if !self.is_connected() {
            return Err(CoreError::NotConnected);
        }

        let slot = self.slot.clone().lock_owned().await;
        if !self.is_connected() {
            return Err(CoreError::NotConnected);
        }

        OwnedMutexGuard::try_map(slot, |slot| slot.handle.as_deref_mut())
            .map_err(|_| CoreError::NotConnected)
    }

    /// Name of the client instance
    pub async fn name(&self) -> Result<String> {
        Ok(self.lock_handle().await?.name())
    }

    pub async fn set_sasl_credentials(&self, username: &str, password: &str) -> Result<()> {
        self.lock_handle()
            .await?
            .set_sasl_credentials(username, password)
            .map_err(CoreError::Cluster)
    }

    pub async fn set_oauth_bearer_token(&self, token: &OAuthBearerToken) -> Result<()> {
        self.lock_handle()
            .await?
            .set_oauth_bearer_token(token)
            .map_err(CoreError::Cluster)
    }

    pub async fn set_oauth_bearer_token_failure(&self, reason: &str) -> Result<()> {
        self.lock_handle()
            .await?
            .set_oauth_bearer_token_failure(reason)
            .map_err(CoreError::Cluster)
    }

    fn listener(&self) -> std::sync::MutexGuard<'_, EventListener> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // A guard that outlives the connection releases the slot instead
        if let Some(slot) = Arc::get_mut(&mut self.slot) {
            let slot = slot.get_mut();
            drop(slot.background.take());
            drop(slot.handle.take());
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("broker", &self.broker.name())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{OAUTHBEARER_CONFIG, SASL_MECHANISMS};
    use crate::broker::ClientEvent;
    use crate::error::{BrokerError, ErrorCode};
    use crate::testing::{Counts, ScriptedBroker};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn connection(broker: &ScriptedBroker) -> Connection {
        let config: ClientConfig = [("bootstrap.servers", "localhost:9092"), ("client.id", "tests")]
            .into_iter()
            .collect();
        Connection::new(Arc::new(broker.clone()), config)
    }

    #[tokio::test]
    async fn test_connect_creates_one_handle() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        assert!(!conn.is_connected());

        conn.connect().await.unwrap();
        conn.connect().await.unwrap();

        assert!(conn.is_connected());
        assert!(conn.is_listening());
        assert_eq!(broker.counts().handles_created, 1);
        // The background queue
        assert_eq!(broker.counts().queues_created, 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        conn.connect().await.unwrap();

        conn.disconnect().await.unwrap();
        conn.disconnect().await.unwrap();

        assert!(!conn.is_connected());
        assert!(!conn.is_listening());
        assert_eq!(
            broker.counts(),
            Counts {
                handles_created: 1,
                handles_dropped: 1,
                queues_created: 1,
                queues_dropped: 1,
                ..Counts::default()
            }
        );
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        conn.disconnect().await.unwrap();
        assert_eq!(broker.counts(), Counts::default());
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        conn.connect().await.unwrap();
        conn.disconnect().await.unwrap();
        conn.connect().await.unwrap();

        assert!(conn.is_connected());
        assert_eq!(broker.counts().handles_created, 2);
        assert_eq!(broker.counts().handles_dropped, 1);
    }

    #[tokio::test]
    async fn test_handle_creation_failure_rolls_back_listener() {
        let broker = ScriptedBroker::new().failing_create("bootstrap.servers is required");
        let conn = connection(&broker);

        let err = conn.connect().await.unwrap_err();
        assert!(err.is_state());
        assert!(err.to_string().contains("bootstrap.servers"));
        assert!(!conn.is_connected());
        assert!(!conn.is_listening());
        assert_eq!(broker.counts().queues_created, 0);
    }

    #[tokio::test]
    async fn test_failed_concurrent_connect_leaves_winner_listening() {
        let broker = ScriptedBroker::new().failing_first_create("broker unreachable");
        let conn = Arc::new(connection(&broker));

        // Both connects queue up on the lock before either creates a handle
        let held = conn.slot.clone().lock_owned().await;
        let first = tokio::spawn({
            let conn = conn.clone();
            async move { conn.connect().await }
        });
        let second = tokio::spawn({
            let conn = conn.clone();
            async move { conn.connect().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        drop(held);

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(conn.is_connected());
        assert!(conn.is_listening());
        assert_eq!(broker.counts().handles_created, 1);

        let sink = broker.sink().unwrap();
        assert!(sink.emit(ClientEvent::Stats("{}".to_string())));
    }

    #[tokio::test]
    async fn test_lock_handle_guard_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let broker = ScriptedBroker::new();
        let conn = Arc::new(connection(&broker));
        conn.connect().await.unwrap();

        let task = {
            let conn = conn.clone();
            async move {
                let handle = conn.lock_handle().await?;
                tokio::task::yield_now().await;
                Ok::<_, CoreError>(handle.name())
            }
        };
        assert_send(&task);
        let name = tokio::spawn(task).await.unwrap().unwrap();
        assert_eq!(name, "tests#admin-1");
    }

    #[tokio::test]
    async fn test_auth_configure_failure_aborts_before_handle() {
        let broker = ScriptedBroker::new();
        let config: ClientConfig = [(SASL_MECHANISMS, "OAUTHBEARER")].into_iter().collect();
        let conn = Connection::new(Arc::new(broker.clone()), config);

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
        assert!(!conn.is_listening());
        assert_eq!(broker.counts().handles_created, 0);
    }

    #[tokio::test]
    async fn test_auth_follow_up_failure_deactivates_listener() {
        let broker = ScriptedBroker::new()
            .failing_background(BrokerError::new(ErrorCode::Authentication));
        let config: ClientConfig = [
            (SASL_MECHANISMS, "OAUTHBEARER"),
            (OAUTHBEARER_CONFIG, "principal=admin"),
        ]
        .into_iter()
        .collect();
        let conn = Connection::new(Arc::new(broker.clone()), config);

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
        assert!(!conn.is_listening());
        // The handle stays until disconnect
        assert!(conn.is_connected());
        conn.disconnect().await.unwrap();
        assert_eq!(broker.counts().handles_dropped, 1);
    }

    #[tokio::test]
    async fn test_oauthbearer_enables_background_callbacks() {
        let broker = ScriptedBroker::new();
        let config: ClientConfig = [
            (SASL_MECHANISMS, "OAUTHBEARER"),
            (OAUTHBEARER_CONFIG, "principal=admin"),
        ]
        .into_iter()
        .collect();
        let conn = Connection::new(Arc::new(broker.clone()), config);
        conn.connect().await.unwrap();
        assert_eq!(broker.background_enabled(), 1);
    }

    #[tokio::test]
    async fn test_lock_handle_requires_connection() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        assert!(matches!(
            conn.lock_handle().await,
            Err(CoreError::NotConnected)
        ));
        assert!(matches!(conn.name().await, Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn test_handle_setters_reach_the_handle() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        conn.connect().await.unwrap();

        assert_eq!(conn.name().await.unwrap(), "tests#admin-1");
        conn.set_sasl_credentials("admin", "secret").await.unwrap();
        assert_eq!(
            broker.sasl_credentials(),
            Some(("admin".to_string(), "secret".to_string()))
        );

        let token = OAuthBearerToken {
            value: "eyJ0b2tlbiI".to_string(),
            lifetime: Utc::now() + chrono::Duration::minutes(5),
            principal: "admin".to_string(),
            extensions: BTreeMap::new(),
        };
        conn.set_oauth_bearer_token(&token).await.unwrap();
        assert_eq!(broker.tokens(), vec!["eyJ0b2tlbiI".to_string()]);
        conn.set_oauth_bearer_token_failure("idp down").await.unwrap();
    }

    #[tokio::test]
    async fn test_events_stop_after_disconnect() {
        let broker = ScriptedBroker::new();
        let conn = connection(&broker);
        conn.connect().await.unwrap();

        let sink = broker.sink().unwrap();
        assert!(sink.emit(ClientEvent::Stats("{}".to_string())));

        conn.disconnect().await.unwrap();
        assert!(!sink.emit(ClientEvent::Stats("{}".to_string())));
    }

    #[tokio::test]
    async fn test_drop_releases_handle_and_queue() {
        let broker = ScriptedBroker::new();
        {
            let conn = connection(&broker);
            conn.connect().await.unwrap();
        }
        assert_eq!(broker.counts().handles_dropped, 1);
        assert_eq!(broker.counts().queues_dropped, 1);
    }
}
