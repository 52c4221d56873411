//! AdminClient: connection plus background dispatcher behind one handle
//!
//! ```rust,no_run
//! use brokerctl_core::memory::MemoryBroker;
//! use brokerctl_core::{AdminClient, ClientConfig, NewTopic};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> brokerctl_core::Result<()> {
//! let config: ClientConfig = [("bootstrap.servers", "localhost:9092")].into_iter().collect();
//! let client = AdminClient::new(Arc::new(MemoryBroker::new()), config);
//! client.connect().await?;
//!
//! client
//!     .create_topic(NewTopic::new("orders", 3, 1), Duration::from_secs(5))
//!     .await?;
//! let groups = client.list_groups(None, None).await?;
//! println!("{} groups", groups.groups.len());
//! # Ok(())
//! # }
//! ```

use crate::admin::{AdminResponse, Outcome};
use crate::auth::AuthHook;
use crate::broker::{Broker, ClientConfig, OAuthBearerToken};
use crate::connection::Connection;
use crate::decode::{
    DeleteGroupsDecoder, DescribeGroupsDecoder, GroupDeletion, GroupDescription,
    GroupResultDecoder, ListGroupsDecoder, ListGroupsResult,
};
use crate::error::{CoreError, Result};
use crate::event::GroupResultEvent;
use crate::listener::ClientCallbacks;
use crate::request::{DEFAULT_GROUP_TIMEOUT, NewTopic, OperationDescriptor};
use crate::types::GroupState;
use crate::worker::{DEFAULT_CONCURRENCY, Dispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub struct AdminClientBuilder {
    broker: Arc<dyn Broker>,
    config: ClientConfig,
    auth: Option<Arc<dyn AuthHook>>,
    callbacks: Option<Arc<dyn ClientCallbacks>>,
    concurrency: usize,
}

impl AdminClientBuilder {
    pub fn auth(mut self, auth: Arc<dyn AuthHook>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn callbacks(mut self, callbacks: Arc<dyn ClientCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Operations allowed in flight at once
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Build the client. Must be called inside a Tokio runtime.
    pub fn build(self) -> AdminClient {
        let mut conn = Connection::new(self.broker, self.config);
        if let Some(auth) = self.auth {
            conn = conn.with_auth(auth);
        }
        if let Some(callbacks) = self.callbacks {
            conn = conn.with_callbacks(callbacks);
        }
        let conn = Arc::new(conn);
        let dispatcher = Dispatcher::spawn(conn.clone(), self.concurrency);
        AdminClient { conn, dispatcher }
    }
}

/// Admin client for one cluster
pub struct AdminClient {
    conn: Arc<Connection>,
    dispatcher: Dispatcher,
}

impl AdminClient {
    /// Create a client with default settings. Must be called inside a Tokio runtime.
    pub fn new(broker: Arc<dyn Broker>, config: ClientConfig) -> Self {
        Self::builder(broker, config).build()
    }

    pub fn builder(broker: Arc<dyn Broker>, config: ClientConfig) -> AdminClientBuilder {
        AdminClientBuilder {
            broker,
            config,
            auth: None,
            callbacks: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.conn.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.conn.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn name(&self) -> Result<String> {
        self.conn.name().await
    }

    pub async fn set_sasl_credentials(&self, username: &str, password: &str) -> Result<()> {
        self.conn.set_sasl_credentials(username, password).await
    }

    pub async fn set_oauth_bearer_token(&self, token: &OAuthBearerToken) -> Result<()> {
        self.conn.set_oauth_bearer_token(token).await
    }

    pub async fn set_oauth_bearer_token_failure(&self, reason: &str) -> Result<()> {
        self.conn.set_oauth_bearer_token_failure(reason).await
    }

    /// Queue an operation; `continuation` receives the outcome exactly once
    pub fn submit<F>(&self, descriptor: OperationDescriptor, continuation: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.dispatcher.submit(descriptor, Box::new(continuation));
    }

    /// Queue an operation and wait for its outcome
    pub async fn execute(&self, descriptor: OperationDescriptor) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.submit(descriptor, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or(Err(CoreError::Canceled))
    }

    pub async fn create_topic(&self, topic: NewTopic, timeout: Duration) -> Result<()> {
        self.execute(OperationDescriptor::create_topic(topic, timeout)?)
            .await
            .map(drop)
    }

    pub async fn delete_topic(&self, topic: &str, timeout: Duration) -> Result<()> {
        self.execute(OperationDescriptor::delete_topic(topic, timeout)?)
            .await
            .map(drop)
    }

    pub async fn create_partitions(
        &self,
        topic: &str,
        total_count: i32,
        timeout: Duration,
    ) -> Result<()> {
        self.execute(OperationDescriptor::create_partitions(
            topic,
            total_count,
            timeout,
        )?)
        .await
        .map(drop)
    }

    /// List consumer groups; the timeout defaults to 5 seconds
    pub async fn list_groups(
        &self,
        match_states: Option<Vec<GroupState>>,
        timeout: Option<Duration>,
    ) -> Result<ListGroupsResult> {
        let desc = OperationDescriptor::list_groups(
            match_states,
            timeout.unwrap_or(DEFAULT_GROUP_TIMEOUT),
        );
        ListGroupsDecoder.decode(self.group_result(desc).await?)
    }

    pub async fn describe_groups(
        &self,
        groups: Vec<String>,
        include_authorized_operations: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<GroupDescription>> {
        let desc = OperationDescriptor::describe_groups(
            groups,
            include_authorized_operations,
            timeout.unwrap_or(DEFAULT_GROUP_TIMEOUT),
        )?;
        DescribeGroupsDecoder.decode(self.group_result(desc).await?)
    }

    pub async fn delete_groups(
        &self,
        groups: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Vec<GroupDeletion>> {
        let desc =
            OperationDescriptor::delete_groups(groups, timeout.unwrap_or(DEFAULT_GROUP_TIMEOUT))?;
        DeleteGroupsDecoder.decode(self.group_result(desc).await?)
    }

    /// Stop dispatching, then disconnect
    pub async fn shutdown(mut self) -> Result<()> {
        self.dispatcher.shutdown().await;
        self.conn.disconnect().await
    }

    async fn group_result(&self, desc: OperationDescriptor) -> Result<GroupResultEvent> {
        match self.execute(desc).await? {
            AdminResponse::Groups(event) => Ok(event),
            AdminResponse::Done => Err(CoreError::Decode(
                "expected a group result but the operation returned none".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("connection", &self.conn)
            .field("concurrency", &self.dispatcher.concurrency())
            .finish()
    }
}
