//! # brokerctl-core
//!
//! Asynchronous admin-operation engine for message-broker clusters.
//!
//! The engine creates and deletes topics, grows partition counts, and lists,
//! describes and deletes consumer groups. It does not speak the cluster wire
//! protocol itself; it drives a broker client library through the traits in
//! [`broker`]. The bundled [`memory::MemoryBroker`] implements them in process.
//!
//! ## Layers
//!
//! - [`connection`]: connect/disconnect state machine around one client handle,
//!   guarded by a single lock shared with every admin call
//! - [`poller`]: exponential-backoff polling of a result queue
//! - [`admin`]: the per-operation template (options, fresh queue, submit,
//!   poll, release, decode)
//! - [`worker`]: background dispatcher with a concurrency limit and
//!   exactly-once continuations
//! - [`decode`]: structured output for group operations
//! - [`client`]: the [`AdminClient`] facade tying these together
//! - [`config`]: profile configuration shared with the CLI
//!
//! ## Example
//!
//! ```rust,no_run
//! use brokerctl_core::memory::MemoryBroker;
//! use brokerctl_core::{AdminClient, ClientConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> brokerctl_core::Result<()> {
//! let config: ClientConfig = [("bootstrap.servers", "localhost:9092")].into_iter().collect();
//! let client = AdminClient::new(Arc::new(MemoryBroker::new()), config);
//! client.connect().await?;
//! client.delete_topic("scratch", std::time::Duration::from_secs(5)).await?;
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod auth;
pub mod broker;
pub mod client;
pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod event;
pub mod listener;
pub mod memory;
pub mod poller;
pub mod request;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use admin::{AdminResponse, Outcome};
pub use broker::{Broker, ClientConfig, ClientEvent, OAuthBearerToken};
pub use client::{AdminClient, AdminClientBuilder};
pub use config::{Config, ConfigError, Profile};
pub use connection::Connection;
pub use decode::{
    DeleteGroupsDecoder, DescribeGroupsDecoder, ErrorDetail, GroupDeletion, GroupDescription,
    GroupListing, GroupResultDecoder, ListGroupsDecoder, ListGroupsResult, MemberDescription,
};
pub use error::{BrokerError, CoreError, ErrorCode, Result};
pub use event::{EventKind, GroupResultEvent};
pub use listener::ClientCallbacks;
pub use request::{DEFAULT_GROUP_TIMEOUT, NewPartitions, NewTopic, OperationDescriptor};
pub use types::{AclOperation, GroupState, Node, TopicPartition};
pub use worker::DEFAULT_CONCURRENCY;
