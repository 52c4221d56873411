//! Events posted by the broker library onto result queues
//!
//! An [`Event`] is owned by whoever holds it; dropping it releases it. Group
//! operations return their matched event wrapped in a [`GroupResultEvent`] so
//! that ownership visibly moves to the decoding side.

use crate::error::BrokerError;
use crate::types::{AclOperation, GroupState, Node, TopicPartition};
use std::fmt;

/// Kind of an event observed on a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CreateTopicsResult,
    DeleteTopicsResult,
    CreatePartitionsResult,
    ListConsumerGroupsResult,
    DescribeConsumerGroupsResult,
    DeleteGroupsResult,
    Log,
    Error,
    OAuthBearerTokenRefresh,
}

impl EventKind {
    /// Result of a consumer group operation
    pub fn is_group_result(self) -> bool {
        matches!(
            self,
            EventKind::ListConsumerGroupsResult
                | EventKind::DescribeConsumerGroupsResult
                | EventKind::DeleteGroupsResult
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-topic result of a CreateTopics, DeleteTopics, or CreatePartitions request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResult {
    pub name: String,
    pub error: Option<BrokerError>,
}

impl TopicResult {
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: BrokerError) -> Self {
        Self {
            name: name.into(),
            error: Some(error),
        }
    }
}

/// Listing entry from a ListConsumerGroups result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGroupListing {
    pub group_id: String,
    pub is_simple_consumer_group: bool,
    pub state: GroupState,
}

/// Member entry from a DescribeConsumerGroups result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMember {
    pub member_id: String,
    pub group_instance_id: Option<String>,
    pub client_id: String,
    pub host: String,
    pub assignment: Vec<TopicPartition>,
}

/// Group entry from a DescribeConsumerGroups result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGroupDescription {
    pub group_id: String,
    pub error: Option<BrokerError>,
    pub is_simple_consumer_group: bool,
    pub partition_assignor: String,
    pub state: GroupState,
    pub coordinator: Option<Node>,
    pub members: Vec<RawMember>,
    pub authorized_operations: Option<Vec<AclOperation>>,
}

/// Per-group result of a DeleteGroups request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGroupResult {
    pub group_id: String,
    pub error: Option<BrokerError>,
}

/// Operation-specific payload of an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Topics(Vec<TopicResult>),
    ListGroups {
        valid: Vec<RawGroupListing>,
        errors: Vec<BrokerError>,
    },
    DescribeGroups(Vec<RawGroupDescription>),
    DeleteGroups(Vec<RawGroupResult>),
    Message(String),
}

/// An event polled from a queue
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    error: Option<BrokerError>,
    payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            kind,
            error: None,
            payload,
        }
    }

    /// An event whose whole request failed
    pub fn failed(kind: EventKind, error: BrokerError) -> Self {
        Self {
            kind,
            error: Some(error),
            payload: EventPayload::None,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Request-level error, if any
    pub fn error(&self) -> Option<&BrokerError> {
        self.error.as_ref()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EventPayload {
        self.payload
    }
}

/// Undecoded result of a group operation, handed from the executor to a decoder
#[derive(Debug, PartialEq)]
pub struct GroupResultEvent(Event);

impl GroupResultEvent {
    pub(crate) fn new(event: Event) -> Self {
        Self(event)
    }

    pub fn kind(&self) -> EventKind {
        self.0.kind()
    }

    pub fn event(&self) -> &Event {
        &self.0
    }

    /// Take ownership of the underlying event
    pub fn into_event(self) -> Event {
        self.0
    }
}
