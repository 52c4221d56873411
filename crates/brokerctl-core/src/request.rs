//! Operation descriptors and the requests submitted to a broker handle
//!
//! An [`OperationDescriptor`] is the immutable per-call input the caller builds.
//! The executor turns it into an [`AdminRequest`] for the broker library and
//! consumes it exactly once.

use crate::error::{CoreError, Result};
use crate::event::EventKind;
use crate::types::GroupState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Timeout applied to group operations when the caller does not pick one
pub const DEFAULT_GROUP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Admin action an options object or request is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminOp {
    CreateTopics,
    DeleteTopics,
    CreatePartitions,
    ListConsumerGroups,
    DescribeConsumerGroups,
    DeleteGroups,
}

impl AdminOp {
    /// Kind of the result event the broker library posts for this action
    pub fn result_kind(self) -> EventKind {
        match self {
            AdminOp::CreateTopics => EventKind::CreateTopicsResult,
            AdminOp::DeleteTopics => EventKind::DeleteTopicsResult,
            AdminOp::CreatePartitions => EventKind::CreatePartitionsResult,
            AdminOp::ListConsumerGroups => EventKind::ListConsumerGroupsResult,
            AdminOp::DescribeConsumerGroups => EventKind::DescribeConsumerGroupsResult,
            AdminOp::DeleteGroups => EventKind::DeleteGroupsResult,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdminOp::CreateTopics => "CreateTopics",
            AdminOp::DeleteTopics => "DeleteTopics",
            AdminOp::CreatePartitions => "CreatePartitions",
            AdminOp::ListConsumerGroups => "ListConsumerGroups",
            AdminOp::DescribeConsumerGroups => "DescribeConsumerGroups",
            AdminOp::DeleteGroups => "DeleteGroups",
        }
    }
}

impl fmt::Display for AdminOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specification of a topic to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    /// Partition count, or -1 for the broker default
    pub num_partitions: i32,
    /// Replication factor, or -1 for the broker default
    pub replication_factor: i32,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl NewTopic {
    pub fn new(name: impl Into<String>, num_partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            num_partitions,
            replication_factor,
            config: BTreeMap::new(),
        }
    }

    /// Set a topic configuration entry
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Request to grow a topic to a new total partition count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartitions {
    pub topic: String,
    pub total_count: i32,
}

impl NewPartitions {
    pub fn new(topic: impl Into<String>, total_count: i32) -> Self {
        Self {
            topic: topic.into(),
            total_count,
        }
    }
}

/// Request body handed to [`BrokerHandle::submit`](crate::broker::BrokerHandle::submit)
#[derive(Debug, Clone, PartialEq)]
pub enum AdminRequest {
    CreateTopics(Vec<NewTopic>),
    DeleteTopics(Vec<String>),
    CreatePartitions(Vec<NewPartitions>),
    ListConsumerGroups,
    DescribeConsumerGroups(Vec<String>),
    DeleteGroups(Vec<String>),
}

impl AdminRequest {
    pub fn op(&self) -> AdminOp {
        match self {
            AdminRequest::CreateTopics(_) => AdminOp::CreateTopics,
            AdminRequest::DeleteTopics(_) => AdminOp::DeleteTopics,
            AdminRequest::CreatePartitions(_) => AdminOp::CreatePartitions,
            AdminRequest::ListConsumerGroups => AdminOp::ListConsumerGroups,
            AdminRequest::DescribeConsumerGroups(_) => AdminOp::DescribeConsumerGroups,
            AdminRequest::DeleteGroups(_) => AdminOp::DeleteGroups,
        }
    }
}

/// Operation-specific payload of a descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTopic(NewTopic),
    DeleteTopic {
        topic: String,
    },
    CreatePartitions(NewPartitions),
    ListGroups {
        match_states: Option<Vec<GroupState>>,
    },
    DescribeGroups {
        groups: Vec<String>,
        include_authorized_operations: bool,
    },
    DeleteGroups {
        groups: Vec<String>,
    },
}

impl Operation {
    pub fn op(&self) -> AdminOp {
        match self {
            Operation::CreateTopic(_) => AdminOp::CreateTopics,
            Operation::DeleteTopic { .. } => AdminOp::DeleteTopics,
            Operation::CreatePartitions(_) => AdminOp::CreatePartitions,
            Operation::ListGroups { .. } => AdminOp::ListConsumerGroups,
            Operation::DescribeGroups { .. } => AdminOp::DescribeConsumerGroups,
            Operation::DeleteGroups { .. } => AdminOp::DeleteGroups,
        }
    }

    /// Group operations hand their raw result back for decoding
    pub fn is_group_operation(&self) -> bool {
        matches!(
            self,
            Operation::ListGroups { .. }
                | Operation::DescribeGroups { .. }
                | Operation::DeleteGroups { .. }
        )
    }
}

/// Immutable per-call input to the admin executor
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    operation: Operation,
    timeout: Duration,
}

impl OperationDescriptor {
    /// Create one topic
    pub fn create_topic(topic: NewTopic, timeout: Duration) -> Result<Self> {
        require_name("topic", &topic.name)?;
        if topic.num_partitions == 0 || topic.num_partitions < -1 {
            return Err(CoreError::Validation(format!(
                "num_partitions must be positive or -1, got {}",
                topic.num_partitions
            )));
        }
        if topic.replication_factor == 0 || topic.replication_factor < -1 {
            return Err(CoreError::Validation(format!(
                "replication_factor must be positive or -1, got {}",
                topic.replication_factor
            )));
        }
        Ok(Self::new(Operation::CreateTopic(topic), timeout))
    }

    /// Delete one topic
    pub fn delete_topic(topic: impl Into<String>, timeout: Duration) -> Result<Self> {
        let topic = topic.into();
        require_name("topic", &topic)?;
        Ok(Self::new(Operation::DeleteTopic { topic }, timeout))
    }

    /// Grow a topic to `total_count` partitions
    pub fn create_partitions(
        topic: impl Into<String>,
        total_count: i32,
        timeout: Duration,
    ) -> Result<Self> {
        let topic = topic.into();
        require_name("topic", &topic)?;
        if total_count < 1 {
            return Err(CoreError::Validation(format!(
                "total partition count must be at least 1, got {}",
                total_count
            )));
        }
        Ok(Self::new(
            Operation::CreatePartitions(NewPartitions::new(topic, total_count)),
            timeout,
        ))
    }

    /// List consumer groups, optionally filtered by state
    pub fn list_groups(match_states: Option<Vec<GroupState>>, timeout: Duration) -> Self {
        Self::new(Operation::ListGroups { match_states }, timeout)
    }

    /// Describe one or more consumer groups
    pub fn describe_groups(
        groups: Vec<String>,
        include_authorized_operations: bool,
        timeout: Duration,
    ) -> Result<Self> {
        require_groups(&groups)?;
        Ok(Self::new(
            Operation::DescribeGroups {
                groups,
                include_authorized_operations,
            },
            timeout,
        ))
    }

    /// Delete one or more consumer groups
    pub fn delete_groups(groups: Vec<String>, timeout: Duration) -> Result<Self> {
        require_groups(&groups)?;
        Ok(Self::new(Operation::DeleteGroups { groups }, timeout))
    }

    fn new(operation: Operation, timeout: Duration) -> Self {
        Self { operation, timeout }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_parts(self) -> (Operation, Duration) {
        (self.operation, self.timeout)
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::CreateTopic(t) => write!(f, "create_topic({})", t.name),
            Operation::DeleteTopic { topic } => write!(f, "delete_topic({})", topic),
            Operation::CreatePartitions(p) => {
                write!(f, "create_partitions({}, {})", p.topic, p.total_count)
            }
            Operation::ListGroups { .. } => write!(f, "list_groups"),
            Operation::DescribeGroups { groups, .. } => {
                write!(f, "describe_groups({})", groups.join(","))
            }
            Operation::DeleteGroups { groups } => write!(f, "delete_groups({})", groups.join(",")),
        }
    }
}

fn require_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} name must not be empty", what)));
    }
    Ok(())
}

fn require_groups(groups: &[String]) -> Result<()> {
    if groups.is_empty() {
        return Err(CoreError::Validation(
            "Must provide at least one group name".to_string(),
        ));
    }
    for group in groups {
        require_name("group", group)?;
    }
    Ok(())
}
