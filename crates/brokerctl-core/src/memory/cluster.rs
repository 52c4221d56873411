//! In-memory cluster state and the rules applied to admin requests

use crate::error::{BrokerError, CoreError, ErrorCode, Result};
use crate::event::{
    Event, EventPayload, RawGroupDescription, RawGroupListing, RawGroupResult, RawMember,
    TopicResult,
};
use crate::request::{AdminRequest, NewPartitions, NewTopic};
use crate::types::{AclOperation, GroupState, Node, TopicPartition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const MAX_TOPIC_NAME_LEN: usize = 249;
const DEFAULT_PARTITIONS: i32 = 1;
const DEFAULT_REPLICATION_FACTOR: i32 = 1;
const BASE_PORT: u16 = 9092;
/// Node ids map onto ports from `BASE_PORT`, so they must stay within `u16`
const MAX_BROKERS: i32 = (u16::MAX - BASE_PORT) as i32 + 1;

fn default_brokers() -> i32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicState {
    pub partitions: i32,
    pub replication_factor: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub member_id: String,
    pub client_id: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_instance_id: Option<String>,
    #[serde(default)]
    pub assignment: Vec<TopicPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub state: GroupState,
    #[serde(default = "default_assignor")]
    pub partition_assignor: String,
    #[serde(default)]
    pub simple: bool,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

fn default_assignor() -> String {
    "range".to_string()
}

impl ConsumerGroup {
    /// A group with no members
    pub fn empty() -> Self {
        Self {
            state: GroupState::Empty,
            partition_assignor: default_assignor(),
            simple: false,
            members: Vec::new(),
        }
    }

    /// A stable group with the given members
    pub fn stable(members: Vec<GroupMember>) -> Self {
        Self {
            state: GroupState::Stable,
            members,
            ..Self::empty()
        }
    }
}

/// Everything the sandbox cluster knows. Also the JSON snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default = "default_brokers")]
    pub brokers: i32,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicState>,
    #[serde(default)]
    pub groups: BTreeMap<String, ConsumerGroup>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topics: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }
}

/// Options as seen by the cluster when a request arrives
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RequestOptions {
    pub match_states: Option<Vec<GroupState>>,
    pub include_authorized_operations: bool,
}

impl ClusterState {
    /// Load a snapshot written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read cluster state {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("Failed to parse cluster state {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("Failed to serialize cluster state: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("Failed to write cluster state {}: {}", path.display(), e))
        })
    }

    /// Apply a request and build the result event the cluster would post
    pub(crate) fn apply(&mut self, request: &AdminRequest, options: &RequestOptions) -> Event {
        let kind = request.op().result_kind();
        let payload = match request {
            AdminRequest::CreateTopics(topics) => EventPayload::Topics(
                topics
                    .iter()
                    .map(|t| outcome(&t.name, self.create_topic(t)))
                    .collect(),
            ),
            AdminRequest::DeleteTopics(names) => EventPayload::Topics(
                names
                    .iter()
                    .map(|n| outcome(n, self.delete_topic(n)))
                    .collect(),
            ),
            AdminRequest::CreatePartitions(requests) => EventPayload::Topics(
                requests
                    .iter()
                    .map(|p| outcome(&p.topic, self.create_partitions(p)))
                    .collect(),
            ),
            AdminRequest::ListConsumerGroups => EventPayload::ListGroups {
                valid: self.list_groups(options.match_states.as_deref()),
                errors: Vec::new(),
            },
            AdminRequest::DescribeConsumerGroups(groups) => EventPayload::DescribeGroups(
                groups
                    .iter()
                    .map(|g| self.describe_group(g, options.include_authorized_operations))
                    .collect(),
            ),
            AdminRequest::DeleteGroups(groups) => EventPayload::DeleteGroups(
                groups
                    .iter()
                    .map(|g| RawGroupResult {
                        group_id: g.clone(),
                        error: self.delete_group(g).err(),
                    })
                    .collect(),
            ),
        };
        Event::new(kind, payload)
    }

    fn create_topic(&mut self, topic: &NewTopic) -> std::result::Result<(), BrokerError> {
        validate_topic_name(&topic.name)?;
        if self.topics.contains_key(&topic.name) {
            return Err(BrokerError::with_message(
                ErrorCode::TopicAlreadyExists,
                format!("Topic '{}' already exists.", topic.name),
            ));
        }
        if topic.num_partitions == 0 || topic.num_partitions < -1 {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidPartitions,
                "Number of partitions must be larger than 0.",
            ));
        }
        if topic.replication_factor == 0 || topic.replication_factor < -1 {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidReplicationFactor,
                "Replication factor must be larger than 0.",
            ));
        }
        if topic.replication_factor > self.brokers {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidReplicationFactor,
                format!(
                    "Replication factor: {} larger than available brokers: {}.",
                    topic.replication_factor, self.brokers
                ),
            ));
        }

        let partitions = match topic.num_partitions {
            -1 => DEFAULT_PARTITIONS,
            n => n,
        };
        let replication_factor = match topic.replication_factor {
            -1 => DEFAULT_REPLICATION_FACTOR,
            n => n,
        };
        self.topics.insert(
            topic.name.clone(),
            TopicState {
                partitions,
                replication_factor,
                config: topic.config.clone(),
            },
        );
        Ok(())
    }

    fn delete_topic(&mut self, name: &str) -> std::result::Result<(), BrokerError> {
        match self.topics.remove(name) {
            Some(_) => Ok(()),
            None => Err(unknown_topic()),
        }
    }

    fn create_partitions(&mut self, request: &NewPartitions) -> std::result::Result<(), BrokerError> {
        let topic = self.topics.get_mut(&request.topic).ok_or_else(unknown_topic)?;
        if request.total_count <= topic.partitions {
            return Err(BrokerError::with_message(
                ErrorCode::InvalidPartitions,
                format!(
                    "Topic currently has {} partitions, which is higher than the requested {}.",
                    topic.partitions, request.total_count
                ),
            ));
        }
        topic.partitions = request.total_count;
        Ok(())
    }

    fn list_groups(&self, match_states: Option<&[GroupState]>) -> Vec<RawGroupListing> {
        self.groups
            .iter()
            .filter(|(_, group)| match match_states {
                Some(states) if !states.is_empty() => states.contains(&group.state),
                _ => true,
            })
            .map(|(id, group)| RawGroupListing {
                group_id: id.clone(),
                is_simple_consumer_group: group.simple,
                state: group.state,
            })
            .collect()
    }

    fn describe_group(&self, group_id: &str, include_authorized: bool) -> RawGroupDescription {
        let Some(group) = self.groups.get(group_id) else {
            return RawGroupDescription {
                group_id: group_id.to_string(),
                error: Some(BrokerError::with_message(
                    ErrorCode::GroupIdNotFound,
                    format!("Group {} not found.", group_id),
                )),
                is_simple_consumer_group: false,
                partition_assignor: String::new(),
                state: GroupState::Dead,
                coordinator: None,
                members: Vec::new(),
                authorized_operations: None,
            };
        };

        RawGroupDescription {
            group_id: group_id.to_string(),
            error: None,
            is_simple_consumer_group: group.simple,
            partition_assignor: group.partition_assignor.clone(),
            state: group.state,
            coordinator: Some(self.coordinator_for(group_id)),
            members: group
                .members
                .iter()
                .map(|m| RawMember {
                    member_id: m.member_id.clone(),
                    group_instance_id: m.group_instance_id.clone(),
                    client_id: m.client_id.clone(),
                    host: m.host.clone(),
                    assignment: m.assignment.clone(),
                })
                .collect(),
            authorized_operations: include_authorized.then(|| {
                vec![
                    AclOperation::Read,
                    AclOperation::Delete,
                    AclOperation::Describe,
                ]
            }),
        }
    }

    fn delete_group(&mut self, group_id: &str) -> std::result::Result<(), BrokerError> {
        let group = self.groups.get(group_id).ok_or_else(|| {
            BrokerError::with_message(
                ErrorCode::GroupIdNotFound,
                format!("Group {} not found.", group_id),
            )
        })?;
        if !group.members.is_empty() {
            return Err(BrokerError::with_message(
                ErrorCode::NonEmptyGroup,
                format!("Group {} has {} active members.", group_id, group.members.len()),
            ));
        }
        self.groups.remove(group_id);
        Ok(())
    }

    fn coordinator_for(&self, group_id: &str) -> Node {
        let brokers = self.brokers.clamp(1, MAX_BROKERS) as u32;
        let hash = group_id
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let id = (hash % brokers) as u16;
        Node {
            id: i32::from(id),
            host: "localhost".to_string(),
            port: BASE_PORT + id,
        }
    }
}

fn outcome(name: &str, result: std::result::Result<(), BrokerError>) -> TopicResult {
    match result {
        Ok(()) => TopicResult::ok(name),
        Err(err) => TopicResult::failed(name, err),
    }
}

fn unknown_topic() -> BrokerError {
    BrokerError::with_message(
        ErrorCode::UnknownTopicOrPartition,
        "This server does not host this topic-partition.",
    )
}

fn validate_topic_name(name: &str) -> std::result::Result<(), BrokerError> {
    let reason = if name.is_empty() {
        Some("Topic name is illegal, it can't be empty".to_string())
    } else if name == "." || name == ".." {
        Some("Topic name cannot be \".\" or \"..\"".to_string())
    } else if name.len() > MAX_TOPIC_NAME_LEN {
        Some(format!(
            "Topic name is illegal, it can't be longer than {} characters",
            MAX_TOPIC_NAME_LEN
        ))
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        Some(format!(
            "Topic name \"{}\" is illegal, it contains a character other than ASCII alphanumerics, '.', '_' and '-'",
            name
        ))
    } else {
        None
    };

    match reason {
        Some(message) => Err(BrokerError::with_message(ErrorCode::InvalidTopic, message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(state: &mut ClusterState, topic: NewTopic) -> Option<BrokerError> {
        let event = state.apply(
            &AdminRequest::CreateTopics(vec![topic]),
            &RequestOptions::default(),
        );
        match event.into_payload() {
            EventPayload::Topics(mut results) => results.remove(0).error,
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_create_topic_rules() {
        let mut state = ClusterState::default();
        assert_eq!(create(&mut state, NewTopic::new("orders", 3, 1)), None);
        assert_eq!(state.topics["orders"].partitions, 3);

        let codes: Vec<_> = [
            NewTopic::new("orders", 3, 1),
            NewTopic::new("bad name", 1, 1),
            NewTopic::new("zero", 0, 1),
            NewTopic::new("wide", 1, 5),
        ]
        .into_iter()
        .map(|t| create(&mut state, t).map(|e| e.code))
        .collect();

        assert_eq!(
            codes,
            vec![
                Some(ErrorCode::TopicAlreadyExists),
                Some(ErrorCode::InvalidTopic),
                Some(ErrorCode::InvalidPartitions),
                Some(ErrorCode::InvalidReplicationFactor),
            ]
        );
    }

    #[test]
    fn test_broker_defaults_apply() {
        let mut state = ClusterState::default();
        assert_eq!(create(&mut state, NewTopic::new("logs", -1, -1)), None);
        assert_eq!(state.topics["logs"].partitions, DEFAULT_PARTITIONS);
        assert_eq!(
            state.topics["logs"].replication_factor,
            DEFAULT_REPLICATION_FACTOR
        );
    }

    #[test]
    fn test_create_partitions_must_grow() {
        let mut state = ClusterState::default();
        create(&mut state, NewTopic::new("orders", 3, 1));

        assert_eq!(
            state.create_partitions(&NewPartitions::new("orders", 3)).unwrap_err().code,
            ErrorCode::InvalidPartitions
        );
        assert_eq!(
            state.create_partitions(&NewPartitions::new("missing", 3)).unwrap_err().code,
            ErrorCode::UnknownTopicOrPartition
        );
        state.create_partitions(&NewPartitions::new("orders", 6)).unwrap();
        assert_eq!(state.topics["orders"].partitions, 6);
    }

    #[test]
    fn test_group_rules() {
        let mut state = ClusterState::default();
        state.groups.insert("idle".to_string(), ConsumerGroup::empty());
        state.groups.insert(
            "busy".to_string(),
            ConsumerGroup::stable(vec![GroupMember {
                member_id: "m-1".to_string(),
                client_id: "app".to_string(),
                host: "/127.0.0.1".to_string(),
                group_instance_id: None,
                assignment: vec![TopicPartition::new("orders", 0)],
            }]),
        );

        let stable = state.list_groups(Some(&[GroupState::Stable]));
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].group_id, "busy");
        assert_eq!(state.list_groups(None).len(), 2);

        assert_eq!(
            state.delete_group("busy").unwrap_err().code,
            ErrorCode::NonEmptyGroup
        );
        assert_eq!(
            state.delete_group("ghost").unwrap_err().code,
            ErrorCode::GroupIdNotFound
        );
        state.delete_group("idle").unwrap();
        assert!(!state.groups.contains_key("idle"));

        let unknown = state.describe_group("ghost", false);
        assert_eq!(unknown.error.unwrap().code, ErrorCode::GroupIdNotFound);
        let busy = state.describe_group("busy", true);
        assert!(busy.coordinator.is_some());
        assert!(busy.authorized_operations.is_some());
    }

    #[test]
    fn test_coordinator_port_matches_node_id_for_large_clusters() {
        let mut state = ClusterState {
            brokers: 100_000,
            ..ClusterState::default()
        };
        state.groups.insert("idle".to_string(), ConsumerGroup::empty());

        for group in ["idle", "billing", "a-much-longer-consumer-group-name"] {
            let node = state.coordinator_for(group);
            assert!(node.id >= 0 && node.id < MAX_BROKERS);
            assert_eq!(i32::from(node.port) - i32::from(BASE_PORT), node.id);
        }
        assert!(state.describe_group("idle", false).coordinator.is_some());
    }

    #[test]
    fn test_save_and_load_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cluster.json");

        let mut state = ClusterState::default();
        create(&mut state, NewTopic::new("orders", 3, 1).set("retention.ms", "60000"));
        state.groups.insert("idle".to_string(), ConsumerGroup::empty());
        state.save(&path).unwrap();

        let loaded = ClusterState::load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_minimal_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(&path, r#"{"topics": {"t": {"partitions": 2, "replication_factor": 1}}}"#)
            .unwrap();

        let loaded = ClusterState::load(&path).unwrap();
        assert_eq!(loaded.brokers, 3);
        assert_eq!(loaded.topics["t"].partitions, 2);
        assert!(loaded.groups.is_empty());
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ClusterState::load(&path),
            Err(CoreError::Config(_))
        ));
    }
}
