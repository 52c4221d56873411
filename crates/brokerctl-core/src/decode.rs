//! Decoding of raw group-operation results into serializable output
//!
//! Group operations return the matched result event undecoded. A decoder
//! takes ownership of that [`GroupResultEvent`] and turns it into plain
//! structures ready for JSON, YAML or table output.

use crate::error::{BrokerError, CoreError, Result};
use crate::event::{EventKind, EventPayload, GroupResultEvent, RawGroupDescription, RawMember};
use crate::types::{AclOperation, GroupState, Node};
use serde::Serialize;
use std::collections::BTreeMap;

/// Serializable form of a broker error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: i32,
    pub name: String,
    pub message: String,
}

impl From<&BrokerError> for ErrorDetail {
    fn from(err: &BrokerError) -> Self {
        Self {
            code: err.code.as_i32(),
            name: err.code.name(),
            message: err.message_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupListing {
    pub group_id: String,
    pub is_simple_consumer_group: bool,
    pub state: GroupState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListGroupsResult {
    pub groups: Vec<GroupListing>,
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDescription {
    pub member_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_instance_id: Option<String>,
    pub client_id: String,
    pub host: String,
    /// Assigned partitions keyed by topic
    pub assignment: BTreeMap<String, Vec<i32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDescription {
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub is_simple_consumer_group: bool,
    pub partition_assignor: String,
    pub state: GroupState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<Node>,
    pub members: Vec<MemberDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_operations: Option<Vec<AclOperation>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDeletion {
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl GroupDeletion {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Turns a raw group result into structured output, consuming the event
pub trait GroupResultDecoder {
    type Output;

    fn decode(&self, result: GroupResultEvent) -> Result<Self::Output>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListGroupsDecoder;

#[derive(Debug, Default, Clone, Copy)]
pub struct DescribeGroupsDecoder;

#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteGroupsDecoder;

impl GroupResultDecoder for ListGroupsDecoder {
    type Output = ListGroupsResult;

    fn decode(&self, result: GroupResultEvent) -> Result<Self::Output> {
        match expect(result, EventKind::ListConsumerGroupsResult)? {
            EventPayload::ListGroups { valid, errors } => Ok(ListGroupsResult {
                groups: valid
                    .into_iter()
                    .map(|g| GroupListing {
                        group_id: g.group_id,
                        is_simple_consumer_group: g.is_simple_consumer_group,
                        state: g.state,
                    })
                    .collect(),
                errors: errors.iter().map(ErrorDetail::from).collect(),
            }),
            _ => Err(mismatch(EventKind::ListConsumerGroupsResult)),
        }
    }
}

impl GroupResultDecoder for DescribeGroupsDecoder {
    type Output = Vec<GroupDescription>;

    fn decode(&self, result: GroupResultEvent) -> Result<Self::Output> {
        match expect(result, EventKind::DescribeConsumerGroupsResult)? {
            EventPayload::DescribeGroups(groups) => Ok(groups.into_iter().map(describe).collect()),
            _ => Err(mismatch(EventKind::DescribeConsumerGroupsResult)),
        }
    }
}

impl GroupResultDecoder for DeleteGroupsDecoder {
    type Output = Vec<GroupDeletion>;

    fn decode(&self, result: GroupResultEvent) -> Result<Self::Output> {
        match expect(result, EventKind::DeleteGroupsResult)? {
            EventPayload::DeleteGroups(results) => Ok(results
                .into_iter()
                .map(|r| GroupDeletion {
                    error: r.error.as_ref().map(ErrorDetail::from),
                    group_id: r.group_id,
                })
                .collect()),
            _ => Err(mismatch(EventKind::DeleteGroupsResult)),
        }
    }
}

fn expect(result: GroupResultEvent, kind: EventKind) -> Result<EventPayload> {
    if result.kind() != kind {
        return Err(CoreError::Decode(format!(
            "expected {} but got {}",
            kind,
            result.kind()
        )));
    }
    Ok(result.into_event().into_payload())
}

fn mismatch(kind: EventKind) -> CoreError {
    CoreError::Decode(format!("{} carried an unexpected payload", kind))
}

fn describe(raw: RawGroupDescription) -> GroupDescription {
    GroupDescription {
        error: raw.error.as_ref().map(ErrorDetail::from),
        group_id: raw.group_id,
        is_simple_consumer_group: raw.is_simple_consumer_group,
        partition_assignor: raw.partition_assignor,
        state: raw.state,
        coordinator: raw.coordinator,
        members: raw.members.into_iter().map(member).collect(),
        authorized_operations: raw.authorized_operations,
    }
}

fn member(raw: RawMember) -> MemberDescription {
    let mut assignment: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for tp in raw.assignment {
        assignment.entry(tp.topic).or_default().push(tp.partition);
    }
    for partitions in assignment.values_mut() {
        partitions.sort_unstable();
    }

    MemberDescription {
        member_id: raw.member_id,
        group_instance_id: raw.group_instance_id,
        client_id: raw.client_id,
        host: raw.host,
        assignment,
    }
}
