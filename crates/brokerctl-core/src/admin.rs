//! Admin operation executor
//!
//! Every operation follows the same template while holding the connection
//! lock: build an options object for the action, create a fresh result queue,
//! submit, poll for the action's result event, then release the queue and the
//! options before the lock is dropped. Topic operations are decoded here
//! (first failing item wins); group operations hand the matched event back
//! undecoded.

use crate::broker::AdminOptions;
use crate::connection::Connection;
use crate::error::{BrokerError, CoreError, Result};
use crate::event::{Event, EventPayload, GroupResultEvent};
use crate::poller::poll_for_event;
use crate::request::{AdminRequest, Operation, OperationDescriptor};
use std::time::Duration;
use tracing::debug;

/// Successful result of an admin operation
#[derive(Debug, PartialEq)]
pub enum AdminResponse {
    /// A topic operation in which every item succeeded
    Done,
    /// The raw result of a group operation, ready for decoding
    Groups(GroupResultEvent),
}

impl AdminResponse {
    /// Take the group result, if this is one
    pub fn into_group_result(self) -> Option<GroupResultEvent> {
        match self {
            AdminResponse::Groups(event) => Some(event),
            AdminResponse::Done => None,
        }
    }
}

/// What an admin operation produces
pub type Outcome = Result<AdminResponse>;

/// Run one admin operation against `conn`
pub async fn execute(conn: &Connection, descriptor: OperationDescriptor) -> Outcome {
    let label = descriptor.to_string();
    let (operation, timeout) = descriptor.into_parts();
    let op = operation.op();

    let handle = conn.lock_handle().await?;

    let mut options = handle.new_options(op);
    configure(options.as_mut(), &operation, timeout).map_err(|err| {
        debug!(operation = %label, "options rejected: {}", err);
        CoreError::Submission(err)
    })?;

    let mut queue = handle.new_queue();
    debug!(operation = %label, queue = ?queue.id(), ?timeout, "submitting");
    handle.submit(into_request(operation), options.as_ref(), queue.as_ref());

    let event = poll_for_event(queue.as_mut(), op.result_kind(), timeout).await;

    drop(queue);
    drop(options);
    drop(handle);

    let Some(event) = event else {
        debug!(operation = %label, "no result within {:?}", timeout);
        return Err(CoreError::TimedOut(timeout));
    };

    if let Some(err) = event.error() {
        debug!(operation = %label, "request failed: {}", err);
        return Err(CoreError::Cluster(err.clone()));
    }

    if op.result_kind().is_group_result() {
        debug!(operation = %label, "returning group result for decoding");
        return Ok(AdminResponse::Groups(GroupResultEvent::new(event)));
    }

    first_item_error(event)?;
    debug!(operation = %label, "completed");
    Ok(AdminResponse::Done)
}

fn configure(
    options: &mut dyn AdminOptions,
    operation: &Operation,
    timeout: Duration,
) -> std::result::Result<(), BrokerError> {
    options.set_request_timeout(timeout)?;
    match operation {
        Operation::ListGroups {
            match_states: Some(states),
        } => options.set_match_consumer_group_states(states),
        Operation::DescribeGroups {
            include_authorized_operations,
            ..
        } => options.set_include_authorized_operations(*include_authorized_operations),
        _ => Ok(()),
    }
}

fn into_request(operation: Operation) -> AdminRequest {
    match operation {
        Operation::CreateTopic(topic) => AdminRequest::CreateTopics(vec![topic]),
        Operation::DeleteTopic { topic } => AdminRequest::DeleteTopics(vec![topic]),
        Operation::CreatePartitions(partitions) => {
            AdminRequest::CreatePartitions(vec![partitions])
        }
        Operation::ListGroups { .. } => AdminRequest::ListConsumerGroups,
        Operation::DescribeGroups { groups, .. } => AdminRequest::DescribeConsumerGroups(groups),
        Operation::DeleteGroups { groups } => AdminRequest::DeleteGroups(groups),
    }
}

/// The first item carrying an error fails the whole operation
fn first_item_error(event: Event) -> Result<()> {
    let kind = event.kind();
    let EventPayload::Topics(results) = event.into_payload() else {
        return Err(CoreError::Decode(format!("{} carried no topic results", kind)));
    };
    for result in results {
        if let Some(error) = result.error {
            return Err(CoreError::Item {
                name: result.name,
                error,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ClientConfig;
    use crate::error::ErrorCode;
    use crate::event::{EventKind, RawGroupListing, TopicResult};
    use crate::request::{DEFAULT_GROUP_TIMEOUT, NewTopic};
    use crate::testing::{Counts, ScriptedBroker};
    use crate::types::GroupState;
    use std::sync::Arc;

    async fn connected(broker: &ScriptedBroker) -> Connection {
        let conn = Connection::new(Arc::new(broker.clone()), ClientConfig::new());
        conn.connect().await.unwrap();
        conn
    }

    fn topics_event(kind: EventKind, results: Vec<TopicResult>) -> Event {
        Event::new(kind, EventPayload::Topics(results))
    }

    #[tokio::test]
    async fn test_create_topic_success() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(topics_event(
            EventKind::CreateTopicsResult,
            vec![TopicResult::ok("orders")],
        )));

        let desc = OperationDescriptor::create_topic(
            NewTopic::new("orders", 3, 1),
            Duration::from_millis(5000),
        )
        .unwrap();
        let response = execute(&conn, desc).await.unwrap();
        assert_eq!(response, AdminResponse::Done);

        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0].0,
            AdminRequest::CreateTopics(vec![NewTopic::new("orders", 3, 1)])
        );
        assert_eq!(
            submitted[0].1.request_timeout,
            Some(Duration::from_millis(5000))
        );

        // Background queue plus the operation's own queue
        assert_eq!(
            broker.counts(),
            Counts {
                handles_created: 1,
                handles_dropped: 0,
                queues_created: 2,
                queues_dropped: 1,
                options_created: 1,
                options_dropped: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_first_failing_item_wins() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(topics_event(
            EventKind::DeleteTopicsResult,
            vec![
                TopicResult::ok("a"),
                TopicResult::failed(
                    "b",
                    BrokerError::with_message(ErrorCode::TopicDeletionDisabled, "disabled on b"),
                ),
                TopicResult::failed("c", BrokerError::new(ErrorCode::UnknownTopicOrPartition)),
            ],
        )));

        let desc = OperationDescriptor::delete_topic("a", Duration::from_secs(1)).unwrap();
        let err = execute(&conn, desc).await.unwrap_err();
        match err {
            CoreError::Item { name, error } => {
                assert_eq!(name, "b");
                assert_eq!(error.code, ErrorCode::TopicDeletionDisabled);
                assert_eq!(error.message.as_deref(), Some("disabled on b"));
            }
            other => panic!("expected item error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_topic_is_item_error_not_timeout() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(topics_event(
            EventKind::DeleteTopicsResult,
            vec![TopicResult::failed(
                "missing-topic",
                BrokerError::new(ErrorCode::UnknownTopicOrPartition),
            )],
        )));

        let desc = OperationDescriptor::delete_topic("missing-topic", Duration::from_secs(5)).unwrap();
        let err = execute(&conn, desc).await.unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.code(), Some(ErrorCode::UnknownTopicOrPartition));
    }

    #[tokio::test]
    async fn test_no_event_times_out_and_releases_resources() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;

        let desc =
            OperationDescriptor::create_partitions("orders", 6, Duration::from_millis(5000)).unwrap();
        let err = execute(&conn, desc).await.unwrap_err();

        assert_eq!(err, CoreError::TimedOut(Duration::from_millis(5000)));
        assert_eq!(broker.poll_timeouts().len(), 3);
        let counts = broker.counts();
        assert_eq!(counts.queues_created - counts.queues_dropped, 1);
        assert_eq!(counts.options_created, 1);
        assert_eq!(counts.options_dropped, 1);
    }

    #[tokio::test]
    async fn test_wrong_kind_is_reported_as_timeout() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(topics_event(EventKind::DeleteTopicsResult, vec![])));

        let desc = OperationDescriptor::create_topic(
            NewTopic::new("orders", 1, 1),
            Duration::from_millis(1000),
        )
        .unwrap();
        assert!(execute(&conn, desc).await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_event_error_is_cluster_error() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(Event::failed(
            EventKind::CreateTopicsResult,
            BrokerError::with_message(ErrorCode::ClusterAuthorizationFailed, "denied"),
        )));

        let desc = OperationDescriptor::create_topic(
            NewTopic::new("orders", 1, 1),
            Duration::from_millis(1000),
        )
        .unwrap();
        let err = execute(&conn, desc).await.unwrap_err();
        assert!(matches!(err, CoreError::Cluster(_)));
        assert_eq!(err.code(), Some(ErrorCode::ClusterAuthorizationFailed));
    }

    #[tokio::test]
    async fn test_list_groups_returns_raw_event() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(Event::new(
            EventKind::ListConsumerGroupsResult,
            EventPayload::ListGroups {
                valid: vec![RawGroupListing {
                    group_id: "billing".to_string(),
                    is_simple_consumer_group: false,
                    state: GroupState::Stable,
                }],
                errors: vec![],
            },
        )));

        let desc = OperationDescriptor::list_groups(
            Some(vec![GroupState::Stable]),
            Duration::from_millis(3000),
        );
        let raw = execute(&conn, desc)
            .await
            .unwrap()
            .into_group_result()
            .unwrap();
        assert_eq!(raw.kind(), EventKind::ListConsumerGroupsResult);

        let (_, options) = &broker.submitted()[0];
        assert_eq!(options.match_states, Some(vec![GroupState::Stable]));
        assert_eq!(options.request_timeout, Some(Duration::from_millis(3000)));

        let counts = broker.counts();
        assert_eq!(counts.queues_dropped, 1);
        assert_eq!(counts.options_dropped, 1);
    }

    #[tokio::test]
    async fn test_describe_groups_sets_authorized_operations() {
        let broker = ScriptedBroker::new();
        let conn = connected(&broker).await;
        broker.script_poll(Some(Event::new(
            EventKind::DescribeConsumerGroupsResult,
            EventPayload::DescribeGroups(vec![]),
        )));

        let desc =
            OperationDescriptor::describe_groups(vec!["billing".into()], true, DEFAULT_GROUP_TIMEOUT)
                .unwrap();
        assert!(matches!(
            execute(&conn, desc).await.unwrap(),
            AdminResponse::Groups(_)
        ));
        let (request, options) = &broker.submitted()[0];
        assert_eq!(
            *request,
            AdminRequest::DescribeConsumerGroups(vec!["billing".to_string()])
        );
        assert!(options.include_authorized_operations);
    }

    #[tokio::test]
    async fn test_disconnected_fails_without_queue() {
        let broker = ScriptedBroker::new();
        let conn = Connection::new(Arc::new(broker.clone()), ClientConfig::new());

        let desc = OperationDescriptor::delete_groups(vec!["g".into()], DEFAULT_GROUP_TIMEOUT).unwrap();
        let err = execute(&conn, desc).await.unwrap_err();
        assert!(err.is_state());
        assert_eq!(broker.counts(), Counts::default());
    }

    #[tokio::test]
    async fn test_rejected_options_are_submission_error() {
        let broker = ScriptedBroker::new()
            .rejecting_options(BrokerError::with_message(ErrorCode::InvalidArg, "bad timeout"));
        let conn = connected(&broker).await;

        let desc = OperationDescriptor::delete_topic("orders", Duration::from_secs(1)).unwrap();
        let err = execute(&conn, desc).await.unwrap_err();
        assert!(matches!(err, CoreError::Submission(_)));
        assert!(err.is_bad_request());

        let counts = broker.counts();
        assert_eq!(counts.options_created, 1);
        assert_eq!(counts.options_dropped, 1);
        // Only the background queue
        assert_eq!(counts.queues_created, 1);
        assert!(broker.submitted().is_empty());
    }
}
