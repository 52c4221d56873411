//! End-to-end admin operations against the sandbox cluster

use brokerctl_core::admin::{self, AdminResponse};
use brokerctl_core::memory::{ClusterState, ConsumerGroup, GroupMember, MemoryBroker};
use brokerctl_core::{
    AdminClient, BrokerError, ClientCallbacks, ClientConfig, Connection, CoreError, ErrorCode,
    EventKind, GroupResultDecoder, GroupState, ListGroupsDecoder, NewTopic, OperationDescriptor,
    TopicPartition,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> ClientConfig {
    [
        ("bootstrap.servers", "localhost:9092"),
        ("client.id", "scenario"),
    ]
    .into_iter()
    .collect()
}

fn member(id: &str, topic: &str, partitions: &[i32]) -> GroupMember {
    GroupMember {
        member_id: id.to_string(),
        client_id: "billing-app".to_string(),
        host: "/10.0.0.7".to_string(),
        group_instance_id: None,
        assignment: partitions
            .iter()
            .map(|p| TopicPartition::new(topic, *p))
            .collect(),
    }
}

async fn connected(broker: &MemoryBroker) -> AdminClient {
    let client = AdminClient::new(Arc::new(broker.clone()), config());
    client.connect().await.unwrap();
    client
}

#[tokio::test(start_paused = true)]
async fn create_topic_succeeds_and_is_visible() {
    let broker = MemoryBroker::builder()
        .latency(Duration::from_millis(40))
        .build();
    let client = connected(&broker).await;

    client
        .create_topic(NewTopic::new("orders", 3, 1), Duration::from_millis(5000))
        .await
        .unwrap();

    let topic = &broker.state().topics["orders"];
    assert_eq!(topic.partitions, 3);
    assert_eq!(topic.replication_factor, 1);
    client.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delete_missing_topic_is_unknown_topic_not_timeout() {
    let broker = MemoryBroker::new();
    let client = connected(&broker).await;

    let err = client
        .delete_topic("missing-topic", Duration::from_millis(5000))
        .await
        .unwrap_err();

    assert!(!err.is_timeout());
    match err {
        CoreError::Item { name, error } => {
            assert_eq!(name, "missing-topic");
            assert_eq!(error.code, ErrorCode::UnknownTopicOrPartition);
        }
        other => panic!("expected per-topic error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn creating_existing_topic_reports_first_failure() {
    let broker = MemoryBroker::builder().with_topic("orders", 3, 1).build();
    let client = connected(&broker).await;

    let err = client
        .create_topic(NewTopic::new("orders", 6, 1), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::TopicAlreadyExists));
    assert_eq!(broker.state().topics["orders"].partitions, 3);
}

#[tokio::test(start_paused = true)]
async fn partitions_only_grow() {
    let broker = MemoryBroker::builder().with_topic("orders", 3, 1).build();
    let client = connected(&broker).await;

    client
        .create_partitions("orders", 6, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(broker.state().topics["orders"].partitions, 6);

    let err = client
        .create_partitions("orders", 2, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidPartitions));
}

#[tokio::test(start_paused = true)]
async fn list_groups_returns_raw_result_event() {
    let broker = MemoryBroker::builder()
        .with_group("billing", ConsumerGroup::stable(vec![member("m-1", "orders", &[0])]))
        .with_group("idle", ConsumerGroup::empty())
        .build();
    let conn = Connection::new(Arc::new(broker.clone()), config());
    conn.connect().await.unwrap();

    let desc = OperationDescriptor::list_groups(
        Some(vec![GroupState::Stable]),
        Duration::from_millis(3000),
    );
    let raw = admin::execute(&conn, desc)
        .await
        .unwrap()
        .into_group_result()
        .expect("group result");

    assert_eq!(raw.kind(), EventKind::ListConsumerGroupsResult);
    assert!(raw.event().error().is_none());

    let decoded = ListGroupsDecoder.decode(raw).unwrap();
    let ids: Vec<&str> = decoded.groups.iter().map(|g| g.group_id.as_str()).collect();
    assert_eq!(ids, vec!["billing"]);
}

#[tokio::test(start_paused = true)]
async fn describe_and_delete_groups_decode() {
    let broker = MemoryBroker::builder()
        .with_group(
            "billing",
            ConsumerGroup::stable(vec![member("m-1", "orders", &[2, 0])]),
        )
        .with_group("idle", ConsumerGroup::empty())
        .build();
    let client = connected(&broker).await;

    let described = client
        .describe_groups(vec!["billing".to_string()], true, None)
        .await
        .unwrap();
    assert_eq!(described.len(), 1);
    assert_eq!(described[0].state, GroupState::Stable);
    assert_eq!(described[0].members[0].assignment["orders"], vec![0, 2]);
    assert!(described[0].coordinator.is_some());
    assert!(described[0].authorized_operations.is_some());

    let deleted = client
        .delete_groups(vec!["idle".to_string(), "billing".to_string()], None)
        .await
        .unwrap();
    assert!(deleted[0].is_ok());
    assert_eq!(
        deleted[1].error.as_ref().map(|e| e.name.as_str()),
        Some("NON_EMPTY_GROUP")
    );
    assert!(!broker.state().groups.contains_key("idle"));
    assert!(broker.state().groups.contains_key("billing"));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_cluster_times_out() {
    let broker = MemoryBroker::builder().unresponsive().build();
    let client = connected(&broker).await;

    let err = client
        .delete_topic("orders", Duration::from_millis(5000))
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::TimedOut(Duration::from_millis(5000)));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn latency_beyond_request_timeout_times_out() {
    let broker = MemoryBroker::builder()
        .latency(Duration::from_secs(10))
        .build();
    let client = connected(&broker).await;

    let err = client
        .create_topic(NewTopic::new("slow", 1, 1), Duration::from_millis(3000))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(broker.state().topics.contains_key("slow"));
}

#[tokio::test(start_paused = true)]
async fn unrelated_events_are_skipped_with_enough_budget() {
    let broker = MemoryBroker::builder().wrong_kind_noise().build();
    let client = connected(&broker).await;

    client
        .create_topic(NewTopic::new("orders", 1, 1), Duration::from_millis(5000))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn unrelated_event_consumes_single_attempt_budget() {
    let broker = MemoryBroker::builder().wrong_kind_noise().build();
    let client = connected(&broker).await;

    let err = client
        .delete_topic("anything", Duration::from_millis(1500))
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::TimedOut(Duration::from_millis(1500)));
}

#[tokio::test(start_paused = true)]
async fn request_level_error_is_cluster_error() {
    let broker = MemoryBroker::new();
    let client = connected(&broker).await;
    broker.fail_next_request(BrokerError::with_message(
        ErrorCode::ClusterAuthorizationFailed,
        "not authorized",
    ));

    let err = client
        .create_topic(NewTopic::new("orders", 1, 1), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Cluster(ref e) if e.code == ErrorCode::ClusterAuthorizationFailed));
    assert!(broker.state().topics.is_empty());
}

#[tokio::test(start_paused = true)]
async fn operations_while_disconnected_are_state_errors() {
    let broker = MemoryBroker::new();
    let client = AdminClient::new(Arc::new(broker.clone()), config());

    let err = client
        .delete_topic("orders", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.is_state());
    assert_eq!(broker.handles_created(), 0);

    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(broker.handles_created(), 1);

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
    let err = client.list_groups(None, None).await.unwrap_err();
    assert_eq!(err, CoreError::NotConnected);
}

#[tokio::test(start_paused = true)]
async fn handle_creation_failure_leaves_client_disconnected() {
    let broker = MemoryBroker::builder()
        .fail_handle_creation("all brokers down")
        .build();
    let client = AdminClient::new(Arc::new(broker), config());

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::HandleCreation(ref msg) if msg.contains("all brokers down")));
    assert!(!client.is_connected());
    assert!(!client.connection().is_listening());
}

#[tokio::test(start_paused = true)]
async fn continuations_fire_once_each_across_shutdown() {
    let broker = MemoryBroker::builder()
        .latency(Duration::from_millis(100))
        .build();
    let client = AdminClient::builder(Arc::new(broker.clone()), config())
        .concurrency(2)
        .build();
    client.connect().await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    for i in 0..6 {
        let fired = fired.clone();
        let tx = tx.clone();
        let desc = OperationDescriptor::create_topic(
            NewTopic::new(format!("t-{i}"), 1, 1),
            Duration::from_secs(5),
        )
        .unwrap();
        client.submit(desc, move |outcome| {
            fired.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome.map(|r| matches!(r, AdminResponse::Done)));
        });
    }
    drop(tx);

    client.shutdown().await.unwrap();

    let mut outcomes = Vec::new();
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }
    assert_eq!(outcomes.len(), 6);
    assert_eq!(fired.load(Ordering::SeqCst), 6);
    // Shutdown drains running operations before disconnecting
    assert!(outcomes.iter().all(|o| matches!(o, Ok(true))), "{outcomes:?}");
    let topics = broker.state().topics;
    assert_eq!(topics.len(), 6);
    assert!((0..6).all(|i| topics.contains_key(&format!("t-{i}"))));
}

#[derive(Default)]
struct LogRecorder {
    lines: Mutex<Vec<String>>,
}

impl ClientCallbacks for LogRecorder {
    fn on_log(&self, _level: i32, facility: &str, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{facility}: {message}"));
    }
}

#[tokio::test]
async fn client_events_reach_registered_callbacks() {
    let recorder = Arc::new(LogRecorder::default());
    let broker = MemoryBroker::new();
    let client = AdminClient::builder(Arc::new(broker), config())
        .callbacks(recorder.clone())
        .build();
    client.connect().await.unwrap();
    assert!(client.connection().is_listening());

    client
        .create_topic(NewTopic::new("orders", 1, 1), Duration::from_secs(5))
        .await
        .unwrap();

    for _ in 0..50 {
        if !recorder.lines.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let lines = recorder.lines.lock().unwrap().clone();
    assert!(lines.iter().any(|l| l.contains("request received")), "{lines:?}");

    client.disconnect().await.unwrap();
    assert!(!client.connection().is_listening());
}

#[tokio::test(start_paused = true)]
async fn snapshot_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cluster.json");

    let broker = MemoryBroker::new();
    let client = connected(&broker).await;
    client
        .create_topic(NewTopic::new("orders", 4, 2), Duration::from_secs(5))
        .await
        .unwrap();
    client.shutdown().await.unwrap();
    broker.state().save(&path).unwrap();

    let restored = MemoryBroker::builder()
        .state(ClusterState::load(&path).unwrap())
        .build();
    let client = connected(&restored).await;
    let err = client
        .create_topic(NewTopic::new("orders", 1, 1), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TopicAlreadyExists));
}
