// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Core Integration Tests
//!
//! Integration tests for the connector core:
//!
//! - Lifecycle state machine
//! - Poll exclusivity of concurrent reads
//! - Adaptive poll pacing
//! - Dispatch order
//! - Capability errors of model access
//!
//! ## Test Categories
//!
//! - `test_lifecycle_*`: state machine tests
//! - `test_poll_*`: polling engine tests
//! - `test_dispatch_*`: callback dispatch tests
//! - `test_model_*`: model access tests

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use weft_core::{
    Capability, Connector, ConnectorError, ConnectorRegistry, ConnectorState, ModelAccess,
    StructValue, Value,
};
use weft_file::FileModelAccess;

use weft_tests::common::fixtures::{AdapterFixtures, FileFixtures, ParameterFixtures};
use weft_tests::common::mocks::{MockBackend, MockModelAccess};
use weft_tests::common::recorder::RecordingCallback;
use weft_tests::common::{init_test_logging, temp_test_dir};

type MockConnector = Connector<MockBackend, String, String>;

fn mock_connector(backend: MockBackend) -> MockConnector {
    Connector::new(backend, vec![AdapterFixtures::strings()]).expect("connector")
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_lifecycle_transitions() {
    init_test_logging();
    let connector = mock_connector(MockBackend::new());
    let params = ParameterFixtures::polling(Duration::ZERO);

    assert_eq!(connector.state(), ConnectorState::Disconnected);
    assert!(matches!(connector.read().await, Err(ConnectorError::NotConnected)));
    assert!(matches!(
        connector.write("cmd".into()).await,
        Err(ConnectorError::NotConnected)
    ));

    connector.connect(&params).await.unwrap();
    connector.connect(&params).await.unwrap();
    assert_eq!(connector.backend().connects(), 1);
    assert!(connector.is_connected());

    connector.write("cmd".into()).await.unwrap();
    assert_eq!(connector.backend().written(), vec![("cmd".to_string(), None)]);

    connector.disconnect().await.unwrap();
    connector.disconnect().await.unwrap();
    assert_eq!(connector.backend().disconnects(), 1);
    assert!(matches!(connector.read().await, Err(ConnectorError::NotConnected)));

    connector.connect(&params).await.unwrap();
    assert_eq!(connector.backend().connects(), 2);

    connector.dispose().await.unwrap();
    assert_eq!(connector.state(), ConnectorState::Disposed);
    assert_eq!(connector.backend().disconnects(), 2);
    assert_eq!(connector.backend().disposes(), 1);
    assert!(matches!(connector.connect(&params).await, Err(ConnectorError::Disposed)));
    assert!(matches!(connector.write("cmd".into()).await, Err(ConnectorError::Disposed)));
    assert!(matches!(connector.read().await, Err(ConnectorError::Disposed)));
    assert!(matches!(connector.dispose().await, Err(ConnectorError::Disposed)));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Connect,
    Disconnect,
    Dispose,
    Write,
    Read,
}

const OPS: [Op; 5] = [Op::Connect, Op::Disconnect, Op::Dispose, Op::Write, Op::Read];

/// Small deterministic generator for operation sequences.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as usize
    }
}

#[tokio::test]
async fn test_lifecycle_operation_sequences() {
    init_test_logging();
    let params = ParameterFixtures::polling(Duration::ZERO);

    for seed in 0..24u64 {
        let connector = mock_connector(MockBackend::new());
        let mut rng = Lcg(seed);
        let mut expected = ConnectorState::Disconnected;
        let mut expected_connects = 0;

        for step in 0..16 {
            // Dispose is rare so that most sequences exercise the live states.
            let op = loop {
                let op = OPS[rng.next() % OPS.len()];
                if op != Op::Dispose || rng.next() % 4 == 0 {
                    break op;
                }
            };
            let context = format!("seed {} step {} {:?} in {:?}", seed, step, op, expected);

            match (op, expected) {
                (_, ConnectorState::Disposed) => {
                    let result = match op {
                        Op::Connect => connector.connect(&params).await,
                        Op::Disconnect => connector.disconnect().await,
                        Op::Dispose => connector.dispose().await,
                        Op::Write => connector.write("w".into()).await,
                        Op::Read => connector.read().await.map(|_| ()),
                    };
                    assert!(matches!(result, Err(ConnectorError::Disposed)), "{}", context);
                }
                (Op::Connect, state) => {
                    connector.connect(&params).await.unwrap();
                    if state != ConnectorState::Connected {
                        expected_connects += 1;
                    }
                    expected = ConnectorState::Connected;
                }
                (Op::Disconnect, _) => {
                    connector.disconnect().await.unwrap();
                    expected = ConnectorState::Disconnected;
                }
                (Op::Dispose, _) => {
                    connector.dispose().await.unwrap();
                    expected = ConnectorState::Disposed;
                }
                (Op::Write, ConnectorState::Connected) => {
                    connector.write("w".into()).await.unwrap();
                }
                (Op::Read, ConnectorState::Connected) => {
                    assert!(connector.read().await.unwrap().is_none(), "{}", context);
                }
                (Op::Write, _) => {
                    let result = connector.write("w".into()).await;
                    assert!(matches!(result, Err(ConnectorError::NotConnected)), "{}", context);
                }
                (Op::Read, _) => {
                    let result = connector.read().await;
                    assert!(matches!(result, Err(ConnectorError::NotConnected)), "{}", context);
                }
            }

            assert_eq!(connector.state(), expected, "{}", context);
        }

        assert_eq!(connector.backend().connects(), expected_connects, "seed {}", seed);
    }
}

#[tokio::test]
async fn test_lifecycle_failed_connect_rolls_back() {
    init_test_logging();
    let adapter = AdapterFixtures::strings();
    let connector = Connector::new(MockBackend::new().failing_connect(), vec![adapter.clone()]).unwrap();

    let error = connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap_err();

    assert!(matches!(error, ConnectorError::ConnectionFailed { .. }));
    assert_eq!(connector.state(), ConnectorState::Disconnected);
    assert!(adapter.model_access().is_none());
    assert_eq!(connector.backend().disconnects(), 1);
}

#[tokio::test]
async fn test_lifecycle_registry_tracks_instances() {
    init_test_logging();
    let registry = Arc::new(ConnectorRegistry::new());
    let connector = mock_connector(MockBackend::new()).with_registry(registry.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap();
    let instances = registry.instances();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].id, connector.id());
    assert_eq!(instances[0].name, "Mock");

    connector.disconnect().await.unwrap();
    assert!(registry.instances().is_empty());
}

// =============================================================================
// Polling Tests
// =============================================================================

#[tokio::test]
async fn test_poll_concurrent_reads_are_exclusive() {
    init_test_logging();
    let backend = MockBackend::new()
        .with_items((0..100).map(|i| i.to_string()))
        .with_read_delay(Duration::from_millis(1));
    let connector = mock_connector(backend);
    connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap();
    assert!(!connector.has_poller());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let connector = connector.clone();
        tasks.push(tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(item) = connector.read().await.unwrap() {
                received.push(item);
            }
            received
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }

    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 100);
    assert_eq!(unique.len(), 100);
    assert_eq!(connector.backend().max_in_flight(), 1);

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_poll_loop_and_reads_share_items() {
    init_test_logging();
    let backend = MockBackend::new()
        .with_items((0..60).map(|i| i.to_string()))
        .with_read_delay(Duration::from_millis(1));
    let connector = mock_connector(backend);
    let recorder = RecordingCallback::<String>::new();
    connector.add_callback(recorder.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::from_millis(2)))
        .await
        .unwrap();
    assert!(connector.has_poller());

    let mut read = Vec::new();
    while let Some(item) = connector.read().await.unwrap() {
        read.push(item);
    }
    // An item taken by the poll loop may still be on its way to the callback.
    recorder.wait_for(60 - read.len(), Duration::from_secs(2)).await;
    connector.disconnect().await.unwrap();

    let mut all = recorder.records();
    all.extend(read);
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 60);
    assert_eq!(unique.len(), 60);
    assert_eq!(connector.backend().max_in_flight(), 1);
}

#[tokio::test]
async fn test_poll_file_reads_are_exclusive() {
    init_test_logging();
    let dir = temp_test_dir("weft-poll");
    let lines: Vec<String> = (0..20).map(|i| format!("line-{:02}", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let path = FileFixtures::write_lines(dir.path(), "lines.txt", &refs);

    let connector = weft_file::file_connector(vec![AdapterFixtures::raw_bytes()]).unwrap();
    connector.enable_notifications(false);
    connector
        .connect(&ParameterFixtures::file_reader(
            &path.display().to_string(),
            Duration::ZERO,
        ))
        .await
        .unwrap();
    assert!(connector.is_polling());
    assert!(!connector.has_poller());

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let connector = connector.connector().clone();
        tasks.push(tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(line) = connector.read().await.unwrap() {
                received.push(String::from_utf8(line).unwrap());
            }
            received
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }
    all.sort();
    assert_eq!(all, lines);

    connector.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poll_time_difference_overrides_next_delay() {
    init_test_logging();
    let backend = MockBackend::new().with_items(["a:30", "b", "c", "d"]);
    let connector = mock_connector(backend);
    connector.set_data_time_difference_provider(|record: &String| {
        record
            .split_once(':')
            .and_then(|(_, gap)| gap.parse().ok())
            .map(Duration::from_millis)
    });
    let recorder = RecordingCallback::<String>::new();
    connector.add_callback(recorder.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::from_millis(100)))
        .await
        .unwrap();

    let records = recorder.wait_for(4, Duration::from_secs(5)).await;
    connector.disconnect().await.unwrap();
    assert_eq!(records, vec!["a:30", "b", "c", "d"]);

    let arrivals = recorder.arrivals();
    let gaps: Vec<u128> = arrivals
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect();

    // The override applies to one cycle, then the fixed interval is back.
    assert!((30..=31).contains(&gaps[0]), "gaps {:?}", gaps);
    assert!((100..=101).contains(&gaps[1]), "gaps {:?}", gaps);
    assert!((100..=101).contains(&gaps[2]), "gaps {:?}", gaps);
    assert_eq!(connector.backend().time_differences(), vec![Duration::from_millis(30)]);
}

#[tokio::test]
async fn test_poll_switches_with_notification_mode() {
    init_test_logging();
    let connector = mock_connector(MockBackend::new().with_events());
    let recorder = RecordingCallback::<String>::new();
    connector.add_callback(recorder.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::from_millis(5)))
        .await
        .unwrap();
    assert!(!connector.is_polling());
    assert!(!connector.has_poller());
    assert_eq!(connector.backend().polling(), Some(false));

    connector.backend().enqueue("polled");
    connector.enable_notifications(false);
    assert!(connector.has_poller());
    assert_eq!(connector.backend().polling(), Some(true));
    assert_eq!(
        recorder.wait_for(1, Duration::from_secs(2)).await,
        vec!["polled".to_string()]
    );

    connector.enable_notifications(true);
    assert!(!connector.is_polling());
    assert!(!connector.has_poller());

    connector.disconnect().await.unwrap();
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_dispatch_preserves_push_order() {
    init_test_logging();
    let connector = mock_connector(MockBackend::new().with_events());
    let first = RecordingCallback::<String>::new();
    let second = RecordingCallback::<String>::new();
    connector.add_callback(first.clone());
    connector.add_callback(second.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap();

    let produced: Vec<String> = (0..50).map(|i| format!("item-{}", i)).collect();
    for item in &produced {
        assert!(connector.backend().push(item.clone()).await);
    }

    assert_eq!(first.wait_for(50, Duration::from_secs(2)).await, produced);
    assert_eq!(second.wait_for(50, Duration::from_secs(2)).await, produced);
    assert_eq!(connector.metrics().dispatched, 50);

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_stops_for_removed_callback() {
    init_test_logging();
    let connector = mock_connector(MockBackend::new().with_events());
    let kept = RecordingCallback::<String>::new();
    let removed = RecordingCallback::<String>::new();
    connector.add_callback(kept.clone());
    let id = connector.add_callback(removed.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap();

    connector.backend().push("before").await;
    kept.wait_for(1, Duration::from_secs(2)).await;
    removed.wait_for(1, Duration::from_secs(2)).await;

    assert!(connector.remove_callback(id));
    connector.backend().push("after").await;
    kept.wait_for(2, Duration::from_secs(2)).await;

    assert_eq!(kept.records(), vec!["before", "after"]);
    assert_eq!(removed.records(), vec!["before"]);

    connector.disconnect().await.unwrap();
    assert!(!connector.backend().push("late").await);
}

// =============================================================================
// Model Access Tests
// =============================================================================

#[tokio::test]
async fn test_model_file_access_reports_missing_capabilities() {
    let access = FileModelAccess;

    assert!(matches!(
        access.get_struct("line", "Reading").await,
        Err(ConnectorError::Unsupported { capability: Capability::Structs })
    ));
    assert!(matches!(
        access.set_struct("line", StructValue::new("Reading")).await,
        Err(ConnectorError::Unsupported { capability: Capability::Structs })
    ));
    assert!(matches!(
        access.register_custom_type("Reading").await,
        Err(ConnectorError::Unsupported { capability: Capability::CustomTypes })
    ));
    assert!(matches!(
        access.call("line", Vec::new()).await,
        Err(ConnectorError::Unsupported { capability: Capability::Calls })
    ));
    assert!(access.monitor(&["line"]).await.is_ok());
    assert!(!access.capabilities().supports(Capability::Structs));
}

#[tokio::test]
async fn test_model_without_events_refuses_monitoring() {
    let access = MockModelAccess::new(Default::default());

    let error = access.monitor(&["Machine.speed"]).await.unwrap_err();
    assert!(matches!(error, ConnectorError::Unsupported { capability: Capability::Events }));
    assert!(error.is_polling_fallback());
    assert!(access
        .monitor_with_interval(Duration::from_millis(10), &["Machine.speed"])
        .await
        .is_err());
    assert!(access.monitor_model_changes(None).await.is_err());
    assert!(matches!(
        access.step_into("Machine").await,
        Err(ConnectorError::Unsupported { capability: Capability::NestedScopes })
    ));
}

#[tokio::test]
async fn test_model_access_bound_through_connector() {
    init_test_logging();
    let model = MockModelAccess::with_properties(&[("Machine/speed", Value::Int(1200))]);
    let adapter = AdapterFixtures::strings();
    let connector = Connector::new(MockBackend::new().with_model(model), vec![adapter.clone()]).unwrap();

    assert!(adapter.model_access().is_none());
    connector
        .connect(&ParameterFixtures::polling(Duration::ZERO))
        .await
        .unwrap();

    let access = adapter.model_access().expect("bound after connect");
    let speed = access.qname(&["Machine", "", "speed"]);
    assert_eq!(speed, "Machine/speed");
    assert_eq!(access.get(&speed).await.unwrap(), Value::Int(1200));
    access.set(&speed, Value::Int(900)).await.unwrap();
    assert_eq!(access.get(&speed).await.unwrap(), Value::Int(900));
    assert!(matches!(
        access.get("Machine/missing").await,
        Err(ConnectorError::ElementNotFound { ref qname }) if qname == "Machine/missing"
    ));
    assert!(matches!(
        access.get_struct("Machine", "Spec").await,
        Err(ConnectorError::Unsupported { capability: Capability::Structs })
    ));

    access.step_into("Machine").await.unwrap();
    assert_eq!(access.get("speed").await.unwrap(), Value::Int(900));
    access.step_out().await.unwrap();
    assert!(access.step_out().await.is_err());

    connector.disconnect().await.unwrap();
    assert!(adapter.model_access().is_none());
}
