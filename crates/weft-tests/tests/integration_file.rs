// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # File Connector Integration Tests
//!
//! End-to-end tests of the file connector:
//!
//! - Polling a JSON lines file
//! - Selecting files by regular expression
//! - Writing commands into generated output files
//! - Writing while a poll waits on an idle source
//! - Disconnecting while a poll is outstanding
//! - Pushing lines paced by `DATA_TIMEDIFF`

use std::fs;
use std::time::{Duration, Instant};

use weft_core::{ConnectorParameter, ConnectorState};
use weft_file::{
    file_connector, is_written_file, OUT_NAME_PREFIX, OUT_NAME_SUFFIX, SETTING_DATA_TIMEDIFF,
    SETTING_READ_FILES,
};

use weft_tests::common::fixtures::{
    AdapterFixtures, Command, FileFixtures, ParameterFixtures, Reading, RecordFixtures,
};
use weft_tests::common::mocks::MockBackend;
use weft_tests::common::recorder::RecordingCallback;
use weft_tests::common::{init_test_logging, temp_test_dir};

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Reading
// =============================================================================

#[tokio::test]
async fn test_file_polls_json_lines_in_order() {
    init_test_logging();
    let dir = temp_test_dir("weft-read");
    let readings = RecordFixtures::readings(2);
    let path = FileFixtures::write_records(dir.path(), "readings.json", &readings);

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    let recorder = RecordingCallback::<Reading>::new();
    connector.add_callback(recorder.clone());
    connector.enable_notifications(false);

    connector
        .connect(&ParameterFixtures::file_reader(
            &path.display().to_string(),
            Duration::from_millis(1000),
        ))
        .await
        .unwrap();
    assert!(connector.is_polling());
    assert!(connector.has_poller());

    assert_eq!(recorder.wait_for(2, WAIT).await, readings);
    // Nothing beyond the two lines shows up.
    assert_eq!(recorder.wait_for(3, Duration::from_millis(1500)).await.len(), 2);

    connector.disconnect().await.unwrap();
    assert_eq!(connector.metrics().dispatched, 2);
}

#[tokio::test]
async fn test_file_delivers_line_bytes() {
    init_test_logging();
    let dir = temp_test_dir("weft-bytes");
    let readings = RecordFixtures::readings(2);
    let path = FileFixtures::write_records(dir.path(), "readings.json", &readings);
    let expected: Vec<Vec<u8>> = readings
        .iter()
        .map(|r| serde_json::to_vec(r).unwrap())
        .collect();

    let connector = file_connector(vec![AdapterFixtures::raw_bytes()]).unwrap();
    let recorder = RecordingCallback::<Vec<u8>>::new();
    connector.add_callback(recorder.clone());
    connector.enable_notifications(false);

    connector
        .connect(&ParameterFixtures::file_reader(
            &path.display().to_string(),
            Duration::from_millis(1000),
        ))
        .await
        .unwrap();

    assert_eq!(recorder.wait_for(2, WAIT).await, expected);
    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_file_regex_selects_files_in_path_order() {
    init_test_logging();
    let dir = temp_test_dir("weft-regex");
    // Created out of order on purpose.
    for name in ["data_c.json", "data_a.json", "data_d.json", "data_b.json"] {
        let description = name.trim_end_matches(".json");
        FileFixtures::write_records(dir.path(), name, &[Reading::new(description, 1.0)]);
    }
    FileFixtures::write_records(dir.path(), "other.json", &[Reading::new("other", 0.0)]);
    let pattern = format!("{}/data_.*\\.json", dir.path().display());

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    let all = RecordingCallback::<Reading>::new();
    let only_b = RecordingCallback::<Reading>::new();
    connector.add_callback(all.clone());
    connector.add_channel_callback("data_b.json", only_b.clone());
    connector.enable_notifications(false);

    connector
        .connect(&ParameterFixtures::file_reader(&pattern, Duration::from_millis(50)))
        .await
        .unwrap();

    let descriptions: Vec<String> = all
        .wait_for(4, WAIT)
        .await
        .into_iter()
        .map(|r| r.description)
        .collect();
    assert_eq!(descriptions, vec!["data_a", "data_b", "data_c", "data_d"]);
    assert_eq!(only_b.records(), vec![Reading::new("data_b", 1.0)]);

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_file_pushes_lines_paced_by_data_interval() {
    init_test_logging();
    let dir = temp_test_dir("weft-push");
    let readings = RecordFixtures::readings_for("push", 5);
    let path = FileFixtures::write_records(dir.path(), "push.json", &readings);

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    let recorder = RecordingCallback::<Reading>::new();
    connector.add_callback(recorder.clone());

    let params = ConnectorParameter::builder("localhost", 10)
        .specific_setting(SETTING_READ_FILES, path.display().to_string())
        .specific_setting(SETTING_DATA_TIMEDIFF, 40)
        .build()
        .unwrap();
    connector.connect(&params).await.unwrap();
    assert!(!connector.is_polling());
    assert!(!connector.has_poller());

    assert_eq!(recorder.wait_for(5, WAIT).await, readings);
    let arrivals = recorder.arrivals();
    for pair in arrivals.windows(2) {
        assert!(pair[1] - pair[0] >= tokio::time::Duration::from_millis(20));
    }

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_file_time_difference_stretches_one_pause() {
    init_test_logging();
    let dir = temp_test_dir("weft-gap");
    let mut readings = RecordFixtures::readings(4);
    readings[0] = readings[0].clone().with_gap(Duration::from_millis(300));
    let path = FileFixtures::write_records(dir.path(), "gaps.json", &readings);

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    connector.set_data_time_difference_provider(|reading: &Reading| reading.gap_ms.map(Duration::from_millis));
    let recorder = RecordingCallback::<Reading>::new();
    connector.add_callback(recorder.clone());

    let params = ConnectorParameter::builder("localhost", 10)
        .specific_setting(SETTING_READ_FILES, path.display().to_string())
        .specific_setting(SETTING_DATA_TIMEDIFF, 10)
        .build()
        .unwrap();
    connector.connect(&params).await.unwrap();

    assert_eq!(recorder.wait_for(4, WAIT).await, readings);
    let long_pauses = recorder
        .arrivals()
        .windows(2)
        .filter(|pair| pair[1] - pair[0] >= tokio::time::Duration::from_millis(250))
        .count();
    assert_eq!(long_pauses, 1);

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_file_missing_input_connects() {
    init_test_logging();
    let dir = temp_test_dir("weft-missing");
    let missing = dir.path().join("absent.json");

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    let recorder = RecordingCallback::<Reading>::new();
    connector.add_callback(recorder.clone());

    connector
        .connect(&ParameterFixtures::file_reader(
            &missing.display().to_string(),
            Duration::from_millis(20),
        ))
        .await
        .unwrap();

    assert!(recorder.wait_for(1, Duration::from_millis(200)).await.is_empty());
    connector.disconnect().await.unwrap();
}

// =============================================================================
// Writing
// =============================================================================

#[tokio::test]
async fn test_file_write_creates_new_output_file() {
    init_test_logging();
    let dir = temp_test_dir("weft-write");
    let existing = format!("{}0_0{}", OUT_NAME_PREFIX, OUT_NAME_SUFFIX);
    fs::write(dir.path().join(&existing), "old\n").unwrap();
    let before = FileFixtures::file_names(dir.path());

    let connector = file_connector(vec![AdapterFixtures::json::<Command>()]).unwrap();
    connector
        .connect(&ParameterFixtures::file_writer(dir.path()))
        .await
        .unwrap();

    let command = RecordFixtures::command();
    connector.write(command.clone()).await.unwrap();
    connector.write(command.clone()).await.unwrap();
    assert_eq!(connector.backend().open_outputs().await, 1);
    connector.disconnect().await.unwrap();

    let created: Vec<String> = FileFixtures::file_names(dir.path())
        .into_iter()
        .filter(|name| !before.contains(name))
        .collect();
    assert_eq!(created.len(), 1, "created {:?}", created);
    assert!(is_written_file(&created[0], OUT_NAME_PREFIX, OUT_NAME_SUFFIX));
    assert_ne!(created[0], existing);

    let content = fs::read_to_string(dir.path().join(&created[0])).unwrap();
    let written: Vec<Command> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(written, vec![command.clone(), command]);
    assert_eq!(fs::read_to_string(dir.path().join(&existing)).unwrap(), "old\n");
}

#[tokio::test]
async fn test_file_write_per_channel_outputs() {
    init_test_logging();
    let dir = temp_test_dir("weft-channels");

    let connector = file_connector(vec![AdapterFixtures::json::<Command>()]).unwrap();
    connector
        .connect(&ParameterFixtures::file_writer(dir.path()))
        .await
        .unwrap();

    let command = RecordFixtures::command();
    connector.write_to_channel("valves", command.clone()).await.unwrap();
    connector.write_to_channel("pumps", command.clone()).await.unwrap();
    connector.write_to_channel("valves", command).await.unwrap();
    assert_eq!(connector.backend().open_outputs().await, 2);

    connector.disconnect().await.unwrap();
    assert_eq!(connector.backend().open_outputs().await, 0);

    let mut lines: Vec<usize> = FileFixtures::file_names(dir.path())
        .iter()
        .map(|name| fs::read_to_string(dir.path().join(name)).unwrap().lines().count())
        .collect();
    lines.sort();
    assert_eq!(lines, vec![1, 2]);
}

#[tokio::test]
async fn test_file_write_while_polling_idle_source() {
    init_test_logging();
    let dir = temp_test_dir("weft-idle");

    let connector = file_connector(vec![AdapterFixtures::json::<Command>()]).unwrap();
    connector.enable_notifications(false);
    let params = ParameterFixtures::file_writer(dir.path())
        .to_builder()
        .notification_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    connector.connect(&params).await.unwrap();
    assert!(connector.has_poller());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    connector.write(RecordFixtures::command()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < params.request_timeout() / 10, "write took {:?}", elapsed);
    assert_eq!(connector.backend().open_outputs().await, 1);
    connector.disconnect().await.unwrap();
    assert_eq!(FileFixtures::file_names(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_file_write_without_target_is_discarded() {
    init_test_logging();
    let dir = temp_test_dir("weft-discard");
    let path = FileFixtures::write_records(dir.path(), "in.json", &RecordFixtures::readings(1));

    let connector = file_connector(vec![AdapterFixtures::json::<Command>()]).unwrap();
    connector
        .connect(&ParameterFixtures::file_reader(
            &path.display().to_string(),
            Duration::ZERO,
        ))
        .await
        .unwrap();

    connector.write(RecordFixtures::command()).await.unwrap();
    assert_eq!(connector.backend().open_outputs().await, 0);
    assert_eq!(FileFixtures::file_names(dir.path()), vec!["in.json".to_string()]);

    connector.disconnect().await.unwrap();
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn test_file_disconnect_mid_poll_is_bounded() {
    init_test_logging();
    let dir = temp_test_dir("weft-stop");
    let readings = RecordFixtures::readings(500);
    let path = FileFixtures::write_records(dir.path(), "many.json", &readings);

    let connector = file_connector(vec![AdapterFixtures::json::<Reading>()]).unwrap();
    let recorder = RecordingCallback::<Reading>::new();
    connector.add_callback(recorder.clone());
    connector.enable_notifications(false);

    connector
        .connect(&ParameterFixtures::file_reader(
            &path.display().to_string(),
            Duration::from_millis(20),
        ))
        .await
        .unwrap();
    recorder.wait_for(2, WAIT).await;

    let started = Instant::now();
    connector.disconnect().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(300), "disconnect took {:?}", elapsed);
    assert_eq!(connector.state(), ConnectorState::Disconnected);
    assert!(!connector.has_poller());

    let delivered = recorder.len();
    assert!(delivered < readings.len());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(recorder.len(), delivered);
}

#[tokio::test]
async fn test_disconnect_interrupts_blocked_read() {
    init_test_logging();
    let backend = MockBackend::new();
    backend.block_reads(true);
    let connector = weft_core::Connector::new(backend, vec![AdapterFixtures::strings()]).unwrap();
    let recorder = RecordingCallback::<String>::new();
    connector.add_callback(recorder.clone());

    connector
        .connect(&ParameterFixtures::polling(Duration::from_millis(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    connector.disconnect().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(300), "disconnect took {:?}", elapsed);
    assert!(!connector.has_poller());
    assert_eq!(connector.backend().disconnects(), 1);
    assert!(recorder.is_empty());
}
