// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Record types, data files and connector parameters shared by the
//! integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use weft_core::{
    AdapterRef, ChannelTranslatingProtocolAdapter, ConnectorParameter, IdentityTranslator,
    TranslatingProtocolAdapter,
};
use weft_file::{SETTING_DATA_TIMEDIFF, SETTING_READ_FILES, SETTING_WRITE_FILES};

// =============================================================================
// Records
// =============================================================================

/// A measurement as replayed from data files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Description, ordered by file position in the fixtures.
    pub description: String,
    /// Measured value.
    pub value: f64,
    /// Gap to the next reading in milliseconds, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_ms: Option<u64>,
}

impl Reading {
    /// Creates a reading.
    pub fn new(description: impl Into<String>, value: f64) -> Self {
        Self {
            description: description.into(),
            value,
            gap_ms: None,
        }
    }

    /// Sets the gap to the next reading.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap_ms = Some(gap.as_millis() as u64);
        self
    }
}

/// A command written to a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command id.
    pub id: String,
    /// Target of the command.
    pub target: String,
    /// Arguments.
    pub args: Vec<i64>,
}

/// Pre-built records.
pub struct RecordFixtures;

impl RecordFixtures {
    /// Returns `count` readings described `reading-00`, `reading-01`, ...
    pub fn readings(count: usize) -> Vec<Reading> {
        (0..count)
            .map(|i| Reading::new(format!("reading-{:02}", i), i as f64 * 1.5))
            .collect()
    }

    /// Returns readings with descriptions prefixed by `prefix`.
    pub fn readings_for(prefix: &str, count: usize) -> Vec<Reading> {
        (0..count)
            .map(|i| Reading::new(format!("{}-{:02}", prefix, i), i as f64))
            .collect()
    }

    /// Returns a command.
    pub fn command() -> Command {
        Command {
            id: "cmd-1".to_string(),
            target: "valve".to_string(),
            args: vec![1, 0, 42],
        }
    }
}

// =============================================================================
// Files
// =============================================================================

/// Helpers for data files.
pub struct FileFixtures;

impl FileFixtures {
    /// Writes `lines` into `dir/name`, one per line.
    pub fn write_lines(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).expect("Failed to write data file");
        path
    }

    /// Writes `records` as JSON lines into `dir/name`.
    pub fn write_records<T: Serialize>(dir: &Path, name: &str, records: &[T]) -> PathBuf {
        let lines: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).expect("Failed to serialize record"))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        Self::write_lines(dir, name, &refs)
    }

    /// Returns the sorted file names in `dir`.
    pub fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("Failed to list directory")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Pre-built connector parameters.
pub struct ParameterFixtures;

impl ParameterFixtures {
    /// Parameters for a mock backend polling every `interval`.
    pub fn polling(interval: Duration) -> ConnectorParameter {
        ConnectorParameter::builder("localhost", 10)
            .notification_interval(interval)
            .request_timeout(Duration::from_secs(1))
            .build()
            .expect("valid parameters")
    }

    /// Parameters for a file connector reading `read_files`.
    pub fn file_reader(read_files: &str, interval: Duration) -> ConnectorParameter {
        ConnectorParameter::builder("localhost", 10)
            .notification_interval(interval)
            .request_timeout(Duration::from_millis(500))
            .specific_setting(SETTING_READ_FILES, read_files)
            .specific_setting(SETTING_DATA_TIMEDIFF, 10)
            .build()
            .expect("valid parameters")
    }

    /// Parameters for a file connector writing to `write_files`.
    pub fn file_writer(write_files: &Path) -> ConnectorParameter {
        ConnectorParameter::builder("localhost", 10)
            .notification_interval(Duration::from_millis(1000))
            .specific_setting(SETTING_WRITE_FILES, write_files.display().to_string())
            .build()
            .expect("valid parameters")
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// Pre-built adapters.
pub struct AdapterFixtures;

impl AdapterFixtures {
    /// JSON adapter serving every channel of a file connector.
    pub fn json<T>() -> AdapterRef<Vec<u8>, Vec<u8>, T, T>
    where
        T: Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Arc::new(ChannelTranslatingProtocolAdapter::<Vec<u8>, Vec<u8>, T, T>::json("*", ""))
    }

    /// Adapter passing raw bytes through, on all channels.
    pub fn raw_bytes() -> AdapterRef<Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>> {
        Arc::new(ChannelTranslatingProtocolAdapter::<Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>>::new(
            "*",
            Arc::new(IdentityTranslator),
            "",
            Arc::new(IdentityTranslator),
        ))
    }

    /// Adapter passing strings through, for the mock backend.
    pub fn strings() -> AdapterRef<String, String, String, String> {
        Arc::new(TranslatingProtocolAdapter::<String, String, String, String>::new(
            Arc::new(IdentityTranslator),
            Arc::new(IdentityTranslator),
        ))
    }
}
