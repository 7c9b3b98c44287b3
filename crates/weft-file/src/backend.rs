// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! File connector backend.
//!
//! Reads the selected files line by line in a background task. Each line is
//! one datum tagged with the file name as channel:
//!
//! - **polling**: the line waits in a [`PollSlot`] until the connector's poll
//!   loop reads it
//! - **notifications**: the line is pushed right away, then the reader pauses
//!   for `DATA_TIMEDIFF` or a one-shot override from
//!   `notify_data_time_difference`
//!
//! Writes go to one file per channel, created on first write. When
//! `WRITE_FILES` is an existing directory, the file is named
//! `WRITE_PREFIX` + millis + `_` + sequence + `WRITE_SUFFIX` inside it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use weft_core::poll::WAIT_GRANULARITY;
use weft_core::{
    AdaptiveInterval, Capabilities, ChannelOutputs, ConnectContext, ConnectorBackend, ConnectorError,
    ConnectorParameter, ConnectorResult, DataSink, Incoming, ModelAccessRef, NotificationMode, PollSlot,
};

use crate::files::{output_file_name, resolve_read_files};
use crate::model::{FileModelAccess, FILE_CAPABILITIES};

/// Name of the file connector.
pub const NAME: &str = "File";

/// Files to read: files, directories or regular expressions, separated by `;` or `:`.
pub const SETTING_READ_FILES: &str = "READ_FILES";

/// File or existing directory to write to.
pub const SETTING_WRITE_FILES: &str = "WRITE_FILES";

/// Pause in milliseconds between pushed lines.
pub const SETTING_DATA_TIMEDIFF: &str = "DATA_TIMEDIFF";

/// Prefix of files written into a directory.
pub const SETTING_WRITE_PREFIX: &str = "WRITE_PREFIX";

/// Suffix of files written into a directory.
pub const SETTING_WRITE_SUFFIX: &str = "WRITE_SUFFIX";

/// Default prefix of written files.
pub const OUT_NAME_PREFIX: &str = "FileConnector_";

/// Default suffix of written files.
pub const OUT_NAME_SUFFIX: &str = ".txt";

const READER_STOP_BOUND: Duration = Duration::from_millis(100);

type Line = Incoming<Vec<u8>>;

// =============================================================================
// Session
// =============================================================================

/// State of one connection.
struct Session {
    slot: Arc<PollSlot<Line>>,
    running: Arc<AtomicBool>,
    pacing: Arc<AdaptiveInterval>,
    reader: Mutex<Option<JoinHandle<()>>>,
    write_target: Option<PathBuf>,
    prefix: String,
    suffix: String,
    request_timeout: Duration,
}

impl Session {
    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.slot.close();

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            let abort = reader.abort_handle();
            if tokio::time::timeout(READER_STOP_BOUND, reader).await.is_err() {
                abort.abort();
            }
        }
    }
}

struct Reader {
    files: Vec<PathBuf>,
    slot: Arc<PollSlot<Line>>,
    running: Arc<AtomicBool>,
    pacing: Arc<AdaptiveInterval>,
    sink: DataSink<Vec<u8>>,
    mode: NotificationMode,
}

impl Reader {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(self) {
        for file in &self.files {
            if !self.is_running() {
                break;
            }
            let channel = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let handle = match File::open(file).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!(file = %file.display(), error = %e, "While reading file");
                    continue;
                }
            };

            let mut lines = BufReader::new(handle).lines();
            while self.is_running() {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(file = %file.display(), error = %e, "While reading file");
                        break;
                    }
                };
                if !self.hand_over(Incoming::on_channel(line.into_bytes(), channel.clone())).await {
                    return;
                }
            }
        }
        debug!(files = self.files.len(), "File reader finished");
    }

    /// Delivers one line according to the current mode. Returns `false` once
    /// the connection is gone.
    async fn hand_over(&self, line: Line) -> bool {
        let mut line = line;
        loop {
            if !self.is_running() {
                return false;
            }

            if !self.mode.is_polling() {
                if !self.sink.push(line.payload, line.channel).await {
                    return false;
                }
                let delay = self.pacing.next_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return true;
            }

            match self.slot.try_offer(line) {
                Ok(()) => return true,
                Err(rejected) => {
                    line = rejected;
                    self.slot.wait_for_change(WAIT_GRANULARITY).await;
                }
            }
        }
    }
}

// =============================================================================
// FileBackend
// =============================================================================

/// Backend reading lines from files and writing payloads to files.
pub struct FileBackend {
    session: RwLock<Option<Arc<Session>>>,
    outputs: ChannelOutputs<File>,
}

impl FileBackend {
    /// Creates a backend. Files are selected on connect.
    pub fn new() -> Self {
        Self {
            session: RwLock::new(None),
            outputs: ChannelOutputs::new(),
        }
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    /// Returns the number of open output files.
    pub async fn open_outputs(&self) -> usize {
        self.outputs.len().await
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("connected", &self.session.read().is_some())
            .finish()
    }
}

async fn open_output(target: PathBuf, prefix: &str, suffix: &str) -> ConnectorResult<File> {
    let is_dir = tokio::fs::metadata(&target)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    let path = if is_dir {
        target.join(output_file_name(prefix, suffix))
    } else {
        target
    };

    match File::create(&path).await {
        Ok(file) => {
            debug!(file = %path.display(), "Opened output file");
            Ok(file)
        }
        Err(e) => {
            error!(file = %path.display(), error = %e, "While opening output file");
            Err(ConnectorError::io_with(format!("Cannot open {}", path.display()), e))
        }
    }
}

#[async_trait]
impl ConnectorBackend for FileBackend {
    type Output = Vec<u8>;
    type Input = Vec<u8>;

    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        FILE_CAPABILITIES
    }

    async fn connect_impl(
        &self,
        params: &ConnectorParameter,
        ctx: ConnectContext<Vec<u8>>,
    ) -> ConnectorResult<ModelAccessRef> {
        let files = match params.specific_string_setting(SETTING_READ_FILES) {
            Some(setting) => resolve_read_files(setting),
            None => {
                warn!("No READ_FILES specified");
                Vec::new()
            }
        };
        let write_target = params.specific_string_setting(SETTING_WRITE_FILES).map(PathBuf::from);
        let data_interval = params.specific_int_setting(SETTING_DATA_TIMEDIFF)?.unwrap_or(0).max(0) as u64;
        let prefix = params
            .specific_string_setting(SETTING_WRITE_PREFIX)
            .unwrap_or(OUT_NAME_PREFIX)
            .to_string();
        let suffix = params
            .specific_string_setting(SETTING_WRITE_SUFFIX)
            .unwrap_or(OUT_NAME_SUFFIX)
            .to_string();

        info!(
            read_files = ?files,
            write_files = ?write_target,
            data_timediff_ms = data_interval,
            "File connected"
        );

        let slot = Arc::new(PollSlot::new());
        let running = Arc::new(AtomicBool::new(true));
        let pacing = Arc::new(AdaptiveInterval::new(Duration::from_millis(data_interval)));

        let reader = Reader {
            files,
            slot: slot.clone(),
            running: running.clone(),
            pacing: pacing.clone(),
            sink: ctx.sink(),
            mode: ctx.mode(),
        };

        let session = Arc::new(Session {
            slot,
            running,
            pacing,
            reader: Mutex::new(Some(tokio::spawn(reader.run()))),
            write_target,
            prefix,
            suffix,
            request_timeout: params.request_timeout(),
        });

        let previous = self.session.write().replace(session);
        if let Some(previous) = previous {
            previous.stop().await;
        }

        Ok(Arc::new(FileModelAccess))
    }

    async fn read(&self) -> ConnectorResult<Option<Incoming<Vec<u8>>>> {
        match self.session() {
            Some(session) => Ok(session.slot.take(session.request_timeout).await),
            None => Ok(None),
        }
    }

    async fn write_impl(&self, data: Vec<u8>, channel: Option<&str>) -> ConnectorResult<()> {
        let session = self.session().ok_or(ConnectorError::NotConnected)?;
        let Some(target) = session.write_target.clone() else {
            debug!("No WRITE_FILES specified, data discarded");
            return Ok(());
        };

        let channel = channel.unwrap_or_default();
        let output = self
            .outputs
            .get_or_open(channel, || open_output(target, &session.prefix, &session.suffix))
            .await?;

        let mut file = output.lock().await;
        file.write_all(&data).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn disconnect_impl(&self) -> ConnectorResult<()> {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.stop().await;
        }

        for (channel, output) in self.outputs.take_all().await {
            let mut file = output.lock().await;
            if let Err(e) = file.flush().await {
                warn!(channel = %channel, error = %e, "Flushing output file failed");
            }
        }
        Ok(())
    }

    fn notify_data_time_difference(&self, difference: Duration) {
        if let Some(session) = self.session() {
            session.pacing.override_next(difference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_without_session_fails() {
        let backend = FileBackend::new();
        assert!(matches!(
            backend.write_impl(b"x".to_vec(), None).await,
            Err(ConnectorError::NotConnected)
        ));
        assert!(backend.read().await.unwrap().is_none());
        assert!(backend.disconnect_impl().await.is_ok());
    }

    #[tokio::test]
    async fn test_open_output_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        open_output(dir.path().to_path_buf(), "pre_", ".out").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("pre_") && names[0].ends_with(".out"));
    }

    #[tokio::test]
    async fn test_open_output_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.txt");
        assert!(matches!(
            open_output(target, OUT_NAME_PREFIX, OUT_NAME_SUFFIX).await,
            Err(ConnectorError::Io { .. })
        ));
    }
}
