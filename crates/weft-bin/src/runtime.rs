// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector runtime.
//!
//! Builds one connector per enabled configuration entry, connects them,
//! forwards every received record to a sink and disconnects everything on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use weft_config::{ConnectorConfig, WeftConfig};
use weft_core::{
    AdapterRef, Connector, ConnectorMetricsSnapshot, ConnectorRegistry, IdentityTranslator,
    TranslatingProtocolAdapter,
};
use weft_file::FileBackend;

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Connector passing raw records through.
pub type ByteConnector = Connector<FileBackend, Vec<u8>, Vec<u8>>;

/// Receives `(connector name, record)` for every delivered record.
pub type RecordSink = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// A connected connector with its configuration.
pub struct RunningConnector {
    /// Configuration entry.
    pub config: ConnectorConfig,
    /// The connector.
    pub connector: ByteConnector,
}

// =============================================================================
// ConnectorRuntime
// =============================================================================

/// Runs the configured connectors until shutdown.
pub struct ConnectorRuntime {
    config: WeftConfig,
    registry: Arc<ConnectorRegistry>,
    shutdown: ShutdownCoordinator,
    only: Option<String>,
}

impl ConnectorRuntime {
    /// Creates a runtime with a registry holding the built-in backends.
    pub fn new(config: WeftConfig) -> Self {
        Self {
            config,
            registry: builtin_registry(),
            shutdown: ShutdownCoordinator::new(),
            only: None,
        }
    }

    /// Restricts the runtime to the connector named `name`.
    pub fn only(mut self, name: Option<String>) -> Self {
        self.only = name;
        self
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.registry
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    fn selected(&self) -> Vec<&ConnectorConfig> {
        self.config
            .enabled_connectors()
            .filter(|c| self.only.as_deref().map_or(true, |name| c.name == name))
            .collect()
    }

    /// Builds the connector of one configuration entry.
    pub fn build_connector(&self, config: &ConnectorConfig) -> BinResult<ByteConnector> {
        let unknown = || BinError::UnknownBackend {
            backend: config.backend.clone(),
            connector: config.name.clone(),
        };
        let descriptor = self.registry.lookup(&config.backend).ok_or_else(unknown)?;

        match descriptor.name() {
            weft_file::CONNECTOR_NAME => {
                let adapter: AdapterRef<Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>> = Arc::new(
                    TranslatingProtocolAdapter::new(Arc::new(IdentityTranslator), Arc::new(IdentityTranslator)),
                );
                let connector = Connector::new(FileBackend::new(), vec![adapter])?
                    .with_registry(self.registry.clone())
                    .with_error_policy(config.error_policy);
                Ok(connector)
            }
            _ => Err(unknown()),
        }
    }

    /// Connects the selected connectors.
    ///
    /// If one connector fails, the ones connected before are disconnected.
    pub async fn start(&self, sink: RecordSink) -> BinResult<Vec<RunningConnector>> {
        let selected = self.selected();
        if selected.is_empty() {
            return Err(BinError::NoConnectors);
        }

        let mut running = Vec::with_capacity(selected.len());
        for config in selected {
            match self.start_one(config, sink.clone()).await {
                Ok(connector) => running.push(RunningConnector {
                    config: config.clone(),
                    connector,
                }),
                Err(e) => {
                    Self::stop(running).await;
                    return Err(e.with_context(format!("Starting connector '{}'", config.name)));
                }
            }
        }
        Ok(running)
    }

    async fn start_one(&self, config: &ConnectorConfig, sink: RecordSink) -> BinResult<ByteConnector> {
        let params = config.to_parameter()?;
        let connector = self.build_connector(config)?;
        connector.enable_notifications(!config.wants_polling());

        let name = config.name.clone();
        connector.add_callback(move |record: Vec<u8>| sink(&name, &record));

        connector.connect(&params).await?;
        info!(
            connector = %config.name,
            backend = %config.backend,
            polling = connector.is_polling(),
            "Connector started"
        );
        Ok(connector)
    }

    /// Disconnects and disposes the connectors, returning their final metrics.
    pub async fn stop(running: Vec<RunningConnector>) -> Vec<(String, ConnectorMetricsSnapshot)> {
        let mut metrics = Vec::with_capacity(running.len());
        for RunningConnector { config, connector } in running {
            if let Err(e) = connector.disconnect().await {
                warn!(connector = %config.name, error = %e, "Disconnect failed");
            }
            if let Err(e) = connector.dispose().await {
                warn!(connector = %config.name, error = %e, "Dispose failed");
            }
            metrics.push((config.name, connector.metrics()));
        }
        metrics
    }

    /// Runs until shutdown or until `duration` elapsed.
    pub async fn run(
        self,
        sink: RecordSink,
        duration: Option<Duration>,
    ) -> BinResult<Vec<(String, ConnectorMetricsSnapshot)>> {
        let running = self.start(sink).await?;
        info!(connectors = running.len(), "Weft running");

        let reason = self.shutdown.wait_for_shutdown(duration).await;
        let metrics = Self::stop(running).await;
        info!(%reason, "Weft shutdown complete");
        Ok(metrics)
    }
}

/// Returns a registry holding the built-in connector backends.
pub fn builtin_registry() -> Arc<ConnectorRegistry> {
    let registry = Arc::new(ConnectorRegistry::new());
    weft_file::register(&registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn config_for(name: &str, read_files: &str) -> ConnectorConfig {
        let mut config = ConnectorConfig::new(name).with_setting("READ_FILES", read_files);
        config.notification_interval_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let mut config = ConnectorConfig::new("x");
        config.backend = "Modbus".into();
        let runtime = ConnectorRuntime::new(WeftConfig { connectors: vec![config.clone()] });

        assert!(matches!(
            runtime.build_connector(&config),
            Err(BinError::UnknownBackend { ref backend, .. }) if backend == "Modbus"
        ));
    }

    #[tokio::test]
    async fn test_no_enabled_connectors() {
        let mut config = ConnectorConfig::new("x");
        config.enabled = false;
        let runtime = ConnectorRuntime::new(WeftConfig { connectors: vec![config] });

        let sink: RecordSink = Arc::new(|_, _| {});
        assert!(runtime.start(sink).await.is_err());
    }

    #[tokio::test]
    async fn test_start_delivers_records() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lines.txt");
        std::fs::write(&file, "one\ntwo\n").unwrap();

        let runtime = ConnectorRuntime::new(WeftConfig {
            connectors: vec![config_for("lines", &file.display().to_string())],
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: RecordSink = Arc::new(move |name, record| {
            let _ = tx.send((name.to_string(), String::from_utf8_lossy(record).into_owned()));
        });

        let running = runtime.start(sink).await.unwrap();
        assert_eq!(running.len(), 1);
        assert!(!running[0].connector.is_polling());
        assert_eq!(runtime.registry().instances().len(), 1);

        let mut received = Vec::new();
        while received.len() < 2 {
            let item = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
            received.push(item);
        }
        assert_eq!(
            received,
            vec![("lines".to_string(), "one".to_string()), ("lines".to_string(), "two".to_string())]
        );

        let metrics = ConnectorRuntime::stop(running).await;
        assert_eq!(metrics[0].1.dispatched, 2);
        assert!(runtime.registry().instances().is_empty());
    }

    #[tokio::test]
    async fn test_only_filter() {
        let runtime = ConnectorRuntime::new(WeftConfig {
            connectors: vec![config_for("a", "/nonexistent"), config_for("b", "/nonexistent")],
        })
        .only(Some("b".into()));

        let names: Vec<_> = runtime.selected().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["b".to_string()]);
    }
}
