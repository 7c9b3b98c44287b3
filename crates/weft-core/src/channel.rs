// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Channel connectors.
//!
//! A [`ChannelConnector`] multiplexes named sub-streams over one backend.
//! Every adapter declares the channel it translates received data from and
//! the channel its commands are written to; routing uses
//! [`ChannelAdapterSelector`]. Incoming data on an unknown channel is dropped
//! with a warning.
//!
//! Backends keep one lazily opened output per channel in
//! [`ChannelOutputs`] and close them all on `disconnect_impl`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::adapter::{AdapterRef, ChannelAdapterSelector, Payload};
use crate::connector::{Connector, ConnectorBackend};
use crate::error::{ConnectorError, ConnectorResult, ParameterError};

// =============================================================================
// ChannelConnector
// =============================================================================

/// A connector routing data and commands by channel name.
///
/// Dereferences to the underlying [`Connector`] for lifecycle, callbacks
/// and writes. [`Connector::write`] sends to the selected adapter's input
/// channel; [`Connector::write_to_channel`] names it explicitly.
pub struct ChannelConnector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    inner: Connector<B, CO, CI>,
    channels: Vec<(String, String)>,
}

impl<B, CO, CI> ChannelConnector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    /// Creates a channel connector.
    ///
    /// # Errors
    ///
    /// Fails if `adapters` is empty or an adapter does not declare both
    /// channels.
    pub fn new(backend: B, adapters: Vec<AdapterRef<B::Output, B::Input, CO, CI>>) -> ConnectorResult<Self> {
        let mut channels = Vec::with_capacity(adapters.len());
        for (index, adapter) in adapters.iter().enumerate() {
            match (adapter.output_channel(), adapter.input_channel()) {
                (Some(output), Some(input)) => channels.push((output.to_string(), input.to_string())),
                _ => {
                    return Err(ParameterError::validation(
                        format!("adapters[{}]", index),
                        "channel adapters must declare an output and an input channel",
                    )
                    .into())
                }
            }
        }

        let inner = Connector::new(backend, adapters)?.with_selector(Arc::new(ChannelAdapterSelector));
        Ok(Self { inner, channels })
    }

    /// Returns the declared `(output, input)` channel pairs.
    pub fn channels(&self) -> &[(String, String)] {
        &self.channels
    }

    /// Returns the underlying connector.
    pub fn connector(&self) -> &Connector<B, CO, CI> {
        &self.inner
    }

    /// Unwraps the underlying connector.
    pub fn into_inner(self) -> Connector<B, CO, CI> {
        self.inner
    }
}

impl<B, CO, CI> Deref for ChannelConnector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    type Target = Connector<B, CO, CI>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

// =============================================================================
// ChannelOutputs
// =============================================================================

#[derive(Debug)]
struct OutputsState<W> {
    writers: HashMap<String, Arc<Mutex<W>>>,
    failed: HashSet<String>,
}

/// One lazily opened output per channel.
///
/// A channel whose output failed to open is not retried until
/// [`take_all`](Self::take_all) resets the set.
#[derive(Debug)]
pub struct ChannelOutputs<W> {
    state: Mutex<OutputsState<W>>,
}

impl<W: Send> ChannelOutputs<W> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OutputsState {
                writers: HashMap::new(),
                failed: HashSet::new(),
            }),
        }
    }

    /// Returns the output of `channel`, opening it with `open` on first use.
    ///
    /// # Errors
    ///
    /// Returns the error of `open`, or an I/O error if opening failed before.
    pub async fn get_or_open<F, Fut>(&self, channel: &str, open: F) -> ConnectorResult<Arc<Mutex<W>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConnectorResult<W>>,
    {
        let mut state = self.state.lock().await;
        if let Some(writer) = state.writers.get(channel) {
            return Ok(writer.clone());
        }
        if state.failed.contains(channel) {
            return Err(ConnectorError::io(format!(
                "Output for channel '{}' failed to open before",
                channel
            )));
        }

        match open().await {
            Ok(writer) => {
                let writer = Arc::new(Mutex::new(writer));
                state.writers.insert(channel.to_string(), writer.clone());
                debug!(channel, "Opened channel output");
                Ok(writer)
            }
            Err(e) => {
                state.failed.insert(channel.to_string());
                Err(e)
            }
        }
    }

    /// Removes and returns all outputs, clearing failure marks.
    pub async fn take_all(&self) -> Vec<(String, Arc<Mutex<W>>)> {
        let mut state = self.state.lock().await;
        state.failed.clear();
        state.writers.drain().collect()
    }

    /// Returns the number of open outputs.
    pub async fn len(&self) -> usize {
        self.state.lock().await.writers.len()
    }

    /// Returns `true` if no output is open.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.writers.is_empty()
    }
}

impl<W: Send> Default for ChannelOutputs<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ChannelTranslatingProtocolAdapter, IdentityTranslator, TranslatingProtocolAdapter};
    use crate::connector::{ConnectContext, Incoming};
    use crate::model::{Capabilities, ModelAccess, ModelAccessRef};
    use crate::parameter::ConnectorParameter;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoModel;

    #[async_trait]
    impl ModelAccess for NoModel {
        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        written: parking_lot::Mutex<Vec<(String, Option<String>)>>,
        outputs: ChannelOutputs<Vec<String>>,
    }

    #[async_trait]
    impl ConnectorBackend for RecordingBackend {
        type Output = String;
        type Input = String;

        fn name(&self) -> &str {
            "recording"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                supports_events: true,
                ..Capabilities::default()
            }
        }

        async fn connect_impl(
            &self,
            _params: &ConnectorParameter,
            ctx: ConnectContext<String>,
        ) -> ConnectorResult<ModelAccessRef> {
            let sink = ctx.sink();
            tokio::spawn(async move {
                sink.push("for-a".into(), Some("a".into())).await;
                sink.push("for-b".into(), Some("b".into())).await;
                sink.push("lost".into(), Some("c".into())).await;
            });
            Ok(Arc::new(NoModel))
        }

        async fn read(&self) -> ConnectorResult<Option<Incoming<String>>> {
            Ok(None)
        }

        async fn write_impl(&self, data: String, channel: Option<&str>) -> ConnectorResult<()> {
            let key = channel.unwrap_or_default();
            let output = self.outputs.get_or_open(key, || async { Ok(Vec::new()) }).await?;
            output.lock().await.push(data.clone());
            self.written.lock().push((data, channel.map(str::to_string)));
            Ok(())
        }

        async fn disconnect_impl(&self) -> ConnectorResult<()> {
            self.outputs.take_all().await;
            Ok(())
        }
    }

    type Adapter = AdapterRef<String, String, String, String>;

    fn channel_adapter(output: &str, input: &str) -> Adapter {
        Arc::new(ChannelTranslatingProtocolAdapter::<String, String, String, String>::new(
            output,
            Arc::new(IdentityTranslator),
            input,
            Arc::new(IdentityTranslator),
        ))
    }

    #[test]
    fn test_requires_channel_adapters() {
        let plain: Adapter = Arc::new(TranslatingProtocolAdapter::<String, String, String, String>::new(
            Arc::new(IdentityTranslator),
            Arc::new(IdentityTranslator),
        ));
        let result = ChannelConnector::new(RecordingBackend::default(), vec![plain]);
        assert!(matches!(result, Err(ConnectorError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_routes_by_channel() {
        let connector = ChannelConnector::new(
            RecordingBackend::default(),
            vec![channel_adapter("a", "out-a"), channel_adapter("b", "out-b")],
        )
        .unwrap();
        assert_eq!(connector.channels().len(), 2);

        let only_b = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = only_b.clone();
        connector.add_channel_callback("b", move |v: String| sink.lock().push(v));
        let all = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = all.clone();
        connector.add_callback(move |v: String| sink.lock().push(v));

        let params = ConnectorParameter::builder("localhost", 0).build().unwrap();
        connector.connect(&params).await.unwrap();
        assert!(!connector.is_polling());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while connector.metrics().dropped < 1 && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(*all.lock(), vec!["for-a", "for-b"]);
        assert_eq!(*only_b.lock(), vec!["for-b"]);
        assert_eq!(connector.metrics().dropped, 1);

        connector.write("cmd".into()).await.unwrap();
        connector.write_to_channel("out-b", "cmd-b".into()).await.unwrap();
        assert_eq!(connector.backend().outputs.len().await, 2);

        connector.disconnect().await.unwrap();
        assert!(connector.backend().outputs.is_empty().await);
        assert_eq!(
            *connector.backend().written.lock(),
            vec![
                ("cmd".to_string(), Some("out-a".to_string())),
                ("cmd-b".to_string(), Some("out-b".to_string()))
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_output_is_not_retried() {
        let outputs: ChannelOutputs<u32> = ChannelOutputs::new();

        let first = outputs
            .get_or_open("x", || async { Err(ConnectorError::io("disk full")) })
            .await;
        assert!(first.is_err());

        let second = outputs.get_or_open("x", || async { Ok(1) }).await;
        assert!(second.is_err());

        outputs.take_all().await;
        assert!(outputs.get_or_open("x", || async { Ok(1) }).await.is_ok());
    }
}
