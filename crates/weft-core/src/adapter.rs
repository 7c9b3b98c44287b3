// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol adapters.
//!
//! A [`ProtocolAdapter`] translates between the payloads a backend moves over
//! its transport and the typed records the application works with:
//!
//! ```text
//!   backend  --O-->  adapter.to()    --CO-->  reception callbacks
//!   backend  <--I--  adapter.from()  <--CI--  connector.write()
//! ```
//!
//! Adapters receive the connector's [`ModelAccess`](crate::model::ModelAccess)
//! after `connect` succeeds and lose it again on `disconnect`. Channel
//! adapters additionally declare the channels they serve, which the
//! [`ChannelAdapterSelector`] uses for routing.
//!
//! The translation itself is usually split into an [`OutputTranslator`] and
//! an [`InputTranslator`] composed by [`TranslatingProtocolAdapter`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ConnectorError, ConnectorResult};
use crate::model::ModelAccessRef;

/// Bound for everything flowing through a connector.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}

/// Shared handle to a protocol adapter.
pub type AdapterRef<O, I, CO, CI> = Arc<dyn ProtocolAdapter<O, I, CO, CI>>;

// =============================================================================
// ProtocolAdapter
// =============================================================================

/// Translation boundary between backend payloads and typed records.
///
/// Type parameters:
///
/// - `O`: payload received from the backend
/// - `I`: payload sent to the backend
/// - `CO`: typed record delivered to callbacks
/// - `CI`: typed command accepted by `write`
#[async_trait]
pub trait ProtocolAdapter<O: Payload, I: Payload, CO: Payload, CI: Payload>: Send + Sync {
    /// Translates one received payload into a typed record.
    ///
    /// May read through model access but must not cache results between calls.
    async fn to(&self, data: &O) -> ConnectorResult<CO>;

    /// Translates one command into a payload.
    ///
    /// `None` is valid when the command was fully carried out through model
    /// access and nothing remains to be sent.
    async fn from(&self, data: &CI) -> ConnectorResult<Option<I>>;

    /// Binds (`Some`) or unbinds (`None`) model access.
    fn set_model_access(&self, access: Option<ModelAccessRef>);

    /// Returns the bound model access.
    fn model_access(&self) -> Option<ModelAccessRef>;

    /// One-time setup after model access has been bound, e.g. monitoring.
    ///
    /// Failures abort `connect`, except the "events not supported" capability
    /// error, which switches the connector to polling.
    async fn initialize_model_access(&self) -> ConnectorResult<()> {
        Ok(())
    }

    /// Channel whose received data this adapter translates.
    fn output_channel(&self) -> Option<&str> {
        None
    }

    /// Channel this adapter's payloads are written to.
    fn input_channel(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// ModelAccessSlot
// =============================================================================

/// Holder for the model access bound into an adapter.
#[derive(Default)]
pub struct ModelAccessSlot {
    access: RwLock<Option<ModelAccessRef>>,
}

impl ModelAccessSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the bound access.
    pub fn set(&self, access: Option<ModelAccessRef>) {
        *self.access.write() = access;
    }

    /// Returns the bound access.
    pub fn get(&self) -> Option<ModelAccessRef> {
        self.access.read().clone()
    }

    /// Returns the bound access or `NotConnected`.
    pub fn require(&self) -> ConnectorResult<ModelAccessRef> {
        self.get().ok_or(ConnectorError::NotConnected)
    }

    /// Returns `true` if access is bound.
    pub fn is_bound(&self) -> bool {
        self.access.read().is_some()
    }
}

impl std::fmt::Debug for ModelAccessSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAccessSlot")
            .field("bound", &self.is_bound())
            .finish()
    }
}

// =============================================================================
// Translators
// =============================================================================

/// Translates received payloads into typed records.
#[async_trait]
pub trait OutputTranslator<O: Payload, CO: Payload>: Send + Sync {
    /// Translates one payload. `access` is `None` while disconnected.
    async fn to(&self, data: &O, access: Option<&ModelAccessRef>) -> ConnectorResult<CO>;

    /// One-time setup after model access has been bound.
    async fn initialize_model_access(&self, _access: &ModelAccessRef) -> ConnectorResult<()> {
        Ok(())
    }
}

/// Translates typed commands into payloads.
#[async_trait]
pub trait InputTranslator<CI: Payload, I: Payload>: Send + Sync {
    /// Translates one command. `access` is `None` while disconnected.
    async fn from(&self, data: &CI, access: Option<&ModelAccessRef>) -> ConnectorResult<Option<I>>;
}

/// Passes payloads through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

#[async_trait]
impl<T: Payload + Clone> OutputTranslator<T, T> for IdentityTranslator {
    async fn to(&self, data: &T, _access: Option<&ModelAccessRef>) -> ConnectorResult<T> {
        Ok(data.clone())
    }
}

#[async_trait]
impl<T: Payload + Clone> InputTranslator<T, T> for IdentityTranslator {
    async fn from(&self, data: &T, _access: Option<&ModelAccessRef>) -> ConnectorResult<Option<T>> {
        Ok(Some(data.clone()))
    }
}

// =============================================================================
// Serializers
// =============================================================================

/// Narrow serialization interface used as glue between bytes and records.
pub trait Serializer<T>: Send + Sync {
    /// Serializes a value.
    fn to_bytes(&self, value: &T) -> ConnectorResult<Vec<u8>>;

    /// Deserializes a value.
    fn from_bytes(&self, data: &[u8]) -> ConnectorResult<T>;
}

/// JSON serializer based on `serde_json`.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    /// Creates a JSON serializer.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serializer<T> for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self, value: &T) -> ConnectorResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ConnectorError::translation_with("JSON serialization failed", e))
    }

    fn from_bytes(&self, data: &[u8]) -> ConnectorResult<T> {
        serde_json::from_slice(data)
            .map_err(|e| ConnectorError::translation_with("JSON deserialization failed", e))
    }
}

/// Output translator deserializing byte payloads.
pub struct SerializerOutputTranslator<T> {
    serializer: Arc<dyn Serializer<T>>,
}

impl<T> SerializerOutputTranslator<T> {
    /// Creates the translator.
    pub fn new(serializer: Arc<dyn Serializer<T>>) -> Self {
        Self { serializer }
    }
}

#[async_trait]
impl<T: Payload> OutputTranslator<Vec<u8>, T> for SerializerOutputTranslator<T> {
    async fn to(&self, data: &Vec<u8>, _access: Option<&ModelAccessRef>) -> ConnectorResult<T> {
        self.serializer.from_bytes(data)
    }
}

/// Input translator serializing commands into byte payloads.
pub struct SerializerInputTranslator<T> {
    serializer: Arc<dyn Serializer<T>>,
}

impl<T> SerializerInputTranslator<T> {
    /// Creates the translator.
    pub fn new(serializer: Arc<dyn Serializer<T>>) -> Self {
        Self { serializer }
    }
}

#[async_trait]
impl<T: Payload> InputTranslator<T, Vec<u8>> for SerializerInputTranslator<T> {
    async fn from(&self, data: &T, _access: Option<&ModelAccessRef>) -> ConnectorResult<Option<Vec<u8>>> {
        self.serializer.to_bytes(data).map(Some)
    }
}

// =============================================================================
// Translating adapters
// =============================================================================

/// Adapter composed of an output and an input translator.
pub struct TranslatingProtocolAdapter<O, I, CO, CI> {
    output: Arc<dyn OutputTranslator<O, CO>>,
    input: Arc<dyn InputTranslator<CI, I>>,
    access: ModelAccessSlot,
}

impl<O: Payload, I: Payload, CO: Payload, CI: Payload> TranslatingProtocolAdapter<O, I, CO, CI> {
    /// Creates the adapter.
    pub fn new(
        output: Arc<dyn OutputTranslator<O, CO>>,
        input: Arc<dyn InputTranslator<CI, I>>,
    ) -> Self {
        Self {
            output,
            input,
            access: ModelAccessSlot::new(),
        }
    }
}

impl<T> TranslatingProtocolAdapter<Vec<u8>, Vec<u8>, T, T>
where
    T: Serialize + DeserializeOwned + Payload,
{
    /// Creates an adapter (de)serializing records as JSON.
    pub fn json() -> Self {
        let serializer: Arc<dyn Serializer<T>> = Arc::new(JsonSerializer::new());
        Self::new(
            Arc::new(SerializerOutputTranslator::new(serializer.clone())),
            Arc::new(SerializerInputTranslator::new(serializer)),
        )
    }
}

#[async_trait]
impl<O: Payload, I: Payload, CO: Payload, CI: Payload> ProtocolAdapter<O, I, CO, CI>
    for TranslatingProtocolAdapter<O, I, CO, CI>
{
    async fn to(&self, data: &O) -> ConnectorResult<CO> {
        let access = self.access.get();
        self.output.to(data, access.as_ref()).await
    }

    async fn from(&self, data: &CI) -> ConnectorResult<Option<I>> {
        let access = self.access.get();
        self.input.from(data, access.as_ref()).await
    }

    fn set_model_access(&self, access: Option<ModelAccessRef>) {
        self.access.set(access);
    }

    fn model_access(&self) -> Option<ModelAccessRef> {
        self.access.get()
    }

    async fn initialize_model_access(&self) -> ConnectorResult<()> {
        let access = self.access.require()?;
        self.output.initialize_model_access(&access).await
    }
}

/// Translating adapter serving named channels.
pub struct ChannelTranslatingProtocolAdapter<O, I, CO, CI> {
    inner: TranslatingProtocolAdapter<O, I, CO, CI>,
    output_channel: String,
    input_channel: String,
}

impl<O: Payload, I: Payload, CO: Payload, CI: Payload> ChannelTranslatingProtocolAdapter<O, I, CO, CI> {
    /// Creates the adapter for the given output and input channels.
    pub fn new(
        output_channel: impl Into<String>,
        output: Arc<dyn OutputTranslator<O, CO>>,
        input_channel: impl Into<String>,
        input: Arc<dyn InputTranslator<CI, I>>,
    ) -> Self {
        Self {
            inner: TranslatingProtocolAdapter::new(output, input),
            output_channel: output_channel.into(),
            input_channel: input_channel.into(),
        }
    }
}

impl<T> ChannelTranslatingProtocolAdapter<Vec<u8>, Vec<u8>, T, T>
where
    T: Serialize + DeserializeOwned + Payload,
{
    /// Creates a JSON adapter for the given channels.
    pub fn json(output_channel: impl Into<String>, input_channel: impl Into<String>) -> Self {
        Self {
            inner: TranslatingProtocolAdapter::json(),
            output_channel: output_channel.into(),
            input_channel: input_channel.into(),
        }
    }
}

#[async_trait]
impl<O: Payload, I: Payload, CO: Payload, CI: Payload> ProtocolAdapter<O, I, CO, CI>
    for ChannelTranslatingProtocolAdapter<O, I, CO, CI>
{
    async fn to(&self, data: &O) -> ConnectorResult<CO> {
        self.inner.to(data).await
    }

    async fn from(&self, data: &CI) -> ConnectorResult<Option<I>> {
        self.inner.from(data).await
    }

    fn set_model_access(&self, access: Option<ModelAccessRef>) {
        self.inner.set_model_access(access);
    }

    fn model_access(&self) -> Option<ModelAccessRef> {
        self.inner.model_access()
    }

    async fn initialize_model_access(&self) -> ConnectorResult<()> {
        self.inner.initialize_model_access().await
    }

    fn output_channel(&self) -> Option<&str> {
        Some(&self.output_channel)
    }

    fn input_channel(&self) -> Option<&str> {
        Some(&self.input_channel)
    }
}

// =============================================================================
// Selectors
// =============================================================================

/// Chooses the adapter responsible for a datum or command.
pub trait AdapterSelector<O: Payload, I: Payload, CO: Payload, CI: Payload>: Send + Sync {
    /// Selects the adapter translating received `data` on `channel`.
    fn select_output<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        channel: Option<&str>,
        data: &O,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>>;

    /// Selects the adapter translating the command `data` for `channel`.
    fn select_input<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        channel: Option<&str>,
        data: &CI,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>>;
}

/// Always selects the first adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAdapterSelector;

impl<O: Payload, I: Payload, CO: Payload, CI: Payload> AdapterSelector<O, I, CO, CI>
    for FirstAdapterSelector
{
    fn select_output<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        _channel: Option<&str>,
        _data: &O,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>> {
        adapters.first()
    }

    fn select_input<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        _channel: Option<&str>,
        _data: &CI,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>> {
        adapters.first()
    }
}

/// Selects adapters by their declared channel names.
///
/// A sole adapter serves every channel. Without a channel the first adapter
/// is the default. Anything else unresolved yields `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelAdapterSelector;

impl ChannelAdapterSelector {
    fn select<'a, A>(
        adapters: &'a [A],
        channel: Option<&str>,
        declared: impl Fn(&A) -> Option<&str>,
    ) -> Option<&'a A> {
        if adapters.len() == 1 {
            return adapters.first();
        }
        match channel {
            None => adapters.first(),
            Some(channel) => adapters.iter().find(|a| declared(a) == Some(channel)),
        }
    }
}

impl<O: Payload, I: Payload, CO: Payload, CI: Payload> AdapterSelector<O, I, CO, CI>
    for ChannelAdapterSelector
{
    fn select_output<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        channel: Option<&str>,
        _data: &O,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>> {
        Self::select(adapters, channel, |a| a.output_channel())
    }

    fn select_input<'a>(
        &self,
        adapters: &'a [AdapterRef<O, I, CO, CI>],
        channel: Option<&str>,
        _data: &CI,
    ) -> Option<&'a AdapterRef<O, I, CO, CI>> {
        Self::select(adapters, channel, |a| a.input_channel())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Capabilities, ModelAccess};
    use crate::types::Value;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    /// Model exposing a single scale factor property.
    struct ScaleModel;

    #[async_trait]
    impl ModelAccess for ScaleModel {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                has_model: true,
                model_properties: true,
                ..Capabilities::default()
            }
        }

        async fn get(&self, qname: &str) -> ConnectorResult<Value> {
            match qname {
                "config/scale" => Ok(Value::Double(2.0)),
                other => Err(ConnectorError::element_not_found(other)),
            }
        }
    }

    /// Scales raw numbers using the model's scale factor.
    struct ScalingTranslator;

    #[async_trait]
    impl OutputTranslator<f64, f64> for ScalingTranslator {
        async fn to(&self, data: &f64, access: Option<&ModelAccessRef>) -> ConnectorResult<f64> {
            let access = access.ok_or(ConnectorError::NotConnected)?;
            let scale = access.get(&access.qname(&["config", "scale"])).await?;
            Ok(data * access.to_double(&scale)?)
        }
    }

    #[tokio::test]
    async fn test_translating_adapter_reads_through_model() {
        let adapter: TranslatingProtocolAdapter<f64, f64, f64, f64> =
            TranslatingProtocolAdapter::new(Arc::new(ScalingTranslator), Arc::new(IdentityTranslator));

        assert!(matches!(adapter.to(&1.5).await, Err(ConnectorError::NotConnected)));
        assert!(adapter.initialize_model_access().await.is_err());

        adapter.set_model_access(Some(Arc::new(ScaleModel)));
        adapter.initialize_model_access().await.unwrap();
        assert_eq!(adapter.to(&1.5).await.unwrap(), 3.0);
        assert_eq!(adapter.from(&4.0).await.unwrap(), Some(4.0));

        adapter.set_model_access(None);
        assert!(adapter.model_access().is_none());
    }

    #[tokio::test]
    async fn test_json_adapter() {
        let adapter: TranslatingProtocolAdapter<Vec<u8>, Vec<u8>, Reading, Reading> =
            TranslatingProtocolAdapter::json();

        let reading = adapter
            .to(&br#"{"sensor":"t1","value":21.5}"#.to_vec())
            .await
            .unwrap();
        assert_eq!(reading.sensor, "t1");

        let bytes = adapter.from(&reading).await.unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"sensor":"t1","value":21.5}"#);

        assert!(matches!(
            adapter.to(&b"not json".to_vec()).await,
            Err(ConnectorError::Translation { .. })
        ));
    }

    type Bytes = Vec<u8>;

    fn channel_adapter(output: &str, input: &str) -> AdapterRef<Bytes, Bytes, Bytes, Bytes> {
        Arc::new(ChannelTranslatingProtocolAdapter::<Bytes, Bytes, Bytes, Bytes>::new(
            output,
            Arc::new(IdentityTranslator),
            input,
            Arc::new(IdentityTranslator),
        ))
    }

    #[test]
    fn test_channel_selector() {
        let adapters = vec![channel_adapter("a.txt", "out-a"), channel_adapter("b.txt", "out-b")];
        let selector = ChannelAdapterSelector;
        let data: Bytes = Vec::new();

        let picked = selector.select_output(&adapters, Some("b.txt"), &data).unwrap();
        assert_eq!(picked.output_channel(), Some("b.txt"));
        assert!(selector.select_output(&adapters, Some("c.txt"), &data).is_none());

        let default = selector.select_input(&adapters, None, &data).unwrap();
        assert_eq!(default.input_channel(), Some("out-a"));
        let named = selector.select_input(&adapters, Some("out-b"), &data).unwrap();
        assert_eq!(named.input_channel(), Some("out-b"));
    }

    #[test]
    fn test_channel_selector_sole_adapter() {
        let adapters = vec![channel_adapter("a.txt", "out-a")];
        let data: Bytes = Vec::new();

        let picked = ChannelAdapterSelector.select_output(&adapters, Some("whatever.txt"), &data);
        assert!(picked.is_some());
        assert!(FirstAdapterSelector.select_output(&adapters, None, &data).is_some());
    }
}
