// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Model access by qualified name.
//!
//! [`ModelAccess`] is the one interface a backend implements to expose its
//! data model: properties, operations, structured values, custom types and
//! change notifications. It never owns the transport; a backend creates it
//! in `connect_impl` on top of the live connection.
//!
//! Optional operations have default implementations failing with
//! [`ConnectorError::Unsupported`]. A backend overrides exactly what its
//! [`Capabilities`] advertise, so capability errors are deterministic.
//! For `monitor*` the capability is [`Capability::Events`], which the
//! connector reads as "use the polling engine".

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Capability, ConnectorError, ConnectorResult};
use crate::qname;
use crate::types::{StructValue, Value};

/// Shared handle to a model access instance.
pub type ModelAccessRef = Arc<dyn ModelAccess>;

// =============================================================================
// Capabilities
// =============================================================================

/// Static capability flags of a backend.
///
/// Callers query these before using optional features instead of provoking
/// capability errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// The backend exposes a navigable model.
    pub has_model: bool,
    /// The backend can push change notifications.
    pub supports_events: bool,
    /// Qualified names are hierarchical (nested scopes are available).
    pub hierarchical_qnames: bool,
    /// Operations can be invoked.
    pub model_calls: bool,
    /// Properties can be read and written.
    pub model_properties: bool,
    /// Structured values and custom types are supported.
    pub model_structs: bool,
    /// The backend paces replayed data by observed time differences.
    pub data_time_difference: bool,
}

impl Capabilities {
    /// Returns `true` if `capability` is available.
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Properties => self.model_properties,
            Capability::Calls => self.model_calls,
            Capability::Structs | Capability::CustomTypes => self.model_structs,
            Capability::Events => self.supports_events,
            Capability::NestedScopes => self.hierarchical_qnames,
        }
    }
}

// =============================================================================
// ModelAccess
// =============================================================================

/// Access to a backend data model by qualified name.
///
/// # Thread Safety
///
/// Implementations are `Send + Sync`, but the connector guarantees that at
/// most one call is outstanding per connector, so implementations need no
/// locking of their own for the transport.
#[async_trait]
pub trait ModelAccess: Send + Sync {
    // =========================================================================
    // Naming
    // =========================================================================

    /// Returns the separator used to compose qualified names.
    fn separator(&self) -> &str {
        qname::DEFAULT_SEPARATOR
    }

    /// Returns the qualified name of the top-level instances, empty if none.
    fn top_instances_qname(&self) -> &str {
        ""
    }

    /// Composes a qualified name, ignoring empty segments.
    fn qname(&self, names: &[&str]) -> String {
        qname::compose(self.separator(), names)
    }

    /// Composes a qualified name below the top-level instances.
    fn iqname(&self, names: &[&str]) -> String {
        let mut segments = Vec::with_capacity(names.len() + 1);
        segments.push(self.top_instances_qname());
        segments.extend_from_slice(names);
        qname::compose(self.separator(), &segments)
    }

    /// Returns the capabilities of this model.
    fn capabilities(&self) -> Capabilities;

    // =========================================================================
    // Properties and operations
    // =========================================================================

    /// Reads a property.
    ///
    /// # Errors
    ///
    /// - `ElementNotFound` if `qname` does not resolve
    /// - `WrongElementKind` if `qname` is not a property
    async fn get(&self, _qname: &str) -> ConnectorResult<Value> {
        Err(ConnectorError::unsupported(Capability::Properties))
    }

    /// Writes a property.
    async fn set(&self, _qname: &str, _value: Value) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::Properties))
    }

    /// Invokes an operation.
    ///
    /// Backend failures are wrapped in `Invocation`, keeping their message.
    async fn call(&self, _qname: &str, _args: Vec<Value>) -> ConnectorResult<Value> {
        Err(ConnectorError::unsupported(Capability::Calls))
    }

    // =========================================================================
    // Structured values
    // =========================================================================

    /// Reads a structured value of the registered type `type_name`.
    async fn get_struct(&self, _qname: &str, _type_name: &str) -> ConnectorResult<StructValue> {
        Err(ConnectorError::unsupported(Capability::Structs))
    }

    /// Writes a structured value.
    async fn set_struct(&self, _qname: &str, _value: StructValue) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::Structs))
    }

    /// Registers a custom type for structured values.
    async fn register_custom_type(&self, _type_name: &str) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::CustomTypes))
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Requests change notifications for `qnames` at the default interval.
    ///
    /// Failing with `Unsupported { capability: Events }` tells the connector
    /// to poll instead.
    async fn monitor(&self, _qnames: &[&str]) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::Events))
    }

    /// Requests change notifications for `qnames` at `interval`.
    async fn monitor_with_interval(
        &self,
        _interval: Duration,
        qnames: &[&str],
    ) -> ConnectorResult<()> {
        self.monitor(qnames).await
    }

    /// Requests notifications about structural model changes.
    async fn monitor_model_changes(&self, _interval: Option<Duration>) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::Events))
    }

    /// Whether notifications carry the changed item (`true`) or nothing.
    fn set_detail_notified_item(&self, _detail: bool) {}

    /// Switches between notifications (`true`) and polling (`false`).
    fn use_notifications(&self, _notifications: bool) {}

    // =========================================================================
    // Nested scopes
    // =========================================================================

    /// Enters the child scope `name`; later names are relative to it.
    async fn step_into(&self, _name: &str) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::NestedScopes))
    }

    /// Leaves the current scope.
    async fn step_out(&self) -> ConnectorResult<()> {
        Err(ConnectorError::unsupported(Capability::NestedScopes))
    }

    // =========================================================================
    // Coercion
    // =========================================================================

    /// Converts an integer into the model representation.
    fn from_int(&self, value: i64) -> Value {
        Value::Int(value)
    }

    /// Converts a model value into an integer.
    fn to_int(&self, value: &Value) -> ConnectorResult<i64> {
        value
            .as_i64()
            .ok_or_else(|| ConnectorError::type_mismatch("int", value.type_name()))
    }

    /// Converts a string into the model representation.
    fn from_text(&self, value: &str) -> Value {
        Value::String(value.to_string())
    }

    /// Converts a model value into a string.
    fn to_text(&self, value: &Value) -> ConnectorResult<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::type_mismatch("string", value.type_name()))
    }

    /// Converts a double into the model representation.
    fn from_double(&self, value: f64) -> Value {
        Value::Double(value)
    }

    /// Converts a model value into a double; integers are widened.
    fn to_double(&self, value: &Value) -> ConnectorResult<f64> {
        value
            .as_f64()
            .ok_or_else(|| ConnectorError::type_mismatch("double", value.type_name()))
    }
}

// =============================================================================
// Serialized access
// =============================================================================

/// Receives notification mode changes requested through model access.
pub(crate) trait ModeSwitch: Send + Sync {
    /// Switches the owning connector to polling (`true`) or events (`false`).
    fn set_polling(self: Arc<Self>, polling: bool);
}

/// Model access handed to adapters.
///
/// Every call goes through the connector's I/O gate, so model calls from
/// adapters never overlap each other or a write.
/// Monitoring results and `use_notifications` are reported to the connector.
pub(crate) struct SerializedModelAccess {
    inner: ModelAccessRef,
    gate: Arc<Mutex<()>>,
    switch: Weak<dyn ModeSwitch>,
}

impl SerializedModelAccess {
    pub(crate) fn new(inner: ModelAccessRef, gate: Arc<Mutex<()>>, switch: Weak<dyn ModeSwitch>) -> Self {
        Self { inner, gate, switch }
    }

    fn switch_mode(&self, polling: bool) {
        if let Some(switch) = self.switch.upgrade() {
            switch.set_polling(polling);
        }
    }

    fn after_monitor(&self, result: &ConnectorResult<()>) {
        match result {
            Ok(()) => self.switch_mode(false),
            Err(e) if e.is_polling_fallback() => self.switch_mode(true),
            Err(_) => {}
        }
    }
}

#[async_trait]
impl ModelAccess for SerializedModelAccess {
    fn separator(&self) -> &str {
        self.inner.separator()
    }

    fn top_instances_qname(&self) -> &str {
        self.inner.top_instances_qname()
    }

    fn qname(&self, names: &[&str]) -> String {
        self.inner.qname(names)
    }

    fn iqname(&self, names: &[&str]) -> String {
        self.inner.iqname(names)
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn get(&self, qname: &str) -> ConnectorResult<Value> {
        let _io = self.gate.lock().await;
        self.inner.get(qname).await
    }

    async fn set(&self, qname: &str, value: Value) -> ConnectorResult<()> {
        let _io = self.gate.lock().await;
        self.inner.set(qname, value).await
    }

    async fn call(&self, qname: &str, args: Vec<Value>) -> ConnectorResult<Value> {
        let _io = self.gate.lock().await;
        self.inner.call(qname, args).await
    }

    async fn get_struct(&self, qname: &str, type_name: &str) -> ConnectorResult<StructValue> {
        let _io = self.gate.lock().await;
        self.inner.get_struct(qname, type_name).await
    }

    async fn set_struct(&self, qname: &str, value: StructValue) -> ConnectorResult<()> {
        let _io = self.gate.lock().await;
        self.inner.set_struct(qname, value).await
    }

    async fn register_custom_type(&self, type_name: &str) -> ConnectorResult<()> {
        let _io = self.gate.lock().await;
        self.inner.register_custom_type(type_name).await
    }

    async fn monitor(&self, qnames: &[&str]) -> ConnectorResult<()> {
        let result = {
            let _io = self.gate.lock().await;
            self.inner.monitor(qnames).await
        };
        self.after_monitor(&result);
        result
    }

    async fn monitor_with_interval(&self, interval: Duration, qnames: &[&str]) -> ConnectorResult<()> {
        let result = {
            let _io = self.gate.lock().await;
            self.inner.monitor_with_interval(interval, qnames).await
        };
        self.after_monitor(&result);
        result
    }

    async fn monitor_model_changes(&self, interval: Option<Duration>) -> ConnectorResult<()> {
        let result = {
            let _io = self.gate.lock().await;
            self.inner.monitor_model_changes(interval).await
        };
        self.after_monitor(&result);
        result
    }

    fn set_detail_notified_item(&self, detail: bool) {
        self.inner.set_detail_notified_item(detail);
    }

    fn use_notifications(&self, notifications: bool) {
        self.inner.use_notifications(notifications);
        self.switch_mode(!notifications);
    }

    async fn step_into(&self, name: &str) -> ConnectorResult<()> {
        let _io = self.gate.lock().await;
        self.inner.step_into(name).await
    }

    async fn step_out(&self) -> ConnectorResult<()> {
        let _io = self.gate.lock().await;
        self.inner.step_out().await
    }

    fn from_int(&self, value: i64) -> Value {
        self.inner.from_int(value)
    }

    fn to_int(&self, value: &Value) -> ConnectorResult<i64> {
        self.inner.to_int(value)
    }

    fn from_text(&self, value: &str) -> Value {
        self.inner.from_text(value)
    }

    fn to_text(&self, value: &Value) -> ConnectorResult<String> {
        self.inner.to_text(value)
    }

    fn from_double(&self, value: f64) -> Value {
        self.inner.from_double(value)
    }

    fn to_double(&self, value: &Value) -> ConnectorResult<f64> {
        self.inner.to_double(value)
    }
}

// =============================================================================
// Tests
// =============================================================================
