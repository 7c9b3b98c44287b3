// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! A scriptable connector backend and model access for exercising the
//! connector without real transports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use weft_core::qname::NameScope;
use weft_core::{
    Capabilities, ConnectContext, ConnectorBackend, ConnectorError, ConnectorParameter,
    ConnectorResult, DataSink, Incoming, ModelAccess, ModelAccessRef, NotificationMode, Value,
};

// =============================================================================
// MockModelAccess
// =============================================================================

/// Model access with configurable capabilities and an in-memory property map.
///
/// With `hierarchical_qnames`, names are resolved relative to the scope
/// entered through `step_into`.
pub struct MockModelAccess {
    capabilities: Capabilities,
    properties: Mutex<HashMap<String, Value>>,
    monitored: Mutex<Vec<String>>,
    scope: NameScope,
}

impl MockModelAccess {
    /// Creates a model with the given capabilities and no properties.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            properties: Mutex::new(HashMap::new()),
            monitored: Mutex::new(Vec::new()),
            scope: NameScope::new(weft_core::qname::DEFAULT_SEPARATOR),
        }
    }

    /// Creates a model exposing properties only.
    pub fn with_properties(properties: &[(&str, Value)]) -> Self {
        let model = Self::new(Capabilities {
            has_model: true,
            model_properties: true,
            hierarchical_qnames: true,
            ..Capabilities::default()
        });
        model.properties.lock().extend(
            properties
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );
        model
    }

    /// Returns the names passed to `monitor`.
    pub fn monitored(&self) -> Vec<String> {
        self.monitored.lock().clone()
    }
}

#[async_trait]
impl ModelAccess for MockModelAccess {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn get(&self, qname: &str) -> ConnectorResult<Value> {
        if !self.capabilities.model_properties {
            return Err(ConnectorError::unsupported(weft_core::Capability::Properties));
        }
        let qname = self.scope.qualify(qname);
        self.properties
            .lock()
            .get(&qname)
            .cloned()
            .ok_or_else(|| ConnectorError::element_not_found(qname))
    }

    async fn set(&self, qname: &str, value: Value) -> ConnectorResult<()> {
        if !self.capabilities.model_properties {
            return Err(ConnectorError::unsupported(weft_core::Capability::Properties));
        }
        let qname = self.scope.qualify(qname);
        let mut properties = self.properties.lock();
        match properties.get_mut(&qname) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ConnectorError::element_not_found(qname)),
        }
    }

    async fn step_into(&self, name: &str) -> ConnectorResult<()> {
        if !self.capabilities.hierarchical_qnames {
            return Err(weft_core::qname::no_nested_scopes());
        }
        self.scope.step_into(name);
        Ok(())
    }

    async fn step_out(&self) -> ConnectorResult<()> {
        if !self.capabilities.hierarchical_qnames {
            return Err(weft_core::qname::no_nested_scopes());
        }
        self.scope.step_out()
    }

    async fn monitor(&self, qnames: &[&str]) -> ConnectorResult<()> {
        if !self.capabilities.supports_events {
            return Err(ConnectorError::unsupported(weft_core::Capability::Events));
        }
        self.monitored
            .lock()
            .extend(qnames.iter().map(|name| name.to_string()));
        Ok(())
    }
}

// =============================================================================
// MockBackend
// =============================================================================

/// Scriptable backend over strings.
///
/// Serves queued items from `read`, records writes and keeps the push path
/// so tests can inject notifications.
pub struct MockBackend {
    capabilities: Capabilities,
    model: Arc<MockModelAccess>,
    queue: Mutex<VecDeque<String>>,
    read_delay: Duration,
    block_reads: AtomicBool,
    fail_connect: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    reads: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    disposes: AtomicUsize,
    written: Mutex<Vec<(String, Option<String>)>>,
    sink: Mutex<Option<DataSink<String>>>,
    mode: Mutex<Option<NotificationMode>>,
    time_differences: Mutex<Vec<Duration>>,
}

impl MockBackend {
    /// Creates a backend without event support and an empty queue.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::default(),
            model: Arc::new(MockModelAccess::new(Capabilities::default())),
            queue: Mutex::new(VecDeque::new()),
            read_delay: Duration::ZERO,
            block_reads: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            disposes: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            mode: Mutex::new(None),
            time_differences: Mutex::new(Vec::new()),
        }
    }

    /// Queues items served by `read`.
    pub fn with_items<I, S>(self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.lock().extend(items.into_iter().map(Into::into));
        self
    }

    /// Delays every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Declares event support.
    pub fn with_events(mut self) -> Self {
        self.capabilities.supports_events = true;
        self
    }

    /// Uses `model` as the model access.
    pub fn with_model(mut self, model: MockModelAccess) -> Self {
        self.capabilities = Capabilities {
            supports_events: self.capabilities.supports_events,
            ..model.capabilities()
        };
        self.model = Arc::new(model);
        self
    }

    /// Makes every connect fail.
    pub fn failing_connect(self) -> Self {
        self.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Makes reads wait forever until released.
    pub fn block_reads(&self, block: bool) {
        self.block_reads.store(block, Ordering::SeqCst);
    }

    /// Queues another item.
    pub fn enqueue(&self, item: impl Into<String>) {
        self.queue.lock().push_back(item.into());
    }

    /// Pushes `item` through the push path. Returns `false` if not connected.
    pub async fn push(&self, item: impl Into<String>) -> bool {
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => sink.push(item.into(), None).await,
            None => false,
        }
    }

    /// Returns whether the connector currently polls, if connected once.
    pub fn polling(&self) -> Option<bool> {
        self.mode.lock().as_ref().map(NotificationMode::is_polling)
    }

    /// Returns the model access.
    pub fn model(&self) -> &Arc<MockModelAccess> {
        &self.model
    }

    /// Returns the number of reads that returned.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns the highest number of overlapping backend calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the number of `connect_impl` calls.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Returns the number of `disconnect_impl` calls.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Returns the number of `dispose` calls.
    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }

    /// Returns the written `(payload, channel)` pairs.
    pub fn written(&self) -> Vec<(String, Option<String>)> {
        self.written.lock().clone()
    }

    /// Returns the time differences passed in by the connector.
    pub fn time_differences(&self) -> Vec<Duration> {
        self.time_differences.lock().clone()
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { backend: self }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a> {
    backend: &'a MockBackend,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectorBackend for MockBackend {
    type Output = String;
    type Input = String;

    fn name(&self) -> &str {
        "Mock"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn connect_impl(
        &self,
        _params: &ConnectorParameter,
        ctx: ConnectContext<String>,
    ) -> ConnectorResult<ModelAccessRef> {
        let _call = self.enter();
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectorError::io("mock connection refused"));
        }
        *self.sink.lock() = Some(ctx.sink());
        *self.mode.lock() = Some(ctx.mode());
        let model: ModelAccessRef = self.model.clone();
        Ok(model)
    }

    async fn read(&self) -> ConnectorResult<Option<Incoming<String>>> {
        let _call = self.enter();
        if self.block_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        let item = self.queue.lock().pop_front();
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(item.map(Incoming::new))
    }

    async fn write_impl(&self, data: String, channel: Option<&str>) -> ConnectorResult<()> {
        let _call = self.enter();
        self.written.lock().push((data, channel.map(str::to_string)));
        Ok(())
    }

    async fn disconnect_impl(&self) -> ConnectorResult<()> {
        let _call = self.enter();
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().take();
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        self.disposes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn notify_data_time_difference(&self, difference: Duration) {
        self.time_differences.lock().push(difference);
    }
}
