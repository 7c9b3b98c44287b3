// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector state machine and polling engine.
//!
//! A [`Connector`] drives one [`ConnectorBackend`] through its lifecycle:
//!
//! ```text
//!   Disconnected --connect--> Connecting --ok--> Connected --disconnect--> Disconnected
//!        |                        |                                          ...
//!        |                        +--error--> Disconnected (rolled back)
//!        +--dispose--> Disposed (terminal)
//! ```
//!
//! While connected, data reaches the reception callbacks from two producers:
//!
//! - the backend's native push path ([`DataSink`]), drained in order by one
//!   dispatcher task per connection
//! - the polling engine, which delivers each polled item itself before
//!   sleeping
//!
//! Both deliver under the same dispatch lock, so callbacks never run
//! concurrently for one connector.
//!
//! # Thread Safety
//!
//! Each connector has two gates:
//!
//! - the read gate: at most one `read` is outstanding, whether it comes
//!   from the poll loop or from [`Connector::read`]
//! - the I/O gate: `write_impl`, `disconnect_impl` and every model access
//!   call made by adapters run one at a time
//!
//! A `read` waiting for data never holds the I/O gate, so writes on an idle
//! source complete without waiting for the poll. Distinct connectors never
//! contend.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::adapter::{AdapterRef, AdapterSelector, FirstAdapterSelector, Payload};
use crate::callback::{CallbackId, CallbackRegistry, ReceptionCallback};
use crate::error::{ConnectorError, ConnectorResult};
use crate::metrics::{ConnectorMetrics, ConnectorMetricsSnapshot};
use crate::model::{Capabilities, ModeSwitch, ModelAccessRef, SerializedModelAccess};
use crate::parameter::{ConnectorParameter, DEFAULT_REQUEST_TIMEOUT};
use crate::poll::{spawn_poller, AdaptiveInterval, PollerHandle, DEFAULT_STOP_BOUND};
use crate::registry::{ConnectorInfo, ConnectorRegistry};
use crate::types::ConnectorId;

/// Capacity of the per-connection dispatch queue.
pub const DISPATCH_CAPACITY: usize = 1024;

// =============================================================================
// Backend contract
// =============================================================================

/// A payload received from a backend, tagged with its channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming<O> {
    /// The raw payload.
    pub payload: O,
    /// Channel the payload arrived on, `None` for the default channel.
    pub channel: Option<String>,
}

impl<O> Incoming<O> {
    /// Creates a payload on the default channel.
    pub fn new(payload: O) -> Self {
        Self {
            payload,
            channel: None,
        }
    }

    /// Creates a payload on `channel`.
    pub fn on_channel(payload: O, channel: impl Into<String>) -> Self {
        Self {
            payload,
            channel: Some(channel.into()),
        }
    }
}

/// Push path from a backend into the connector's dispatch queue.
#[derive(Debug)]
pub struct DataSink<O> {
    tx: mpsc::Sender<Incoming<O>>,
}

impl<O> Clone for DataSink<O> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<O: Payload> DataSink<O> {
    /// Queues a payload for delivery.
    ///
    /// Waits while the queue is full. Returns `false` once the connection
    /// is gone.
    pub async fn push(&self, payload: O, channel: Option<String>) -> bool {
        self.tx.send(Incoming { payload, channel }).await.is_ok()
    }

    /// Returns `true` once the connection is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Shared flag telling a backend whether the connector is polling.
///
/// The mode may change while connected, e.g. after
/// [`Connector::enable_notifications`].
#[derive(Debug, Clone, Default)]
pub struct NotificationMode {
    polling: Arc<AtomicBool>,
}

impl NotificationMode {
    /// Returns `true` while the polling engine is in charge.
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    fn set(&self, polling: bool) -> bool {
        self.polling.swap(polling, Ordering::SeqCst) != polling
    }
}

/// Everything a backend receives on `connect_impl`.
#[derive(Debug)]
pub struct ConnectContext<O> {
    sink: DataSink<O>,
    mode: NotificationMode,
    pacing: Arc<AdaptiveInterval>,
}

impl<O: Payload> ConnectContext<O> {
    /// Returns the push path.
    pub fn sink(&self) -> DataSink<O> {
        self.sink.clone()
    }

    /// Returns the notification mode flag.
    pub fn mode(&self) -> NotificationMode {
        self.mode.clone()
    }

    /// Returns the poll pacing of the connector.
    pub fn pacing(&self) -> Arc<AdaptiveInterval> {
        self.pacing.clone()
    }
}

/// The transport specific half of a connector.
///
/// Implementations own the transport and create the [`ModelAccess`] on top
/// of it. The connector serializes all calls, so implementations only need
/// interior mutability, not their own I/O locking.
///
/// [`ModelAccess`]: crate::model::ModelAccess
#[async_trait]
pub trait ConnectorBackend: Send + Sync + 'static {
    /// Payload received from the transport.
    type Output: Payload;
    /// Payload sent to the transport.
    type Input: Payload;

    /// Short name, e.g. `"File"`.
    fn name(&self) -> &str;

    /// Static capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Sets up the transport and creates the model access.
    ///
    /// Backends with a native push path keep `ctx.sink()` and push through it.
    async fn connect_impl(
        &self,
        params: &ConnectorParameter,
        ctx: ConnectContext<Self::Output>,
    ) -> ConnectorResult<ModelAccessRef>;

    /// Reads the next payload for the polling engine.
    ///
    /// May wait; the connector bounds the call by the request timeout and
    /// treats expiry as "no data". Reads never overlap each other but may
    /// overlap one `write_impl`.
    async fn read(&self) -> ConnectorResult<Option<Incoming<Self::Output>>> {
        Ok(None)
    }

    /// Sends a payload, on `channel` if given.
    async fn write_impl(&self, data: Self::Input, channel: Option<&str>) -> ConnectorResult<()>;

    /// Tears down the transport. Must stop every task the backend owns.
    async fn disconnect_impl(&self) -> ConnectorResult<()>;

    /// Releases native resources. Called once, after disconnecting.
    async fn dispose(&self) -> ConnectorResult<()> {
        Ok(())
    }

    /// Observed gap between consecutive data items, for replaying sources.
    fn notify_data_time_difference(&self, _difference: Duration) {}

    /// Encryption supported by the transport, if any.
    fn supported_encryption(&self) -> Option<&str> {
        None
    }

    /// Encryption currently in use, if any.
    fn enabled_encryption(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// State and policies
// =============================================================================

/// Lifecycle state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorState {
    /// Not connected. Initial state.
    Disconnected,
    /// `connect` is in progress.
    Connecting,
    /// Connected; data flows.
    Connected,
    /// Terminal.
    Disposed,
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectorState::Disconnected => "disconnected",
            ConnectorState::Connecting => "connecting",
            ConnectorState::Connected => "connected",
            ConnectorState::Disposed => "disposed",
        };
        write!(f, "{}", s)
    }
}

/// What happens when an adapter fails to translate a received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationErrorPolicy {
    /// The cycle yields nothing; the failure is logged as a warning and a
    /// synchronous `read` returns the error.
    #[default]
    FailCycle,
    /// The item is skipped quietly; a synchronous `read` returns `None`.
    SkipItem,
    /// The connector stops delivering and reports itself faulted until the
    /// next `disconnect`.
    FailConnector,
}

type TimeDifferenceProvider<CO> = Arc<dyn Fn(&CO) -> Option<Duration> + Send + Sync>;

// =============================================================================
// Connector
// =============================================================================

struct ConnectorCore<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    id: ConnectorId,
    backend: Arc<B>,
    adapters: Vec<AdapterRef<B::Output, B::Input, CO, CI>>,
    selector: RwLock<Arc<dyn AdapterSelector<B::Output, B::Input, CO, CI>>>,
    callbacks: CallbackRegistry<CO>,
    state: RwLock<ConnectorState>,
    lifecycle: tokio::sync::Mutex<()>,
    io_gate: Arc<tokio::sync::Mutex<()>>,
    read_gate: tokio::sync::Mutex<()>,
    dispatch_lock: tokio::sync::Mutex<()>,
    active: AtomicBool,
    mode: NotificationMode,
    preference: RwLock<Option<bool>>,
    pacing: Arc<AdaptiveInterval>,
    poller: Mutex<Option<PollerHandle>>,
    dispatch_tx: Mutex<Option<mpsc::Sender<Incoming<B::Output>>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    params: RwLock<Option<ConnectorParameter>>,
    metrics: ConnectorMetrics,
    policy: RwLock<TranslationErrorPolicy>,
    fault: RwLock<Option<String>>,
    time_difference: RwLock<Option<TimeDifferenceProvider<CO>>>,
    registry: RwLock<Option<Arc<ConnectorRegistry>>>,
}

/// A connector: lifecycle, adapters, callbacks and the polling engine around
/// one backend.
///
/// Cloning yields another handle to the same connector.
///
/// # Example
///
/// ```ignore
/// let connector = Connector::new(backend, vec![adapter])?;
/// connector.add_callback(|record: Reading| println!("{record:?}"));
/// connector.connect(&params).await?;
/// connector.write(command).await?;
/// connector.disconnect().await?;
/// ```
pub struct Connector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    core: Arc<ConnectorCore<B, CO, CI>>,
}

impl<B, CO, CI> Clone for Connector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<B, CO, CI> Connector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    /// Creates a disconnected connector.
    ///
    /// # Errors
    ///
    /// Fails if `adapters` is empty.
    pub fn new(backend: B, adapters: Vec<AdapterRef<B::Output, B::Input, CO, CI>>) -> ConnectorResult<Self> {
        Self::from_shared(Arc::new(backend), adapters)
    }

    /// Creates a disconnected connector around a shared backend.
    pub fn from_shared(
        backend: Arc<B>,
        adapters: Vec<AdapterRef<B::Output, B::Input, CO, CI>>,
    ) -> ConnectorResult<Self> {
        if adapters.is_empty() {
            return Err(ConnectorError::no_adapter(None));
        }

        let core = ConnectorCore {
            id: ConnectorId::new(),
            backend,
            adapters,
            selector: RwLock::new(Arc::new(FirstAdapterSelector)),
            callbacks: CallbackRegistry::new(),
            state: RwLock::new(ConnectorState::Disconnected),
            lifecycle: tokio::sync::Mutex::new(()),
            io_gate: Arc::new(tokio::sync::Mutex::new(())),
            read_gate: tokio::sync::Mutex::new(()),
            dispatch_lock: tokio::sync::Mutex::new(()),
            active: AtomicBool::new(false),
            mode: NotificationMode::default(),
            preference: RwLock::new(None),
            pacing: Arc::new(AdaptiveInterval::new(crate::parameter::DEFAULT_NOTIFICATION_INTERVAL)),
            poller: Mutex::new(None),
            dispatch_tx: Mutex::new(None),
            dispatcher: Mutex::new(None),
            params: RwLock::new(None),
            metrics: ConnectorMetrics::new(),
            policy: RwLock::new(TranslationErrorPolicy::default()),
            fault: RwLock::new(None),
            time_difference: RwLock::new(None),
            registry: RwLock::new(None),
        };

        Ok(Self { core: Arc::new(core) })
    }

    /// Replaces the adapter selector.
    pub fn with_selector(self, selector: Arc<dyn AdapterSelector<B::Output, B::Input, CO, CI>>) -> Self {
        *self.core.selector.write() = selector;
        self
    }

    /// Registers connected instances in `registry`.
    pub fn with_registry(self, registry: Arc<ConnectorRegistry>) -> Self {
        *self.core.registry.write() = Some(registry);
        self
    }

    /// Sets the translation error policy.
    pub fn with_error_policy(self, policy: TranslationErrorPolicy) -> Self {
        self.set_error_policy(policy);
        self
    }

    /// Sets the translation error policy.
    pub fn set_error_policy(&self, policy: TranslationErrorPolicy) {
        *self.core.policy.write() = policy;
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects the backend and binds model access into all adapters.
    ///
    /// A no-op if already connected. On failure the connector is rolled back
    /// to [`ConnectorState::Disconnected`] with adapters unbound.
    ///
    /// # Errors
    ///
    /// - `Disposed` after [`dispose`](Self::dispose)
    /// - `ConnectionFailed` wrapping the backend or adapter error
    pub async fn connect(&self, params: &ConnectorParameter) -> ConnectorResult<()> {
        let core = &self.core;
        let _lifecycle = core.lifecycle.lock().await;

        match core.state() {
            ConnectorState::Connected => {
                debug!(connector = %core.name(), "Already connected");
                return Ok(());
            }
            ConnectorState::Disposed => return Err(ConnectorError::Disposed),
            ConnectorState::Disconnected | ConnectorState::Connecting => {}
        }

        core.set_state(ConnectorState::Connecting);
        *core.params.write() = Some(params.clone());
        *core.fault.write() = None;
        core.pacing.set_fixed(params.notification_interval());

        let preference = *core.preference.read();
        let polling = match preference {
            Some(notifications) => !notifications || !core.backend.capabilities().supports_events,
            None => !core.backend.capabilities().supports_events,
        };
        core.mode.set(polling);

        let (tx, rx) = mpsc::channel(DISPATCH_CAPACITY);
        let ctx = ConnectContext {
            sink: DataSink { tx: tx.clone() },
            mode: core.mode.clone(),
            pacing: core.pacing.clone(),
        };

        if let Err(e) = core.establish(params, ctx).await {
            core.roll_back().await;
            warn!(connector = %core.name(), error = %e, "Connect failed, rolled back");
            return Err(ConnectorError::connection_failed_with(
                format!("Connecting {} to {} failed", core.name(), params.url()),
                e,
            ));
        }

        *core.dispatch_tx.lock() = Some(tx);
        core.spawn_dispatcher(rx);
        core.active.store(true, Ordering::SeqCst);
        core.set_state(ConnectorState::Connected);

        if core.mode.is_polling() {
            core.start_poller();
        }
        core.register_instance();

        info!(
            connector = %core.name(),
            id = %core.id,
            url = %params.url(),
            polling = core.mode.is_polling(),
            "Connector connected"
        );
        Ok(())
    }

    /// Disconnects. A no-op if not connected.
    ///
    /// Stops the polling engine (bounded join), waits for an in-flight
    /// delivery, then tears down the backend and unbinds model access. No
    /// callback fires after this returns.
    pub async fn disconnect(&self) -> ConnectorResult<()> {
        let core = &self.core;
        let _lifecycle = core.lifecycle.lock().await;

        match core.state() {
            ConnectorState::Connected => core.shut_down().await,
            ConnectorState::Disposed => Err(ConnectorError::Disposed),
            ConnectorState::Disconnected | ConnectorState::Connecting => {
                debug!(connector = %core.name(), "Already disconnected");
                Ok(())
            }
        }
    }

    /// Disconnects if needed and releases the backend's resources.
    ///
    /// Terminal: every later operation fails with `Disposed`.
    pub async fn dispose(&self) -> ConnectorResult<()> {
        let core = &self.core;
        let _lifecycle = core.lifecycle.lock().await;

        match core.state() {
            ConnectorState::Disposed => return Err(ConnectorError::Disposed),
            ConnectorState::Connected => {
                if let Err(e) = core.shut_down().await {
                    warn!(connector = %core.name(), error = %e, "Disconnect during dispose failed");
                }
            }
            ConnectorState::Disconnected | ConnectorState::Connecting => {}
        }

        let result = core.backend.dispose().await;
        core.set_state(ConnectorState::Disposed);
        info!(connector = %core.name(), "Connector disposed");
        result
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Translates `data` and sends it on the adapter's input channel.
    ///
    /// Bounded by the request timeout.
    pub async fn write(&self, data: CI) -> ConnectorResult<()> {
        self.core.write(None, data).await
    }

    /// Translates `data` and sends it on `channel`.
    pub async fn write_to_channel(&self, channel: &str, data: CI) -> ConnectorResult<()> {
        self.core.write(Some(channel), data).await
    }

    /// Pulls one payload from the backend and translates it.
    ///
    /// Returns `None` if nothing arrived within the request timeout. The
    /// record is returned to the caller, not dispatched to callbacks.
    pub async fn read(&self) -> ConnectorResult<Option<CO>> {
        self.core.read().await
    }

    // =========================================================================
    // Callbacks and notifications
    // =========================================================================

    /// Adds a callback receiving every record.
    pub fn add_callback<C>(&self, callback: C) -> CallbackId
    where
        C: ReceptionCallback<CO> + 'static,
    {
        self.core.callbacks.add(Arc::new(callback))
    }

    /// Adds a callback receiving records from `channel` only.
    pub fn add_channel_callback<C>(&self, channel: impl Into<String>, callback: C) -> CallbackId
    where
        C: ReceptionCallback<CO> + 'static,
    {
        self.core.callbacks.add_for_channel(channel, Arc::new(callback))
    }

    /// Removes a callback.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.core.callbacks.remove(id)
    }

    /// Switches between backend notifications (`true`) and polling (`false`).
    ///
    /// Takes effect immediately while connected and is kept for later
    /// connects. Backends without event support always poll.
    pub fn enable_notifications(&self, enable: bool) {
        *self.core.preference.write() = Some(enable);
        let polling = !enable || !self.core.backend.capabilities().supports_events;
        if enable && polling {
            warn!(connector = %self.core.name(), "Backend cannot notify, keeping polling");
        }
        self.core.apply_mode(polling);
    }

    /// Installs a function deriving the gap to the next data item from a
    /// delivered record. A returned gap overrides the next poll delay and is
    /// passed to the backend.
    pub fn set_data_time_difference_provider<F>(&self, provider: F)
    where
        F: Fn(&CO) -> Option<Duration> + Send + Sync + 'static,
    {
        *self.core.time_difference.write() = Some(Arc::new(provider));
    }

    /// Overrides the next poll delay and informs the backend.
    pub fn notify_data_time_difference(&self, difference: Duration) {
        self.core.observe_time_difference(difference);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the instance ID.
    pub fn id(&self) -> ConnectorId {
        self.core.id
    }

    /// Returns the backend name.
    pub fn name(&self) -> &str {
        self.core.backend.name()
    }

    /// Returns the backend capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.core.backend.capabilities()
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.core.backend
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ConnectorState {
        self.core.state()
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.core.state() == ConnectorState::Connected
    }

    /// Returns `true` if the polling engine is in charge.
    pub fn is_polling(&self) -> bool {
        self.core.mode.is_polling()
    }

    /// Returns `true` if a poll loop task is installed.
    pub fn has_poller(&self) -> bool {
        self.core.poller.lock().is_some()
    }

    /// Returns `true` after a translation failure under
    /// [`TranslationErrorPolicy::FailConnector`].
    pub fn is_faulted(&self) -> bool {
        self.core.fault.read().is_some()
    }

    /// Returns the recorded fault.
    pub fn last_fault(&self) -> Option<String> {
        self.core.fault.read().clone()
    }

    /// Returns the translation error policy.
    pub fn error_policy(&self) -> TranslationErrorPolicy {
        *self.core.policy.read()
    }

    /// Returns the parameters of the current or last connection.
    pub fn parameters(&self) -> Option<ConnectorParameter> {
        self.core.params.read().clone()
    }

    /// Returns a metrics snapshot.
    pub fn metrics(&self) -> ConnectorMetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Returns the number of adapters.
    pub fn adapter_count(&self) -> usize {
        self.core.adapters.len()
    }

    /// Encryption supported by the backend.
    pub fn supported_encryption(&self) -> Option<&str> {
        self.core.backend.supported_encryption()
    }

    /// Encryption enabled in the backend.
    pub fn enabled_encryption(&self) -> Option<&str> {
        self.core.backend.enabled_encryption()
    }
}

impl<B, CO, CI> fmt::Debug for Connector<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("id", &self.core.id)
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .field("polling", &self.core.mode.is_polling())
            .finish()
    }
}

// =============================================================================
// Core
// =============================================================================

impl<B, CO, CI> ConnectorCore<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectorState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        trace!(connector = %self.name(), from = %previous, to = %state, "State changed");
    }

    fn request_timeout(&self) -> Duration {
        self.params
            .read()
            .as_ref()
            .map(ConnectorParameter::request_timeout)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    fn selector(&self) -> Arc<dyn AdapterSelector<B::Output, B::Input, CO, CI>> {
        self.selector.read().clone()
    }

    fn ensure_connected(&self) -> ConnectorResult<()> {
        match self.state() {
            ConnectorState::Connected => {}
            ConnectorState::Disposed => return Err(ConnectorError::Disposed),
            ConnectorState::Disconnected | ConnectorState::Connecting => {
                return Err(ConnectorError::NotConnected)
            }
        }
        match self.fault.read().as_ref() {
            Some(message) => Err(ConnectorError::Faulted {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Connect / disconnect
    // =========================================================================

    async fn establish(
        self: &Arc<Self>,
        params: &ConnectorParameter,
        ctx: ConnectContext<B::Output>,
    ) -> ConnectorResult<()> {
        let access = self.backend.connect_impl(params, ctx).await?;

        let switch: Arc<dyn ModeSwitch> = self.clone();
        let access: ModelAccessRef = Arc::new(SerializedModelAccess::new(
            access,
            self.io_gate.clone(),
            Arc::downgrade(&switch),
        ));

        for adapter in &self.adapters {
            adapter.set_model_access(Some(access.clone()));
        }

        for adapter in &self.adapters {
            match adapter.initialize_model_access().await {
                Ok(()) => {}
                Err(e) if e.is_polling_fallback() => {
                    debug!(connector = %self.name(), "Adapter cannot monitor, polling");
                    self.mode.set(true);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn roll_back(&self) {
        for adapter in &self.adapters {
            adapter.set_model_access(None);
        }
        let result = {
            let _io = self.io_gate.lock().await;
            self.backend.disconnect_impl().await
        };
        if let Err(e) = result {
            debug!(connector = %self.name(), error = %e, "Cleanup after failed connect failed");
        }
        self.set_state(ConnectorState::Disconnected);
    }

    async fn shut_down(&self) -> ConnectorResult<()> {
        self.active.store(false, Ordering::SeqCst);
        self.set_state(ConnectorState::Disconnected);
        self.unregister_instance();

        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            poller.stop(DEFAULT_STOP_BOUND).await;
        }

        self.dispatch_tx.lock().take();
        drop(self.dispatch_lock.lock().await);
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.abort();
        }

        let result = {
            let _io = self.io_gate.lock().await;
            self.backend.disconnect_impl().await
        };

        for adapter in &self.adapters {
            adapter.set_model_access(None);
        }
        *self.fault.write() = None;

        info!(connector = %self.name(), id = %self.id, "Connector disconnected");

        result.map_err(|e| match e {
            e @ ConnectorError::Io { .. } => e,
            other => ConnectorError::io_with(format!("Disconnecting {} failed", self.name()), other),
        })
    }

    fn register_instance(&self) {
        let registry = self.registry.read().clone();
        if let Some(registry) = registry {
            registry.register_instance(ConnectorInfo {
                id: self.id,
                name: self.name().to_string(),
                connected_at: Utc::now(),
            });
        }
    }

    fn unregister_instance(&self) {
        let registry = self.registry.read().clone();
        if let Some(registry) = registry {
            registry.unregister_instance(&self.id);
        }
    }

    // =========================================================================
    // Polling and dispatch
    // =========================================================================

    fn apply_mode(self: &Arc<Self>, polling: bool) {
        let changed = self.mode.set(polling);
        if self.state() != ConnectorState::Connected {
            return;
        }

        if polling {
            self.start_poller();
        } else {
            let poller = self.poller.lock().take();
            if let Some(poller) = poller {
                poller.signal_stop();
            }
        }

        if changed {
            debug!(connector = %self.name(), polling, "Notification mode changed");
        }
    }

    fn start_poller(self: &Arc<Self>) {
        let mut slot = self.poller.lock();
        if slot.is_some() {
            return;
        }
        if self.pacing.fixed().is_zero() {
            debug!(connector = %self.name(), "Notification interval is zero, no poll loop");
            return;
        }

        let core = Arc::downgrade(self);
        *slot = Some(spawn_poller(self.name(), self.pacing.clone(), move || {
            let core = core.clone();
            async move {
                if let Some(core) = core.upgrade() {
                    core.poll_once().await;
                }
            }
        }));
    }

    async fn poll_once(&self) {
        self.metrics.record_poll_cycle();
        let timeout = self.request_timeout();

        let result = tokio::time::timeout(timeout, async {
            let _read = self.read_gate.lock().await;
            self.backend.read().await
        })
        .await;

        match result {
            Err(_) => self.metrics.record_poll_timeout(),
            Ok(Ok(None)) => {}
            // Delivered before the loop sleeps so that a time difference
            // taken from this record sets the very next delay.
            Ok(Ok(Some(incoming))) => self.deliver(incoming).await,
            Ok(Err(e)) => {
                self.metrics.record_poll_error();
                warn!(connector = %self.name(), error = %e, "While polling. Data discarded.");
            }
        }
    }

    fn spawn_dispatcher(self: &Arc<Self>, mut rx: mpsc::Receiver<Incoming<B::Output>>) {
        let core = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(incoming) = rx.recv().await {
                let Some(core) = core.upgrade() else {
                    break;
                };
                core.deliver(incoming).await;
            }
        });
        *self.dispatcher.lock() = Some(handle);
    }

    async fn deliver(&self, incoming: Incoming<B::Output>) {
        let _dispatch = self.dispatch_lock.lock().await;
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        self.metrics.record_received();

        let channel = incoming.channel.as_deref();
        let selector = self.selector();
        let Some(adapter) = selector.select_output(&self.adapters, channel, &incoming.payload) else {
            self.metrics.record_dropped();
            warn!(
                connector = %self.name(),
                channel = channel.unwrap_or("<default>"),
                "No adapter for incoming data, dropped"
            );
            return;
        };

        match adapter.to(&incoming.payload).await {
            Ok(record) => {
                self.observe_record(&record);
                if !self.active.load(Ordering::SeqCst) {
                    return;
                }
                let count = self.callbacks.dispatch(channel, &record);
                self.metrics.record_dispatched();
                trace!(connector = %self.name(), callbacks = count, "Record dispatched");
            }
            Err(e) => {
                self.translation_failed(e);
            }
        }
    }

    async fn read(&self) -> ConnectorResult<Option<CO>> {
        self.ensure_connected()?;
        let timeout = self.request_timeout();

        let result = tokio::time::timeout(timeout, async {
            let _read = self.read_gate.lock().await;
            self.backend.read().await
        })
        .await;

        let incoming = match result {
            Err(_) => {
                self.metrics.record_poll_timeout();
                return Ok(None);
            }
            Ok(result) => result?,
        };
        let Some(incoming) = incoming else {
            return Ok(None);
        };
        self.metrics.record_received();

        let channel = incoming.channel.as_deref();
        let selector = self.selector();
        let Some(adapter) = selector.select_output(&self.adapters, channel, &incoming.payload) else {
            self.metrics.record_dropped();
            warn!(
                connector = %self.name(),
                channel = channel.unwrap_or("<default>"),
                "No adapter for read data, dropped"
            );
            return Ok(None);
        };

        match adapter.to(&incoming.payload).await {
            Ok(record) => {
                self.observe_record(&record);
                Ok(Some(record))
            }
            Err(e) => match self.translation_failed(e) {
                Some(e) => Err(e),
                None => Ok(None),
            },
        }
    }

    /// Applies the error policy. Returns the error to surface from a
    /// synchronous read, if any.
    fn translation_failed(&self, error: ConnectorError) -> Option<ConnectorError> {
        self.metrics.record_translation_failure();
        let policy = *self.policy.read();

        match policy {
            TranslationErrorPolicy::FailCycle => {
                warn!(connector = %self.name(), error = %error, "Translation failed, cycle discarded");
                Some(error)
            }
            TranslationErrorPolicy::SkipItem => {
                debug!(connector = %self.name(), error = %error, "Translation failed, item skipped");
                None
            }
            TranslationErrorPolicy::FailConnector => {
                error!(connector = %self.name(), error = %error, "Translation failed, connector faulted");
                let message = error.to_string();
                *self.fault.write() = Some(message.clone());
                self.active.store(false, Ordering::SeqCst);
                let poller = self.poller.lock().take();
                if let Some(poller) = poller {
                    poller.signal_stop();
                }
                Some(ConnectorError::Faulted { message })
            }
        }
    }

    fn observe_record(&self, record: &CO) {
        let provider = self.time_difference.read().clone();
        if let Some(difference) = provider.and_then(|provider| provider(record)) {
            self.observe_time_difference(difference);
        }
    }

    fn observe_time_difference(&self, difference: Duration) {
        self.pacing.override_next(difference);
        self.backend.notify_data_time_difference(difference);
    }

    async fn write(&self, channel: Option<&str>, data: CI) -> ConnectorResult<()> {
        self.ensure_connected()?;

        let selector = self.selector();
        let adapter = selector
            .select_input(&self.adapters, channel, &data)
            .ok_or_else(|| ConnectorError::no_adapter(channel))?;

        let payload = match adapter.from(&data).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.metrics.record_write(false);
                return Err(e);
            }
        };

        let target = channel.or_else(|| adapter.input_channel());
        let timeout = self.request_timeout();
        let result = tokio::time::timeout(timeout, async {
            let _io = self.io_gate.lock().await;
            self.backend.write_impl(payload, target).await
        })
        .await
        .unwrap_or_else(|_| Err(ConnectorError::timeout(timeout)));

        self.metrics.record_write(result.is_ok());
        if let Err(e) = &result {
            debug!(connector = %self.name(), channel = target.unwrap_or("<default>"), error = %e, "Write failed");
        }
        result
    }
}

impl<B, CO, CI> ModeSwitch for ConnectorCore<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    fn set_polling(self: Arc<Self>, polling: bool) {
        // An explicit request for polling wins over monitoring success.
        if !polling && *self.preference.read() == Some(false) {
            return;
        }
        self.apply_mode(polling);
    }
}

impl<B, CO, CI> Drop for ConnectorCore<B, CO, CI>
where
    B: ConnectorBackend,
    CO: Payload + Clone,
    CI: Payload,
{
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.signal_stop();
        }
        if let Some(dispatcher) = self.dispatcher.get_mut().take() {
            dispatcher.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
