// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # weft-core
//!
//! Connector abstraction for heterogeneous industrial data sources.
//!
//! One contract for every backend: connect, receive typed data through
//! callbacks, send typed commands, disconnect. This crate provides:
//!
//! - **Parameter**: `ConnectorParameter` and its builder
//! - **QName / Model**: qualified names and the `ModelAccess` capability interface
//! - **Adapter**: protocol adapters, translators and adapter selectors
//! - **Connector**: the lifecycle state machine and the polling engine
//! - **Channel**: channel connectors and per-channel outputs
//! - **Registry**: connector descriptors and connected instances
//!
//! ## Example
//!
//! ```rust,ignore
//! use weft_core::{Connector, ConnectorParameter, TranslatingProtocolAdapter};
//!
//! let adapter = Arc::new(TranslatingProtocolAdapter::<_, _, Reading, Reading>::json());
//! let connector = Connector::new(backend, vec![adapter])?;
//! connector.add_callback(|reading: Reading| println!("{reading:?}"));
//!
//! let params = ConnectorParameter::builder("localhost", 4840).build()?;
//! connector.connect(&params).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod parameter;
pub mod qname;
pub mod types;

// =============================================================================
// Model & Adapter Modules
// =============================================================================

pub mod adapter;
pub mod callback;
pub mod model;

// =============================================================================
// Connector Modules
// =============================================================================

pub mod channel;
pub mod connector;
pub mod metrics;
pub mod poll;
pub mod registry;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{BoxError, Capability, ConnectorError, ConnectorResult, ParameterError};
pub use parameter::{ConnectorParameter, ConnectorParameterBuilder, IdentityToken, Schema, SettingValue};
pub use types::{ConnectorId, StructValue, Value};

pub use adapter::{
    AdapterRef, AdapterSelector, ChannelAdapterSelector, ChannelTranslatingProtocolAdapter,
    FirstAdapterSelector, IdentityTranslator, InputTranslator, JsonSerializer, ModelAccessSlot,
    OutputTranslator, Payload, ProtocolAdapter, Serializer, SerializerInputTranslator,
    SerializerOutputTranslator, TranslatingProtocolAdapter,
};
pub use callback::{CallbackId, ReceptionCallback};
pub use model::{Capabilities, ModelAccess, ModelAccessRef};

pub use channel::{ChannelConnector, ChannelOutputs};
pub use connector::{
    ConnectContext, Connector, ConnectorBackend, ConnectorState, DataSink, Incoming,
    NotificationMode, TranslationErrorPolicy,
};
pub use metrics::ConnectorMetricsSnapshot;
pub use poll::{AdaptiveInterval, PollSlot};
pub use registry::{ConnectorDescriptor, ConnectorInfo, ConnectorRegistry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
