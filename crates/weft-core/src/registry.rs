// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector registry.
//!
//! The registry is an explicit object populated by explicit calls. It holds
//! two things:
//!
//! - [`ConnectorDescriptor`]s, looked up by the backend's short name
//! - the currently connected connector instances
//!
//! A process-wide instance is available through [`ConnectorRegistry::global`];
//! tests reset it with [`ConnectorRegistry::reset`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;

use crate::model::Capabilities;
use crate::types::ConnectorId;

static GLOBAL: Lazy<Arc<ConnectorRegistry>> = Lazy::new(|| Arc::new(ConnectorRegistry::new()));

/// Describes a connector backend for discovery.
pub trait ConnectorDescriptor: Send + Sync {
    /// Short name of the backend, e.g. `"File"`.
    fn name(&self) -> &str;

    /// Rust type implementing the backend.
    fn type_name(&self) -> &'static str;

    /// Capabilities of the backend.
    fn capabilities(&self) -> Capabilities;
}

/// A connected connector instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorInfo {
    /// Instance ID.
    pub id: ConnectorId,
    /// Backend name.
    pub name: String,
    /// When the instance connected.
    pub connected_at: DateTime<Utc>,
}

/// Registry of connector descriptors and connected instances.
pub struct ConnectorRegistry {
    descriptors: RwLock<HashMap<String, Arc<dyn ConnectorDescriptor>>>,
    instances: DashMap<ConnectorId, ConnectorInfo>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            instances: DashMap::new(),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> Arc<ConnectorRegistry> {
        GLOBAL.clone()
    }

    /// Registers a descriptor, replacing one with the same name.
    pub fn register(&self, descriptor: Arc<dyn ConnectorDescriptor>) {
        let name = descriptor.name().to_string();
        tracing::debug!(name = %name, type_name = descriptor.type_name(), "Registered connector descriptor");
        self.descriptors.write().insert(name, descriptor);
    }

    /// Removes a descriptor.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn ConnectorDescriptor>> {
        self.descriptors.write().remove(name)
    }

    /// Looks up a descriptor by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ConnectorDescriptor>> {
        self.descriptors.read().get(name).cloned()
    }

    /// Returns all descriptors sorted by name.
    pub fn descriptors(&self) -> Vec<Arc<dyn ConnectorDescriptor>> {
        let mut all: Vec<_> = self.descriptors.read().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Records a connected instance.
    pub fn register_instance(&self, info: ConnectorInfo) {
        tracing::debug!(id = %info.id, name = %info.name, "Registered connector instance");
        self.instances.insert(info.id, info);
    }

    /// Removes a connected instance.
    pub fn unregister_instance(&self, id: &ConnectorId) -> Option<ConnectorInfo> {
        self.instances.remove(id).map(|(_, info)| info)
    }

    /// Returns the connected instances, oldest first.
    pub fn instances(&self) -> Vec<ConnectorInfo> {
        let mut all: Vec<ConnectorInfo> = self.instances.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|info| info.connected_at);
        all
    }

    /// Removes all descriptors and instances.
    pub fn reset(&self) {
        self.descriptors.write().clear();
        self.instances.clear();
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.descriptors.read().keys().cloned().collect();
        f.debug_struct("ConnectorRegistry")
            .field("descriptors", &names)
            .field("instances", &self.instances.len())
            .finish()
    }
}
