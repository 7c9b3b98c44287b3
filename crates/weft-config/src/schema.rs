// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! A configuration file lists connectors:
//!
//! ```yaml
//! connectors:
//!   - name: readings
//!     backend: File
//!     notification_interval_ms: 0
//!     settings:
//!       READ_FILES: data/readings.json
//!       WRITE_FILES: out/
//!       DATA_TIMEDIFF: 100
//! ```
//!
//! Durations are given in milliseconds.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_core::parameter::{DEFAULT_KEEP_ALIVE, DEFAULT_NOTIFICATION_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use weft_core::{ConnectorParameter, Schema, SettingValue, TranslationErrorPolicy};

use crate::error::{ConfigError, ConfigResult};

/// Default backend name.
pub const DEFAULT_BACKEND: &str = "File";

/// Default host.
pub const DEFAULT_HOST: &str = "localhost";

// =============================================================================
// WeftConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeftConfig {
    /// Configured connectors.
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
}

impl WeftConfig {
    /// Validates every connector and checks that names are unique.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut names = HashSet::new();
        for (i, connector) in self.connectors.iter().enumerate() {
            connector.validate(i)?;
            if !names.insert(connector.name.as_str()) {
                return Err(ConfigError::DuplicateConnector {
                    name: connector.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the enabled connectors.
    pub fn enabled_connectors(&self) -> impl Iterator<Item = &ConnectorConfig> {
        self.connectors.iter().filter(|c| c.enabled)
    }

    /// Looks up a connector by name.
    pub fn connector(&self, name: &str) -> Option<&ConnectorConfig> {
        self.connectors.iter().find(|c| c.name == name)
    }
}

// =============================================================================
// ConnectorConfig
// =============================================================================

/// Configuration of one connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique connector name.
    pub name: String,

    /// Backend name as registered in the connector registry.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Whether the connector is started.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port.
    #[serde(default)]
    pub port: u32,

    /// Transport schema.
    #[serde(default)]
    pub schema: Schema,

    /// Endpoint path appended to the URL.
    #[serde(default)]
    pub endpoint_path: String,

    /// Application id; generated when absent.
    #[serde(default)]
    pub application_id: Option<String>,

    /// Application description.
    #[serde(default)]
    pub application_description: Option<String>,

    /// Bound of a single backend request in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Poll interval in milliseconds. Zero disables polling.
    #[serde(default = "default_notification_interval")]
    pub notification_interval_ms: u64,

    /// Keep-alive interval in milliseconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_ms: u64,

    /// Explicit notification mode: `true` polls, `false` uses backend
    /// notifications. When absent, the connector polls unless the interval
    /// is zero.
    #[serde(default)]
    pub polling: Option<bool>,

    /// What to do with payloads that fail to translate.
    #[serde(default)]
    pub error_policy: TranslationErrorPolicy,

    /// Backend specific settings. Keys are upper-cased on conversion.
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,

    /// Keystore path.
    #[serde(default)]
    pub keystore: Option<PathBuf>,

    /// Keystore password.
    #[serde(default)]
    pub keystore_password: Option<String>,

    /// Key alias in the keystore.
    #[serde(default)]
    pub key_alias: Option<String>,

    /// Whether host names of certificates are verified.
    #[serde(default)]
    pub hostname_verification: bool,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_notification_interval() -> u64 {
    DEFAULT_NOTIFICATION_INTERVAL.as_millis() as u64
}

fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE.as_millis() as u64
}

impl ConnectorConfig {
    /// Creates a configuration with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: default_backend(),
            enabled: default_enabled(),
            host: default_host(),
            port: 0,
            schema: Schema::default(),
            endpoint_path: String::new(),
            application_id: None,
            application_description: None,
            request_timeout_ms: default_request_timeout(),
            notification_interval_ms: default_notification_interval(),
            keep_alive_ms: default_keep_alive(),
            polling: None,
            error_policy: TranslationErrorPolicy::default(),
            settings: BTreeMap::new(),
            keystore: None,
            keystore_password: None,
            key_alias: None,
            hostname_verification: false,
        }
    }

    /// Adds a backend specific setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the notification interval.
    pub fn notification_interval(&self) -> Duration {
        Duration::from_millis(self.notification_interval_ms)
    }

    /// Returns whether the connector should poll.
    pub fn wants_polling(&self) -> bool {
        self.polling.unwrap_or(self.notification_interval_ms > 0)
    }

    /// Validates the configuration at `index` in the connector list.
    pub fn validate(&self, index: usize) -> ConfigResult<()> {
        let field = |name: &str| format!("connectors[{}].{}", index, name);

        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(field("name"), "must not be empty"));
        }
        if self.backend.trim().is_empty() {
            return Err(ConfigError::validation(field("backend"), "must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(field("host"), "must not be empty"));
        }
        if self.port > u16::MAX as u32 {
            return Err(ConfigError::validation(
                field("port"),
                format!("{} is out of range 0..=65535", self.port),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::validation(field("request_timeout_ms"), "must be positive"));
        }
        if self.keystore.is_none() && self.keystore_password.is_some() {
            return Err(ConfigError::validation(
                field("keystore_password"),
                "given without a keystore",
            ));
        }
        Ok(())
    }

    /// Builds the connector parameters.
    pub fn to_parameter(&self) -> ConfigResult<ConnectorParameter> {
        let mut builder = ConnectorParameter::builder(self.host.clone(), self.port)
            .schema(self.schema)
            .endpoint_path(self.endpoint_path.clone())
            .request_timeout(self.request_timeout())
            .notification_interval(self.notification_interval())
            .keep_alive(Duration::from_millis(self.keep_alive_ms))
            .hostname_verification(self.hostname_verification);

        if let Some(id) = &self.application_id {
            builder = builder
                .application_id(id.clone())
                .auto_application_id(false);
        }
        if let Some(description) = &self.application_description {
            let id = self.application_id.clone().unwrap_or_default();
            builder = builder.application_information(id, description.clone());
        }
        for (key, value) in &self.settings {
            builder = builder.specific_setting(key.to_uppercase(), value.clone());
        }
        if let Some(keystore) = &self.keystore {
            builder = builder.keystore(keystore.clone(), self.keystore_password.clone().unwrap_or_default());
        }
        if let Some(alias) = &self.key_alias {
            builder = builder.key_alias(alias.clone());
        }

        builder.build().map_err(|source| ConfigError::Parameter {
            connector: self.name.clone(),
            source,
        })
    }
}
