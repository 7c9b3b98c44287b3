// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector parameters.
//!
//! [`ConnectorParameter`] is the immutable configuration handed to
//! `connect`. It is created through [`ConnectorParameterBuilder`], which
//! validates the host and port when building.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use weft_core::parameter::ConnectorParameter;
//!
//! let params = ConnectorParameter::builder("localhost", 4840)
//!     .notification_interval(Duration::from_millis(500))
//!     .specific_setting("READ_FILES", "data/*.json")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.port(), 4840);
//! assert_eq!(params.specific_string_setting("READ_FILES"), Some("data/*.json"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default notification (polling) interval.
pub const DEFAULT_NOTIFICATION_INTERVAL: Duration = Duration::from_millis(1000);

/// Default keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(2000);

/// Endpoint marker matching any endpoint in the identity map.
pub const ANY_ENDPOINT: &str = "";

// =============================================================================
// Schema
// =============================================================================

/// Transport schema of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// Plain TCP.
    #[default]
    Tcp,
    /// TLS over TCP.
    Ssl,
    /// HTTP.
    Http,
    /// HTTPS.
    Https,
    /// WebSocket.
    Ws,
    /// Secure WebSocket.
    Wss,
    /// The backend ignores the schema.
    Ignore,
}

impl Schema {
    /// Returns the URL scheme prefix, empty for [`Schema::Ignore`].
    pub fn url_prefix(&self) -> &'static str {
        match self {
            Schema::Tcp => "tcp://",
            Schema::Ssl => "ssl://",
            Schema::Http => "http://",
            Schema::Https => "https://",
            Schema::Ws => "ws://",
            Schema::Wss => "wss://",
            Schema::Ignore => "",
        }
    }
}

// =============================================================================
// Settings and identities
// =============================================================================

/// A backend specific setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Integer setting.
    Int(i64),
    /// String setting.
    Str(String),
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Str(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Str(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v as i64)
    }
}

/// Credentials used to authenticate against an endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityToken {
    /// No authentication.
    #[default]
    Anonymous,
    /// User name and password.
    UserName {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// X.509 certificate.
    X509 {
        /// DER encoded certificate.
        certificate: Vec<u8>,
    },
    /// Token issued by an external authority.
    Issued {
        /// Token bytes.
        token: Vec<u8>,
        /// Token algorithm, if any.
        algorithm: Option<String>,
    },
}

impl IdentityToken {
    /// Creates a user name/password identity.
    pub fn user_name(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Creates an issued token identity.
    pub fn issued(token: impl Into<Vec<u8>>, algorithm: Option<String>) -> Self {
        Self::Issued {
            token: token.into(),
            algorithm,
        }
    }

    /// Returns `true` for anonymous identities.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, IdentityToken::Anonymous)
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityToken::Anonymous => write!(f, "Anonymous"),
            IdentityToken::UserName { user, .. } => f
                .debug_struct("UserName")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            IdentityToken::X509 { certificate } => f
                .debug_struct("X509")
                .field("certificate_len", &certificate.len())
                .finish(),
            IdentityToken::Issued { algorithm, .. } => f
                .debug_struct("Issued")
                .field("algorithm", algorithm)
                .finish_non_exhaustive(),
        }
    }
}

// =============================================================================
// ConnectorParameter
// =============================================================================

/// Immutable connection parameters.
#[derive(Clone, PartialEq)]
pub struct ConnectorParameter {
    host: String,
    port: u16,
    schema: Schema,
    endpoint_path: String,
    application_id: String,
    application_description: String,
    auto_application_id: bool,
    request_timeout: Duration,
    notification_interval: Duration,
    keep_alive: Duration,
    specific_settings: HashMap<String, SettingValue>,
    identities: Option<HashMap<String, IdentityToken>>,
    keystore: Option<PathBuf>,
    keystore_password: Option<String>,
    key_alias: Option<String>,
    hostname_verification: bool,
}

impl fmt::Debug for ConnectorParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorParameter")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("endpoint_path", &self.endpoint_path)
            .field("application_id", &self.application_id)
            .field("application_description", &self.application_description)
            .field("auto_application_id", &self.auto_application_id)
            .field("request_timeout", &self.request_timeout)
            .field("notification_interval", &self.notification_interval)
            .field("keep_alive", &self.keep_alive)
            .field("specific_settings", &self.specific_settings)
            .field("identities", &self.identities)
            .field("keystore", &self.keystore)
            .field("keystore_password", &self.keystore_password.as_ref().map(|_| "***"))
            .field("key_alias", &self.key_alias)
            .field("hostname_verification", &self.hostname_verification)
            .finish()
    }
}

impl ConnectorParameter {
    /// Creates a builder for the given host and port.
    pub fn builder(host: impl Into<String>, port: u32) -> ConnectorParameterBuilder {
        ConnectorParameterBuilder::new(host, port)
    }

    /// Creates a builder pre-filled with these parameters.
    pub fn to_builder(&self) -> ConnectorParameterBuilder {
        ConnectorParameterBuilder {
            host: self.host.clone(),
            port: self.port as u32,
            params: self.clone(),
        }
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the schema.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Returns the endpoint path, empty if not set.
    pub fn endpoint_path(&self) -> &str {
        &self.endpoint_path
    }

    /// Returns the application identifier.
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Returns the application description.
    pub fn application_description(&self) -> &str {
        &self.application_description
    }

    /// Returns whether the backend may derive a unique application id itself.
    pub fn auto_application_id(&self) -> bool {
        self.auto_application_id
    }

    /// Returns the bound for a single request.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the polling interval; zero disables polling.
    pub fn notification_interval(&self) -> Duration {
        self.notification_interval
    }

    /// Returns `true` if the polling engine may run.
    pub fn polling_enabled(&self) -> bool {
        !self.notification_interval.is_zero()
    }

    /// Returns the keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the connection URL built from schema, host, port and endpoint path.
    pub fn url(&self) -> String {
        let mut url = format!("{}{}:{}", self.schema.url_prefix(), self.host, self.port);
        if !self.endpoint_path.is_empty() {
            if !self.endpoint_path.starts_with('/') {
                url.push('/');
            }
            url.push_str(&self.endpoint_path);
        }
        url
    }

    /// Returns a specific setting.
    pub fn specific_setting(&self, key: &str) -> Option<&SettingValue> {
        self.specific_settings.get(key)
    }

    /// Returns the keys of all specific settings.
    pub fn specific_setting_keys(&self) -> impl Iterator<Item = &str> {
        self.specific_settings.keys().map(String::as_str)
    }

    /// Returns a specific setting as string, `None` if absent or not a string.
    pub fn specific_string_setting(&self, key: &str) -> Option<&str> {
        match self.specific_settings.get(key) {
            Some(SettingValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a specific setting as integer.
    ///
    /// String settings holding a number are parsed. Other strings are an error.
    pub fn specific_int_setting(&self, key: &str) -> Result<Option<i64>, ParameterError> {
        match self.specific_settings.get(key) {
            None => Ok(None),
            Some(SettingValue::Int(i)) => Ok(Some(*i)),
            Some(SettingValue::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ParameterError::SettingType {
                    key: key.to_string(),
                    expected: "integer",
                }),
        }
    }

    /// Returns the identity for an endpoint.
    ///
    /// Falls back to the [`ANY_ENDPOINT`] entry. `None` if no identities are
    /// configured at all or neither entry exists.
    pub fn identity(&self, endpoint: &str) -> Option<&IdentityToken> {
        let identities = self.identities.as_ref()?;
        identities
            .get(endpoint)
            .or_else(|| identities.get(ANY_ENDPOINT))
    }

    /// Returns the keystore path, if TLS material is configured.
    pub fn keystore(&self) -> Option<&Path> {
        self.keystore.as_deref()
    }

    /// Returns the keystore password.
    pub fn keystore_password(&self) -> Option<&str> {
        self.keystore_password.as_deref()
    }

    /// Returns the key alias inside the keystore.
    pub fn key_alias(&self) -> Option<&str> {
        self.key_alias.as_deref()
    }

    /// Returns whether TLS host names are verified.
    pub fn hostname_verification(&self) -> bool {
        self.hostname_verification
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ConnectorParameter`].
#[derive(Debug, Clone)]
pub struct ConnectorParameterBuilder {
    host: String,
    port: u32,
    params: ConnectorParameter,
}

impl ConnectorParameterBuilder {
    /// Creates a builder with defaults for everything but host and port.
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        let host = host.into();
        Self {
            host: host.clone(),
            port,
            params: ConnectorParameter {
                host,
                port: 0,
                schema: Schema::default(),
                endpoint_path: String::new(),
                application_id: String::new(),
                application_description: String::new(),
                auto_application_id: true,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                notification_interval: DEFAULT_NOTIFICATION_INTERVAL,
                keep_alive: DEFAULT_KEEP_ALIVE,
                specific_settings: HashMap::new(),
                identities: None,
                keystore: None,
                keystore_password: None,
                key_alias: None,
                hostname_verification: false,
            },
        }
    }

    /// Sets the schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.params.schema = schema;
        self
    }

    /// Sets the endpoint path.
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.params.endpoint_path = path.into();
        self
    }

    /// Sets the application identifier and description.
    pub fn application_information(
        mut self,
        id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.params.application_id = id.into();
        self.params.application_description = description.into();
        self
    }

    /// Sets the application identifier.
    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.params.application_id = id.into();
        self
    }

    /// Sets whether a unique application id may be derived automatically.
    pub fn auto_application_id(mut self, enabled: bool) -> Self {
        self.params.auto_application_id = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.params.request_timeout = timeout;
        self
    }

    /// Sets the polling interval; zero disables polling.
    pub fn notification_interval(mut self, interval: Duration) -> Self {
        self.params.notification_interval = interval;
        self
    }

    /// Sets the keep-alive interval.
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.params.keep_alive = interval;
        self
    }

    /// Sets a backend specific setting.
    pub fn specific_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.params.specific_settings.insert(key.into(), value.into());
        self
    }

    /// Adds the identity for an endpoint. Use [`ANY_ENDPOINT`] as fallback entry.
    pub fn identity(mut self, endpoint: impl Into<String>, token: IdentityToken) -> Self {
        self.params
            .identities
            .get_or_insert_with(HashMap::new)
            .insert(endpoint.into(), token);
        self
    }

    /// Sets the keystore and its password.
    pub fn keystore(mut self, path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        self.params.keystore = Some(path.into());
        self.params.keystore_password = Some(password.into());
        self
    }

    /// Sets the key alias inside the keystore.
    pub fn key_alias(mut self, alias: impl Into<String>) -> Self {
        self.params.key_alias = Some(alias.into());
        self
    }

    /// Enables or disables TLS host name verification.
    pub fn hostname_verification(mut self, enabled: bool) -> Self {
        self.params.hostname_verification = enabled;
        self
    }

    /// Validates and builds the parameters.
    ///
    /// # Errors
    ///
    /// - Empty host
    /// - Port above 65535
    pub fn build(self) -> Result<ConnectorParameter, ParameterError> {
        if self.host.trim().is_empty() {
            return Err(ParameterError::validation("host", "must not be empty"));
        }
        let port = u16::try_from(self.port).map_err(|_| {
            ParameterError::validation("port", format!("{} is out of range 0..=65535", self.port))
        })?;

        let mut params = self.params;
        params.host = self.host;
        params.port = port;
        Ok(params)
    }
}

// =============================================================================
// Tests
// =============================================================================
