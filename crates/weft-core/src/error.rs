// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error hierarchy for connectors.
//!
//! Errors are grouped the way callers need to branch on them:
//!
//! - **Connection errors**: the backend is unreachable, authentication failed
//!   or the parameters are unusable. Surfaced from `connect`.
//! - **Addressing errors**: a qualified name does not resolve or resolves to an
//!   element of the wrong kind. Surfaced from [`ModelAccess`](crate::model::ModelAccess).
//! - **Capability errors**: the backend does not implement an optional feature.
//!   Deterministic and queryable up front through [`Capabilities`](crate::model::Capabilities).
//! - **Transient I/O errors**: logged by the polling engine, never fatal to it.
//! - **Terminal-state errors**: any operation after `dispose`.
//!
//! # Examples
//!
//! ```
//! use weft_core::error::{Capability, ConnectorError};
//!
//! let error = ConnectorError::unsupported(Capability::Events);
//! assert!(error.is_polling_fallback());
//! assert!(!error.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used as the source of wrapped backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Capability
// =============================================================================

/// An optional backend feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Reading and writing properties by qualified name.
    Properties,
    /// Invoking operations.
    Calls,
    /// Structured values.
    Structs,
    /// Registration of custom types for structured values.
    CustomTypes,
    /// Change notifications (monitoring). Absence means "use polling".
    Events,
    /// Nested name scopes (step into / step out).
    NestedScopes,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Properties => "properties",
            Capability::Calls => "calls",
            Capability::Structs => "structs",
            Capability::CustomTypes => "custom types",
            Capability::Events => "events",
            Capability::NestedScopes => "nested scopes",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// ParameterError
// =============================================================================

/// Errors raised while building a [`ConnectorParameter`](crate::parameter::ConnectorParameter).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterError {
    /// A field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A specific setting has a different type than requested.
    #[error("Specific setting '{key}' is not a {expected}")]
    SettingType {
        /// Setting key.
        key: String,
        /// Requested type.
        expected: &'static str,
    },
}

impl ParameterError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ConnectorError
// =============================================================================

/// Errors raised by connectors, adapters and model access.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Establishing the connection failed. The connector stays disconnected.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Option<BoxError>,
    },

    /// The connector is not connected.
    #[error("Connector is not connected")]
    NotConnected,

    /// The connector has been disposed.
    #[error("Connector has been disposed")]
    Disposed,

    /// Transport level I/O failure.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// A qualified name does not resolve.
    #[error("Element {qname} does not exist")]
    ElementNotFound {
        /// The unresolved name.
        qname: String,
    },

    /// A qualified name resolves to an element of another kind.
    #[error("Element {qname} is a {actual}, not a {expected}")]
    WrongElementKind {
        /// The addressed name.
        qname: String,
        /// Kind required by the operation.
        expected: String,
        /// Kind actually found.
        actual: String,
    },

    /// A backend operation failed while being invoked.
    #[error("Invoking {qname} failed: {message}")]
    Invocation {
        /// The invoked operation.
        qname: String,
        /// Message of the backend failure.
        message: String,
        /// The backend failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend does not support a capability.
    #[error("{capability} are not supported by this connector")]
    Unsupported {
        /// The missing capability.
        capability: Capability,
    },

    /// A value has a different runtime type than requested.
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// Translating between payload and typed record failed.
    #[error("Translation failed: {message}")]
    Translation {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation did not finish within the request timeout.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The elapsed bound.
        duration: Duration,
    },

    /// No adapter is responsible for a channel.
    #[error("No adapter for channel {}", channel.as_deref().unwrap_or("<default>"))]
    NoAdapter {
        /// The unresolved channel, `None` for the default channel.
        channel: Option<String>,
    },

    /// The connector stopped acquisition after a translation failure.
    #[error("Connector is faulted: {message}")]
    Faulted {
        /// The recorded failure.
        message: String,
    },

    /// Invalid connector parameters.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),
}

impl ConnectorError {
    /// Creates a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection failed error with a source.
    pub fn connection_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an I/O error with a source.
    pub fn io_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an element not found error.
    pub fn element_not_found(qname: impl Into<String>) -> Self {
        Self::ElementNotFound { qname: qname.into() }
    }

    /// Creates a wrong element kind error.
    pub fn wrong_kind(
        qname: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::WrongElementKind {
            qname: qname.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Wraps a backend invocation failure, keeping its message.
    pub fn invocation<E>(qname: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Invocation {
            qname: qname.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a capability error.
    pub fn unsupported(capability: Capability) -> Self {
        Self::Unsupported { capability }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a translation error.
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a translation error with a source.
    pub fn translation_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Translation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a no adapter error.
    pub fn no_adapter(channel: Option<&str>) -> Self {
        Self::NoAdapter {
            channel: channel.map(str::to_string),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::Io { .. }
                | ConnectorError::Timeout { .. }
                | ConnectorError::NotConnected
        )
    }

    /// Returns `true` for capability errors.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, ConnectorError::Unsupported { .. })
    }

    /// Returns `true` for addressing errors.
    pub fn is_addressing_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::ElementNotFound { .. } | ConnectorError::WrongElementKind { .. }
        )
    }

    /// Returns `true` if the backend signals that notifications are not
    /// available and polling must be used instead.
    pub fn is_polling_fallback(&self) -> bool {
        matches!(
            self,
            ConnectorError::Unsupported {
                capability: Capability::Events
            }
        )
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "connection_failed",
            ConnectorError::NotConnected => "not_connected",
            ConnectorError::Disposed => "disposed",
            ConnectorError::Io { .. } => "io",
            ConnectorError::ElementNotFound { .. } => "element_not_found",
            ConnectorError::WrongElementKind { .. } => "wrong_element_kind",
            ConnectorError::Invocation { .. } => "invocation",
            ConnectorError::Unsupported { .. } => "unsupported",
            ConnectorError::TypeMismatch { .. } => "type_mismatch",
            ConnectorError::Translation { .. } => "translation",
            ConnectorError::Timeout { .. } => "timeout",
            ConnectorError::NoAdapter { .. } => "no_adapter",
            ConnectorError::Faulted { .. } => "faulted",
            ConnectorError::InvalidParameter(_) => "invalid_parameter",
        }
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        Self::io_with(err.to_string(), err)
    }
}

/// A Result type with ConnectorError.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

// =============================================================================
// Tests
// =============================================================================
