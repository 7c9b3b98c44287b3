// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the weft binary.
//!
//! Every error maps to a process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 1 | configuration could not be loaded or is unusable |
//! | 2 | a connector failed to connect or run |
//! | 3 | printing results failed |

use thiserror::Error;

/// Result type alias for weft-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors reported by the weft binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Loading or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] weft_config::ConfigError),

    /// A connector entry names a backend without a factory.
    #[error("Unknown backend '{backend}' for connector '{connector}'")]
    UnknownBackend {
        /// Backend name from the configuration.
        backend: String,
        /// Connector entry using it.
        connector: String,
    },

    /// Nothing to run after filtering.
    #[error("No enabled connectors")]
    NoConnectors,

    /// `validate --strict` found warnings.
    #[error("Strict mode: {count} warning(s) found")]
    StrictWarnings {
        /// Number of warnings.
        count: usize,
    },

    /// A connector operation failed.
    #[error(transparent)]
    Connector(#[from] weft_core::ConnectorError),

    /// Serializing output failed.
    #[error("Cannot format output: {0}")]
    Output(#[from] serde_json::Error),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with the step it happened in.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns `true` if the configuration is at fault.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Config(_) | Self::UnknownBackend { .. } | Self::NoConnectors | Self::StrictWarnings { .. } => {
                true
            }
            Self::WithContext { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::WithContext { source, .. } => source.exit_code(),
            Self::Connector(_) => 2,
            Self::Output(_) | Self::Io(_) => 3,
            _ => 1,
        }
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its exit code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_exit_code() {
        let err = BinError::NoConnectors.with_context("Starting");
        assert_eq!(err.to_string(), "Starting: No enabled connectors");
        assert!(err.is_configuration());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        let unknown = BinError::UnknownBackend {
            backend: "Modbus".into(),
            connector: "plc".into(),
        };
        assert_eq!(unknown.exit_code(), 1);
        assert_eq!(BinError::StrictWarnings { count: 2 }.exit_code(), 1);
        assert_eq!(BinError::from(weft_core::ConnectorError::NotConnected).exit_code(), 2);
        assert!(!BinError::from(weft_core::ConnectorError::NotConnected).is_configuration());
        assert_eq!(BinError::from(std::io::Error::other("x")).exit_code(), 3);
    }
}
