// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # weft-bin
//!
//! Command line runner for Weft connectors.
//!
//! - CLI argument parsing with clap
//! - Connector runtime: build, connect, print records, disconnect
//! - Graceful shutdown on Ctrl-C / SIGTERM or after a duration
//! - Logging initialization
//!
//! ## Usage
//!
//! ```bash
//! # Run the connectors of weft.yaml (default command)
//! weft
//!
//! # Run one connector for ten seconds and print its metrics
//! weft -c readings.toml run -n readings --duration 10 --metrics
//!
//! # Validate configuration
//! weft validate --strict
//!
//! # List backends
//! weft connectors -f json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{builtin_registry, ConnectorRuntime, RecordSink, RunningConnector};
pub use shutdown::{ShutdownCoordinator, ShutdownReason};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
