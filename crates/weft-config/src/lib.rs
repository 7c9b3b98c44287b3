// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # weft-config
//!
//! Connector configuration for Weft.
//!
//! - **Schema**: `WeftConfig` and `ConnectorConfig`, deserialized with serde
//! - **Loader**: YAML, TOML and JSON files, `${VAR:default}` placeholders and
//!   `WEFT_*` environment overrides
//! - **Conversion**: `ConnectorConfig::to_parameter` builds the
//!   `ConnectorParameter` handed to `connect`
//!
//! ## Example
//!
//! ```no_run
//! use weft_config::load_config;
//!
//! let config = load_config("weft.yaml").unwrap();
//! for connector in config.enabled_connectors() {
//!     let params = connector.to_parameter().unwrap();
//!     println!("{} -> {}", connector.name, params.url());
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{ConnectorConfig, WeftConfig, DEFAULT_BACKEND, DEFAULT_HOST};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
