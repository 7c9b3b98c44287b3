// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Weft Integration Tests
//!
//! Shared test utilities and the integration test suites of Weft.
//!
//! ## Module Structure
//!
//! - [`common`]: shared test utilities
//!   - `fixtures`: record types, data files and parameters
//!   - `mocks`: an in-memory backend and model access
//!   - `recorder`: recording reception callbacks
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p weft-tests
//! cargo test -p weft-tests --test integration_core
//! cargo test -p weft-tests --test integration_file
//! cargo test -p weft-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Core Tests (`integration_core.rs`)
//! - Connector state machine
//! - Poll exclusivity and adaptive poll pacing
//! - Dispatch order
//! - Capability errors of model access
//!
//! ### File Tests (`integration_file.rs`)
//! - Reading single files and regex selections
//! - Writing commands into generated files
//! - Disconnecting while a poll is outstanding
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON configuration files
//! - Conversion into connector parameters

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::recorder::*;
    pub use crate::common::{init_test_logging, temp_test_dir, unique_test_id};
}
