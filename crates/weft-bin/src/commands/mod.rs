// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: connect the configured connectors
//! - `validate`: validate the configuration file
//! - `connectors`: list the known backends
//! - `version`: show version information

mod connectors;
mod run;
mod validate;
mod version;

pub use connectors::connectors;
pub use run::run;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Connectors(args) => connectors::connectors(&cli, args),
        Commands::Version => version::version(&cli),
    }
}
