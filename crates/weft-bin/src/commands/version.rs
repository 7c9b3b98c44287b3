// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version information of all components.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("Weft - connectors for heterogeneous industrial data sources");
    println!();
    println!("Version Information:");
    println!("  weft-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  weft-core:   {}", weft_core::VERSION);
    println!("  weft-config: {}", weft_config::VERSION);
    println!("  weft-file:   {}", weft_file::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
