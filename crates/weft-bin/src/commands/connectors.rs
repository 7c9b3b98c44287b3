// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `connectors` command.

use crate::cli::{Cli, ConnectorsArgs, OutputFormat};
use crate::error::BinResult;
use crate::runtime::builtin_registry;

/// Lists the known connector backends and their capabilities.
pub fn connectors(_cli: &Cli, args: ConnectorsArgs) -> BinResult<()> {
    let registry = builtin_registry();
    let descriptors = registry.descriptors();

    match args.format {
        OutputFormat::Text => {
            for descriptor in &descriptors {
                let caps = descriptor.capabilities();
                println!("{}", descriptor.name());
                println!("  type:          {}", descriptor.type_name());
                println!("  model:         {}", caps.has_model);
                println!("  events:        {}", caps.supports_events);
                println!("  structs:       {}", caps.model_structs);
                println!("  calls:         {}", caps.model_calls);
                println!("  properties:    {}", caps.model_properties);
                println!("  time diff:     {}", caps.data_time_difference);
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = descriptors
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name(),
                        "type": d.type_name(),
                        "capabilities": d.capabilities(),
                    })
                })
                .collect();
            let text = serde_json::to_string_pretty(&output)?;
            println!("{}", text);
        }
    }
    Ok(())
}
