// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use weft_config::WeftConfig;
use weft_file::SETTING_READ_FILES;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::builtin_registry;

/// Validates the configuration file and prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = weft_config::load_config(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {}", config_path.display());
            println!();
            println!("Connectors:");
            for connector in &config.connectors {
                println!(
                    "  {} ({}) {}{}",
                    connector.name,
                    connector.backend,
                    if connector.wants_polling() { "polling" } else { "notifications" },
                    if connector.enabled { "" } else { ", disabled" }
                );
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "connectors": config.connectors.iter().map(|c| serde_json::json!({
                    "name": c.name,
                    "backend": c.backend,
                    "enabled": c.enabled,
                    "polling": c.wants_polling(),
                })).collect::<Vec<_>>(),
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let text = serde_json::to_string_pretty(&output)?;
            println!("{}", text);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::StrictWarnings { count: warnings.len() });
    }

    Ok(())
}

/// Collects non-fatal configuration problems.
pub(crate) fn collect_warnings(config: &WeftConfig) -> Vec<String> {
    let registry = builtin_registry();
    let mut warnings = Vec::new();

    if config.connectors.is_empty() {
        warnings.push("No connectors configured".to_string());
    } else if config.enabled_connectors().next().is_none() {
        warnings.push("All connectors are disabled".to_string());
    }

    for connector in &config.connectors {
        let Some(descriptor) = registry.lookup(&connector.backend) else {
            warnings.push(format!(
                "Connector '{}' uses unknown backend '{}'",
                connector.name, connector.backend
            ));
            continue;
        };

        if descriptor.name() == weft_file::CONNECTOR_NAME
            && !connector
                .settings
                .keys()
                .any(|key| key.eq_ignore_ascii_case(SETTING_READ_FILES))
        {
            warnings.push(format!("Connector '{}' has no {} setting", connector.name, SETTING_READ_FILES));
        }
        if connector.polling == Some(true) && connector.notification_interval_ms == 0 {
            warnings.push(format!(
                "Connector '{}' polls with a zero interval and will never poll",
                connector.name
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_config::ConnectorConfig;

    #[test]
    fn test_warnings() {
        let mut unknown = ConnectorConfig::new("opc");
        unknown.backend = "OpcUa".into();
        let mut zero = ConnectorConfig::new("zero").with_setting("READ_FILES", "a.txt");
        zero.polling = Some(true);
        zero.notification_interval_ms = 0;
        let bare = ConnectorConfig::new("bare");

        let warnings = collect_warnings(&WeftConfig {
            connectors: vec![unknown, zero, bare],
        });
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("OpcUa"));
        assert!(warnings[1].contains("zero interval"));
        assert!(warnings[2].contains("READ_FILES"));
    }

    #[test]
    fn test_empty_config_warns() {
        let warnings = collect_warnings(&WeftConfig::default());
        assert_eq!(warnings, vec!["No connectors configured".to_string()]);
    }
}
