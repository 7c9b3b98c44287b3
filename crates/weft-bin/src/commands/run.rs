// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::{ConnectorRuntime, RecordSink};

/// Executes the `run` command.
///
/// Records are printed as `<connector>\t<record>`, one per line.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!("Starting Weft...");

    let config = weft_config::load_config(&cli.config)
        .map_err(|e| BinError::from(e).with_context("Loading configuration"))?;

    let sink: RecordSink = Arc::new(|name, record| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}\t{}", name, String::from_utf8_lossy(record));
    });

    let metrics = ConnectorRuntime::new(config)
        .only(args.connector)
        .run(sink, args.duration.map(Duration::from_secs))
        .await?;

    if args.metrics {
        for (name, snapshot) in &metrics {
            let json = serde_json::to_string(snapshot)?;
            println!("{}\t{}", name, json);
        }
    }
    Ok(())
}
