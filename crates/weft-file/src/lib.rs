// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # weft-file
//!
//! File-backed channel connector.
//!
//! Every line of the selected files is one datum, tagged with the file name
//! as its channel. Written payloads go to one output file per channel.
//!
//! ## Settings
//!
//! | Setting | Meaning |
//! |---------|---------|
//! | `READ_FILES` | files, directories or regular expressions separated by `;` or `:` |
//! | `WRITE_FILES` | output file, or existing directory for generated names |
//! | `DATA_TIMEDIFF` | pause in milliseconds between pushed lines |
//! | `WRITE_PREFIX` / `WRITE_SUFFIX` | generated output name parts |
//!
//! ## Example
//!
//! ```rust,ignore
//! use weft_file::file_connector;
//!
//! let connector = file_connector(vec![Arc::new(adapter)])?;
//! connector.add_callback(|reading: Reading| println!("{reading:?}"));
//!
//! let params = ConnectorParameter::builder("localhost", 10)
//!     .specific_setting("READ_FILES", "data/readings.json")
//!     .build()?;
//! connector.connect(&params).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod backend;
pub mod files;
pub mod model;

use std::sync::Arc;

use weft_core::{
    AdapterRef, Capabilities, ChannelConnector, ConnectorDescriptor, ConnectorRegistry, ConnectorResult,
    Payload,
};

pub use backend::{
    FileBackend, NAME as CONNECTOR_NAME, OUT_NAME_PREFIX, OUT_NAME_SUFFIX, SETTING_DATA_TIMEDIFF,
    SETTING_READ_FILES, SETTING_WRITE_FILES, SETTING_WRITE_PREFIX, SETTING_WRITE_SUFFIX,
};
pub use files::{is_written_file, output_file_name, resolve_read_files};
pub use model::{FileModelAccess, FILE_CAPABILITIES};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Channel connector over files.
pub type FileConnector<CO, CI> = ChannelConnector<FileBackend, CO, CI>;

/// Creates a file connector from channel-bound adapters.
pub fn file_connector<CO, CI>(
    adapters: Vec<AdapterRef<Vec<u8>, Vec<u8>, CO, CI>>,
) -> ConnectorResult<FileConnector<CO, CI>>
where
    CO: Payload + Clone,
    CI: Payload,
{
    ChannelConnector::new(FileBackend::new(), adapters)
}

/// Descriptor of the file connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileConnectorDescriptor;

impl ConnectorDescriptor for FileConnectorDescriptor {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<FileBackend>()
    }

    fn capabilities(&self) -> Capabilities {
        FILE_CAPABILITIES
    }
}

/// Registers the file connector descriptor.
pub fn register(registry: &ConnectorRegistry) {
    registry.register(Arc::new(FileConnectorDescriptor));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_descriptor() {
        let registry = ConnectorRegistry::new();
        register(&registry);

        let descriptor = registry.lookup("File").unwrap();
        assert!(descriptor.type_name().ends_with("FileBackend"));
        assert!(descriptor.capabilities().supports_events);
        assert!(!descriptor.capabilities().has_model);
    }
}
