// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Model access of the file connector.
//!
//! Files carry no model. The only supported operation is monitoring, which
//! is what the reader task does anyway.

use async_trait::async_trait;
use weft_core::{Capabilities, ConnectorResult, ModelAccess};

/// Capabilities of the file connector.
pub const FILE_CAPABILITIES: Capabilities = Capabilities {
    has_model: false,
    supports_events: true,
    hierarchical_qnames: false,
    model_calls: false,
    model_properties: false,
    model_structs: false,
    data_time_difference: true,
};

/// Model access without a model.
#[derive(Debug, Default)]
pub struct FileModelAccess;

#[async_trait]
impl ModelAccess for FileModelAccess {
    fn capabilities(&self) -> Capabilities {
        FILE_CAPABILITIES
    }

    async fn monitor(&self, _qnames: &[&str]) -> ConnectorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{Capability, ConnectorError, StructValue};

    #[tokio::test]
    async fn test_only_monitoring_is_supported() {
        let access = FileModelAccess;
        assert!(access.monitor(&["line"]).await.is_ok());
        assert!(matches!(
            access.get("line").await,
            Err(ConnectorError::Unsupported { capability: Capability::Properties })
        ));
        assert!(access.set_struct("x", StructValue::new("T")).await.is_err());
        assert!(access.register_custom_type("T").await.is_err());
    }
}
