//! Empty tool host implementation.

use crate::model::ToolCall;
use crate::tools::{CapabilityManifest, ToolError, ToolHost};
use serde_json::Value;

/// A no-op tool host with no tools.
///
/// Lets a conversation run as plain chat.
#[derive(Debug, Default)]
pub struct EmptyToolHost {
    manifest: CapabilityManifest,
}

impl ToolHost for EmptyToolHost {
    fn manifest(&self) -> &CapabilityManifest {
        &self.manifest
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        Err(ToolError::UnknownTool(call.name.clone()))
    }

    async fn shutdown(&mut self) {}
}
