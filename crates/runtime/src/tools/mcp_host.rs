//! MCP-backed tool host.

use std::time::Duration;

use mcp::{Client, ServerConfig};
use serde_json::Value;
use tracing::{info, warn};

use super::{CapabilityManifest, ToolError, ToolHost};
use crate::model::ToolCall;

/// Tool host backed by one MCP server.
///
/// The manifest is captured at connect time and not refreshed.
pub struct McpToolHost {
    client: Client,
    manifest: CapabilityManifest,
}

impl McpToolHost {
    /// Spawn the server, handshake, and cache its tool manifest.
    pub async fn connect(config: &ServerConfig, request_timeout: Duration) -> mcp::Result<Self> {
        let mut client = Client::connect(config, request_timeout).await?;

        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    warn!(server = %config.name, error = %close_err, "failed to stop server");
                }
                return Err(e);
            }
        };

        let manifest = CapabilityManifest::from_tools(&tools);
        info!(server = %client.name(), tools = manifest.len(), "connected to tool server");
        Ok(Self { client, manifest })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl ToolHost for McpToolHost {
    fn manifest(&self) -> &CapabilityManifest {
        &self.manifest
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = match &call.input {
            Value::Object(_) => Some(call.input.clone()),
            Value::Null => None,
            other => {
                return Err(ToolError::InvalidInput {
                    name: call.name.clone(),
                    reason: format!("arguments must be an object, got {other}"),
                });
            }
        };

        let result = self
            .client
            .call_tool(&call.name, arguments)
            .await
            .map_err(|e| ToolError::Invocation {
                name: call.name.clone(),
                reason: match e {
                    mcp::Error::ToolInvocation { reason, .. } => reason,
                    other => other.to_string(),
                },
            })?;

        if result.is_text_only() {
            return Ok(Value::String(result.text()));
        }
        serde_json::to_value(&result.content).map_err(|e| ToolError::Invocation {
            name: call.name.clone(),
            reason: format!("serialize result: {e}"),
        })
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.client.close().await {
            warn!(server = %self.client.name(), error = %e, "failed to stop server");
        }
    }
}
