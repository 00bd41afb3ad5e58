//! Tool host trait.

use crate::model::ToolCall;
use crate::tools::{CapabilityManifest, ToolError};
use serde_json::Value;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide the capability manifest and execute tool calls.
/// This is the boundary between the model loop and side effects.
pub trait ToolHost: Send + Sync {
    /// The tools the model may call.
    fn manifest(&self) -> &CapabilityManifest;

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;

    /// Release whatever the host holds. Must be safe to call more than once.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
