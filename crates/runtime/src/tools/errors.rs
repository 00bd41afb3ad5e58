use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ToolError {
    /// The model asked for a tool that isn't in the manifest.
    #[error("tool `{0}` is not available")]
    UnknownTool(String),
    #[error("invalid input for `{name}`: {reason}")]
    InvalidInput { name: String, reason: String },
    /// The server reported a failure, or the call timed out.
    #[error("tool `{name}` failed: {reason}")]
    Invocation { name: String, reason: String },
}

