//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The server process could not be started.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] std::io::Error),

    #[error("unsupported server type: {0} (expected a .py or .js file)")]
    UnsupportedServerType(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("operation not valid in session state `{0}`")]
    InvalidState(crate::SessionState),

    #[error("session closed")]
    SessionClosed,

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("tool `{name}` failed: {reason}")]
    ToolInvocation { name: String, reason: String },

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any failure of a tool call into [`Error::ToolInvocation`].
    ///
    /// Session-level conditions (closed, wrong state) pass through unchanged.
    pub(crate) fn into_tool_error(self, name: &str) -> Self {
        match self {
            Self::SessionClosed | Self::InvalidState(_) | Self::ToolInvocation { .. } => self,
            other => Self::ToolInvocation {
                name: name.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
