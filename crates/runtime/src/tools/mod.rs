//! Tool registry and execution hosts.

mod empty;
pub mod errors;
mod host;
mod mcp_host;
pub mod types;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_host::McpToolHost;
pub use types::{CapabilityManifest, ParamKind, Parameter, ToolSpec};
