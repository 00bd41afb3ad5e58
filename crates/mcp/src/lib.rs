//! MCP (Model Context Protocol) client library.
//!
//! This crate talks to a tool server running as a child process, with
//! newline-delimited JSON-RPC on its stdin/stdout.
//!
//! - [`Transport`] spawns the process and exposes its streams as a [`Channel`].
//! - [`Session`] runs the protocol: `initialize`, `tools/list`, `tools/call`,
//!   with responses correlated by request id.
//! - [`Client`] owns both and tears them down in order.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, ServerConfig, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::from_script("weather.py")?;
//! let mut client = Client::connect(&config, DEFAULT_TIMEOUT).await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = client
//!     .call_tool("get_alerts", Some(serde_json::json!({ "state": "CA" })))
//!     .await?;
//! println!("{}", result.text());
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
mod session;
mod transport;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{
    CallToolResult, InitializeResult, JsonRpcError, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use session::{DEFAULT_TIMEOUT, Session, SessionState};
pub use transport::{Channel, MAX_OUTPUT_SIZE, ServerConfig, Transport};
