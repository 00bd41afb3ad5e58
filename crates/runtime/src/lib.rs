//! Relay runtime: model backends, tool hosts and the conversation loop.
//!
//! # Overview
//!
//! - **Backend**: a trait abstracting LLM providers (Anthropic, Gemini).
//! - **ToolHost**: the tools a conversation may call and how to run them.
//!   [`McpToolHost`] serves them from an MCP server process.
//! - **Conversation**: drives a query through model and tool round-trips
//!   until the model answers in text.
//!
//! # Example
//!
//! ```no_run
//! use mcp::ServerConfig;
//! use runtime::{AnthropicBackend, Conversation, McpToolHost};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = AnthropicBackend::builder("sk-ant-api03-...", "claude-sonnet-4-20250514").build();
//! let config = ServerConfig::from_script("weather.py")?;
//! let host = McpToolHost::connect(&config, mcp::DEFAULT_TIMEOUT).await?;
//!
//! let mut chat = Conversation::new(backend, host);
//! let answer = chat.process_query("Any weather alerts in CA?").await?;
//! println!("{answer}");
//! chat.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod conversation;
mod error;
pub mod model;
pub mod providers;
pub mod tools;

pub use conversation::{
    Conversation, ConversationConfig, DEFAULT_MAX_ROUND_TRIPS, DEFAULT_MAX_TOKENS, QueryState,
};
pub use error::{Error, Result};
pub use model::{Backend, Message, ModelError, Part, Role, ToolCall, ToolResult, Usage};
pub use providers::{AnthropicBackend, GeminiBackend, Provider};
pub use tools::{CapabilityManifest, EmptyToolHost, McpToolHost, ToolError, ToolHost, ToolSpec};
