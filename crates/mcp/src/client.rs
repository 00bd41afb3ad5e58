//! Scoped ownership of a server process and its session.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::session::{Session, SessionState};
use crate::transport::{ServerConfig, Transport};

/// A connected MCP server: its process plus an initialized session.
///
/// [`Client::close`] tears down the session before the transport, exactly
/// once. Dropping an unclosed client does the same in field order.
pub struct Client {
    session: Session,
    transport: Transport,
    closed: bool,
}

impl Client {
    /// Spawn the server and complete the handshake.
    ///
    /// On failure everything started so far is torn down and no client is
    /// returned.
    pub async fn connect(config: &ServerConfig, request_timeout: Duration) -> Result<Self> {
        let (mut transport, channel) = Transport::spawn(config)?;
        let session = Session::new(channel, request_timeout);

        if let Err(e) = session.initialize().await {
            session.close().await;
            if let Err(close_err) = transport.close().await {
                warn!(server = %config.name, error = %close_err, "failed to stop server");
            }
            return Err(e);
        }

        Ok(Self {
            session,
            transport,
            closed: false,
        })
    }

    /// Server name from the configuration.
    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.session.list_tools().await
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.session.call_tool(name, arguments).await
    }

    /// Close the session, then stop the server. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.session.close().await;
        self.transport.close().await?;
        debug!(server = %self.transport.name(), "client closed");
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.closed && self.session.state() != SessionState::Closed {
            debug!(server = %self.transport.name(), "client dropped while open; killing server");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    fn shell(name: &str, script: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: HashMap::new(),
        }
    }

    /// Answers initialize (id 1), tools/list (id 2) and one tools/call (id 3).
    const WEATHER_SERVER: &str = r#"
read -r init
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"weather"}}}'
read -r initialized
read -r list
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"get_alerts","description":"Get weather alerts for a US state","inputSchema":{"type":"object","properties":{"state":{"type":"string"}},"required":["state"]}}]}}'
read -r call
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"No active alerts"}]}}'
read -r eof
"#;

    #[tokio::test]
    async fn connect_list_call_close() {
        let config = shell("weather", WEATHER_SERVER);
        let mut client = Client::connect(&config, Duration::from_secs(5)).await.unwrap();
        assert_eq!(client.name(), "weather");
        assert_eq!(client.session().state(), SessionState::Ready);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_alerts");

        let result = client
            .call_tool("get_alerts", Some(serde_json::json!({"state": "CA"})))
            .await
            .unwrap();
        assert_eq!(result.text(), "No active alerts");

        client.close().await.unwrap();
        assert!(client.is_closed());
        assert_eq!(client.session().state(), SessionState::Closed);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_ends_session_before_stopping_server() {
        let marker = std::env::temp_dir().join(format!("relay-eof-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);

        // Records "eof" only if stdin closes while the process is still alive.
        let script = r#"
read -r init
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"weather"}}}'
while read -r line; do :; done
echo eof > "$MARKER"
"#;
        let mut config = shell("weather", script);
        config
            .env
            .insert("MARKER".to_string(), marker.display().to_string());

        let mut client = Client::connect(&config, Duration::from_secs(5)).await.unwrap();
        client.close().await.unwrap();

        let recorded = std::fs::read_to_string(&marker).unwrap_or_default();
        let _ = std::fs::remove_file(&marker);
        assert_eq!(recorded.trim(), "eof");
    }

    #[tokio::test]
    async fn exit_before_handshake_fails_connect() {
        let config = shell("dead", "exit 0");
        let err = Client::connect(&config, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::HandshakeFailed(_)), "{err}");
    }

    #[tokio::test]
    async fn missing_binary_fails_connect() {
        let config = ServerConfig {
            name: "ghost".to_string(),
            command: "relay-test-no-such-binary".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        };
        let err = Client::connect(&config, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::TransportUnavailable(_)));
    }
}
