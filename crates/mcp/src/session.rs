//! MCP session: handshake, tool discovery and tool calls over a [`Channel`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsParams, ListToolsResult,
    METHOD_NOT_FOUND, RequestId, Tool,
};
use crate::transport::{Channel, FrameReader, FrameWriter};

/// Default timeout for MCP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `tools/list` pages, in case a server keeps handing out cursors.
const MAX_TOOL_PAGES: usize = 64;

/// Encoded frames waiting for the writer task.
const OUTBOUND_QUEUE: usize = 32;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

type Pending = HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>;
type Outbound = mpsc::Sender<String>;

/// State shared between the session and its reader task.
#[derive(Default)]
struct Inflight {
    pending: std::sync::Mutex<Pending>,
    server_gone: AtomicBool,
}

impl Inflight {
    fn pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand a response to whoever is waiting on its id.
    fn resolve(&self, response: JsonRpcResponse) {
        let waiter = self.pending().remove(&response.id);
        match waiter {
            Some(tx) => {
                let id = response.id.clone();
                if tx.send(response).is_err() {
                    warn!(%id, "discarding response for abandoned request");
                }
            }
            None => {
                warn!(id = %response.id, "discarding response with unknown correlation id");
            }
        }
    }

    /// Drop every waiter; they observe a closed channel.
    fn fail_all(&self) {
        self.pending().clear();
    }
}

/// Removes a pending entry when the request finishes, times out, or is dropped.
struct PendingGuard<'a> {
    inflight: &'a Inflight,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inflight.pending().remove(&self.id);
    }
}

/// A live MCP session with one server.
///
/// A background task owns the inbound stream and routes each response to
/// the request that shares its id, so replies may arrive in any order.
/// A second task owns the outbound stream and writes whole frames from a
/// queue, so a server that stops reading stalls only that task.
pub struct Session {
    state: std::sync::Mutex<SessionState>,
    outbound: std::sync::Mutex<Option<Outbound>>,
    inflight: Arc<Inflight>,
    reader: JoinHandle<()>,
    next_id: AtomicI64,
    request_timeout: Duration,
    server_info: OnceLock<InitializeResult>,
}

impl Session {
    /// Start a session over `channel`. Must be called inside a tokio runtime.
    pub fn new(channel: Channel, request_timeout: Duration) -> Self {
        let Channel { inbound, outbound } = channel;
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let inflight = Arc::new(Inflight::default());

        tokio::spawn(write_loop(outbound, rx));
        let reader = tokio::spawn(read_loop(inbound, Arc::clone(&inflight), tx.clone()));

        Self {
            state: std::sync::Mutex::new(SessionState::Uninitialized),
            outbound: std::sync::Mutex::new(Some(tx)),
            inflight,
            reader,
            next_id: AtomicI64::new(1),
            request_timeout,
            server_info: OnceLock::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handshake result, once the session is ready.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.get()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Perform the `initialize` handshake.
    ///
    /// Any failure (timeout, malformed reply, server exit) closes the
    /// session and is reported as [`Error::HandshakeFailed`].
    pub async fn initialize(&self) -> Result<&InitializeResult> {
        self.transition(|state| match state {
            SessionState::Uninitialized => Ok(SessionState::Initializing),
            SessionState::Closed => Err(Error::SessionClosed),
            other => Err(Error::InvalidState(other)),
        })?;

        let handshake = async {
            let result: InitializeResult = self
                .request("initialize", Some(InitializeParams::default()))
                .await?;
            self.notify("notifications/initialized").await?;
            Ok::<_, Error>(result)
        };

        match handshake.await {
            Ok(result) => {
                info!(
                    server = %result.server_info.name,
                    version = result.server_info.version.as_deref().unwrap_or("unknown"),
                    protocol = %result.protocol_version,
                    "session ready"
                );
                let info = self.server_info.get_or_init(|| result);
                self.transition(|state| match state {
                    SessionState::Initializing => Ok(SessionState::Ready),
                    _ => Err(Error::SessionClosed),
                })?;
                Ok(info)
            }
            Err(e) => {
                warn!(error = %e, "handshake failed");
                self.close().await;
                Err(Error::HandshakeFailed(e.to_string()))
            }
        }
    }

    /// List the server's tools in the order it reports them.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.require_ready()?;

        let mut tools = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_TOOL_PAGES {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    debug!(count = tools.len(), "listed tools");
                    return Ok(tools);
                }
            }
        }
        Err(Error::InvalidResponse(format!(
            "tools/list still paginating after {MAX_TOOL_PAGES} pages"
        )))
    }

    /// Call a tool by name.
    ///
    /// Remote errors, `isError` results and timeouts all surface as
    /// [`Error::ToolInvocation`].
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.require_ready()?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self
            .request("tools/call", Some(params))
            .await
            .map_err(|e| e.into_tool_error(name))?;

        if result.is_error {
            return Err(Error::ToolInvocation {
                name: name.to_string(),
                reason: result.text(),
            });
        }
        Ok(result)
    }

    /// Close the session from any state. Idempotent.
    ///
    /// Pending requests fail with [`Error::SessionClosed`]. Once queued
    /// frames are written the outbound stream is shut down, which signals
    /// EOF to the server.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, SessionState::Closed)
        };
        if previous == SessionState::Closed {
            return;
        }

        // The reader holds the other sender; both must go for EOF.
        self.reader.abort();
        self.inflight.fail_all();
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(from = %previous, "session closed");
    }

    // --- Internal methods ---

    fn transition(
        &self,
        next: impl FnOnce(SessionState) -> Result<SessionState>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let to = next(*state)?;
        debug!(from = %*state, %to, "session state");
        *state = to;
        Ok(())
    }

    fn require_ready(&self) -> Result<()> {
        match self.state() {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(Error::SessionClosed),
            other => Err(Error::InvalidState(other)),
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let (tx, rx) = oneshot::channel();
        self.inflight.pending().insert(id.clone(), tx);
        let _guard = PendingGuard {
            inflight: &self.inflight,
            id: id.clone(),
        };

        // Checked after registering so a concurrent EOF can't strand us.
        if self.inflight.server_gone.load(Ordering::SeqCst) {
            return Err(Error::ServerExited);
        }

        // One deadline covers queueing the frame and waiting for the reply.
        let exchange = async {
            self.send(&request).await?;
            debug!(%id, method, "sent request");
            match rx.await {
                Ok(response) => Ok(response),
                Err(_) if self.state() == SessionState::Closed => Err(Error::SessionClosed),
                Err(_) => Err(Error::ServerExited),
            }
        };
        let response = match timeout(self.request_timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%id, method, timeout = ?self.request_timeout, "request timed out");
                return Err(Error::Timeout);
            }
        };

        let value = response.into_result()?;
        serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.send(&JsonRpcNotification::new(method)).await
    }

    async fn send(&self, message: &impl Serialize) -> Result<()> {
        let frame = serde_json::to_string(message)?;
        let outbound = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::SessionClosed)?;

        outbound
            .send_timeout(frame, self.request_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => Error::Timeout,
                SendTimeoutError::Closed(_) => Error::ServerExited,
            })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Single owner of the inbound stream.
///
/// Runs until the server closes its output. On exit every pending request
/// is failed so no caller waits out its timeout.
async fn read_loop(mut inbound: FrameReader, inflight: Arc<Inflight>, outbound: Outbound) {
    loop {
        let frame = match inbound.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("server closed its output");
                break;
            }
            Err(Error::OutputTooLarge { size, max }) => {
                warn!(size, max, "dropping oversized frame");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "reading from server failed");
                break;
            }
        };
        trace!(%frame, "received");

        match Incoming::parse(&frame) {
            Ok(Incoming::Response(response)) => inflight.resolve(response),
            Ok(Incoming::Request { id, method }) => {
                let reply = if method == "ping" {
                    JsonRpcResponse::success(id, Value::Object(Default::default()))
                } else {
                    debug!(%method, "rejecting server request");
                    JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("method not found: {method}"))
                };
                // Never wait on the writer here; a stalled server would stop us reading.
                match serde_json::to_string(&reply).map(|frame| outbound.try_send(frame)) {
                    Ok(Ok(())) => {}
                    Ok(Err(TrySendError::Full(_))) => {
                        warn!(%method, "outbound queue full; dropping reply to server request");
                    }
                    Ok(Err(TrySendError::Closed(_))) => {
                        debug!(%method, "outbound closed; dropping reply to server request");
                    }
                    Err(e) => warn!(error = %e, "failed to encode reply"),
                }
            }
            Ok(Incoming::Notification { method }) if method == "notifications/tools/list_changed" => {
                info!("server reported a tool list change; keeping the tools from connect time");
            }
            Ok(Incoming::Notification { method }) => debug!(%method, "notification"),
            Err(e) => warn!(error = %e, "discarding malformed frame"),
        }
    }

    inflight.server_gone.store(true, Ordering::SeqCst);
    inflight.fail_all();
}

/// Single owner of the outbound stream.
///
/// Writes queued frames in order. When every sender is gone the stream is
/// shut down so the server sees EOF.
async fn write_loop(mut outbound: FrameWriter, mut frames: mpsc::Receiver<String>) {
    while let Some(frame) = frames.recv().await {
        trace!(%frame, "sending");
        if let Err(e) = outbound.write_frame(&frame).await {
            warn!(error = %e, "writing to server failed");
            return;
        }
    }
    if let Err(e) = outbound.shutdown().await {
        debug!(error = %e, "outbound stream already closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Scripted server on the far end of an in-memory pipe.
    struct FakeServer {
        channel: Channel,
    }

    fn pair() -> (Channel, FakeServer) {
        pair_with_capacity(64 * 1024)
    }

    fn pair_with_capacity(capacity: usize) -> (Channel, FakeServer) {
        let (client, server) = tokio::io::duplex(capacity);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        (
            Channel::new(client_read, client_write),
            FakeServer {
                channel: Channel::new(server_read, server_write),
            },
        )
    }

    impl FakeServer {
        async fn recv(&mut self) -> Value {
            let frame = self.channel.inbound.next_frame().await.unwrap().unwrap();
            serde_json::from_str(&frame).unwrap()
        }

        async fn send(&mut self, message: Value) {
            self.channel.outbound.send(&message).await.unwrap();
        }

        async fn reply(&mut self, id: &Value, result: Value) {
            self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
                .await;
        }

        async fn handshake(&mut self) {
            let init = self.recv().await;
            assert_eq!(init["method"], "initialize");
            self.reply(
                &init["id"],
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "weather", "version": "1.0.0"}
                }),
            )
            .await;
            let note = self.recv().await;
            assert_eq!(note["method"], "notifications/initialized");
        }
    }

    fn text_result(text: &str) -> Value {
        json!({"content": [{"type": "text", "text": text}]})
    }

    async fn ready_session() -> (Session, FakeServer) {
        let (channel, mut server) = pair();
        let session = Session::new(channel, Duration::from_secs(5));
        let (init, _) = tokio::join!(session.initialize(), server.handshake());
        init.unwrap();
        (session, server)
    }

    #[tokio::test]
    async fn handshake_reaches_ready() {
        let (session, _server) = ready_session().await;
        assert_eq!(session.state(), SessionState::Ready);
        let info = session.server_info().unwrap();
        assert_eq!(info.server_info.name, "weather");
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn operations_before_handshake_are_rejected() {
        let (channel, _server) = pair();
        let session = Session::new(channel, DEFAULT_TIMEOUT);

        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(SessionState::Uninitialized)));
        let err = session.call_tool("get_alerts", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(SessionState::Uninitialized)));
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let (session, _server) = ready_session().await;
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(SessionState::Ready)));
    }

    #[tokio::test]
    async fn handshake_fails_when_server_exits() {
        let (channel, server) = pair();
        let session = Session::new(channel, Duration::from_secs(5));
        drop(server);

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(_)), "{err}");
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn handshake_fails_on_malformed_reply() {
        let (channel, mut server) = pair();
        let session = Session::new(channel, Duration::from_secs(5));

        let serve = async {
            let init = server.recv().await;
            server.reply(&init["id"], json!({"unexpected": true})).await;
        };
        let (result, _) = tokio::join!(session.initialize(), serve);
        assert!(matches!(result.unwrap_err(), Error::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn handshake_times_out() {
        let (channel, _server) = pair();
        let session = Session::new(channel, Duration::from_millis(50));

        let err = session.initialize().await.unwrap_err();
        match err {
            Error::HandshakeFailed(reason) => assert!(reason.contains("timeout")),
            other => panic!("expected handshake failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn list_tools_follows_cursors_in_order() {
        let (session, mut server) = ready_session().await;

        let serve = async {
            let first = server.recv().await;
            assert_eq!(first["method"], "tools/list");
            assert!(first["params"].get("cursor").is_none());
            server
                .reply(
                    &first["id"],
                    json!({
                        "tools": [
                            {"name": "get_alerts", "description": "Get weather alerts",
                             "inputSchema": {"type": "object"}},
                            {"name": "get_forecast", "description": "Get a forecast"}
                        ],
                        "nextCursor": "page-2"
                    }),
                )
                .await;
            let second = server.recv().await;
            assert_eq!(second["params"]["cursor"], "page-2");
            server
                .reply(&second["id"], json!({"tools": [{"name": "ping"}]}))
                .await;
        };

        let (tools, _) = tokio::join!(session.list_tools(), serve);
        let names: Vec<_> = tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["get_alerts", "get_forecast", "ping"]);
    }

    #[tokio::test]
    async fn responses_are_matched_by_id_not_arrival_order() {
        let (session, mut server) = ready_session().await;

        let serve = async {
            let a = server.recv().await;
            let b = server.recv().await;
            // Stray reply nobody asked for.
            server.reply(&json!(999), text_result("stray")).await;
            // Answer B before A.
            let b_name = b["params"]["name"].as_str().unwrap().to_string();
            let a_name = a["params"]["name"].as_str().unwrap().to_string();
            server.reply(&b["id"], text_result(&b_name)).await;
            server.reply(&a["id"], text_result(&a_name)).await;
        };

        let (a, b, _) = tokio::join!(
            session.call_tool("alpha", Some(json!({}))),
            session.call_tool("beta", Some(json!({}))),
            serve
        );
        assert_eq!(a.unwrap().text(), "alpha");
        assert_eq!(b.unwrap().text(), "beta");
    }

    #[tokio::test]
    async fn call_tool_sends_name_and_arguments() {
        let (session, mut server) = ready_session().await;

        let serve = async {
            let call = server.recv().await;
            assert_eq!(call["method"], "tools/call");
            assert_eq!(call["params"]["name"], "get_alerts");
            assert_eq!(call["params"]["arguments"], json!({"state": "CA"}));
            server
                .reply(&call["id"], text_result("No active alerts"))
                .await;
        };

        let (result, _) = tokio::join!(
            session.call_tool("get_alerts", Some(json!({"state": "CA"}))),
            serve
        );
        assert_eq!(result.unwrap().text(), "No active alerts");
    }

    #[tokio::test]
    async fn remote_failures_become_tool_invocation_errors() {
        let (session, mut server) = ready_session().await;

        let serve = async {
            let call = server.recv().await;
            server
                .reply(
                    &call["id"],
                    json!({"content": [{"type": "text", "text": "bad state code"}], "isError": true}),
                )
                .await;
            let call = server.recv().await;
            server
                .send(json!({
                    "jsonrpc": "2.0",
                    "id": call["id"],
                    "error": {"code": -32602, "message": "Unknown tool: nope"}
                }))
                .await;
        };

        let run = async {
            let first = session.call_tool("get_alerts", None).await.unwrap_err();
            let second = session.call_tool("nope", None).await.unwrap_err();
            (first, second)
        };
        let ((first, second), _) = tokio::join!(run, serve);

        match first {
            Error::ToolInvocation { name, reason } => {
                assert_eq!(name, "get_alerts");
                assert_eq!(reason, "bad state code");
            }
            other => panic!("unexpected error: {other}"),
        }
        match second {
            Error::ToolInvocation { name, reason } => {
                assert_eq!(name, "nope");
                assert!(reason.contains("Unknown tool"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn call_times_out_when_server_stops_reading() {
        let (channel, mut server) = pair_with_capacity(256);
        let session = Session::new(channel, Duration::from_millis(100));
        let (init, _) = tokio::join!(session.initialize(), server.handshake());
        init.unwrap();

        // The server never reads again, so this frame cannot be flushed.
        let big = json!({"state": "x".repeat(4096)});
        let stalled = tokio::time::timeout(
            Duration::from_secs(2),
            session.call_tool("get_alerts", Some(big)),
        )
        .await
        .expect("call must honor the request timeout");
        match stalled.unwrap_err() {
            Error::ToolInvocation { name, reason } => {
                assert_eq!(name, "get_alerts");
                assert!(reason.contains("timeout"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Inbound traffic still flows while the writer is stuck: a ping
        // does not block the reader and a reply reaches its caller.
        let serve = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            server
                .send(json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}))
                .await;
            server.reply(&json!(3), text_result("no alerts")).await;
        };
        let (answered, _) = tokio::join!(
            tokio::time::timeout(
                Duration::from_secs(2),
                session.call_tool("get_alerts", Some(json!({"state": "CA"}))),
            ),
            serve
        );
        assert_eq!(answered.unwrap().unwrap().text(), "no alerts");

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close must not wait on a stalled writer");
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn late_reply_after_timeout_is_discarded() {
        let (channel, mut server) = pair();
        let session = Session::new(channel, Duration::from_millis(100));
        let (init, _) = tokio::join!(session.initialize(), server.handshake());
        init.unwrap();

        let (slow, first) = tokio::join!(session.call_tool("slow", None), server.recv());
        match slow.unwrap_err() {
            Error::ToolInvocation { name, reason } => {
                assert_eq!(name, "slow");
                assert!(reason.contains("timeout"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let serve = async {
            let second = server.recv().await;
            server.reply(&first["id"], text_result("too late")).await;
            server.reply(&second["id"], text_result("fast")).await;
        };
        let (fast, _) = tokio::join!(session.call_tool("fast", None), serve);
        assert_eq!(fast.unwrap().text(), "fast");
    }

    #[tokio::test]
    async fn server_exit_fails_pending_calls_fast() {
        let (session, mut server) = ready_session().await;

        let serve = async move {
            let _call = server.recv().await;
            drop(server);
        };
        let (result, _) = tokio::join!(session.call_tool("get_alerts", None), serve);
        match result.unwrap_err() {
            Error::ToolInvocation { reason, .. } => assert!(reason.contains("exited")),
            other => panic!("unexpected error: {other}"),
        }

        let err = session.call_tool("get_alerts", None).await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation { .. }));
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (_session, mut server) = ready_session().await;

        server
            .send(json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}))
            .await;
        let pong = server.recv().await;
        assert_eq!(pong["id"], "srv-1");
        assert_eq!(pong["result"], json!({}));

        server
            .send(json!({"jsonrpc": "2.0", "id": 7, "method": "sampling/createMessage"}))
            .await;
        let rejected = server.recv().await;
        assert_eq!(rejected["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let (session, _server) = ready_session().await;

        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.call_tool("get_alerts", None).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn close_sends_eof_to_server() {
        let (session, mut server) = ready_session().await;
        session.close().await;
        assert!(server.channel.inbound.next_frame().await.unwrap().is_none());
    }
}
