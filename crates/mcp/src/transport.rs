//! Child-process transport and newline-delimited framing.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Maximum inbound frame size (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How long a child gets to exit on its own after its stdin closes.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Configuration for an MCP server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// Build a config that runs a server script with its interpreter.
    ///
    /// `.py` scripts run under `python`, `.js` scripts under `node`.
    pub fn from_script(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let command = match path.extension().and_then(|e| e.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => return Err(Error::UnsupportedServerType(display)),
        };
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("server")
            .to_string();

        Ok(Self {
            name,
            command: command.to_string(),
            args: vec![display],
            env: HashMap::new(),
        })
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The two byte streams a session talks over.
pub struct Channel {
    pub inbound: FrameReader,
    pub outbound: FrameWriter,
}

impl Channel {
    pub fn new(
        inbound: impl AsyncRead + Send + Unpin + 'static,
        outbound: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            inbound: FrameReader::new(Box::new(inbound)),
            outbound: FrameWriter::new(Box::new(outbound)),
        }
    }
}

/// Reads one JSON message per line.
pub struct FrameReader {
    inner: BufReader<BoxedReader>,
    line: String,
}

impl FrameReader {
    fn new(inner: BoxedReader) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: String::new(),
        }
    }

    /// Next non-empty frame, or `None` at end of stream.
    ///
    /// Oversized frames are consumed and reported as
    /// [`Error::OutputTooLarge`]; the reader stays usable.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            self.line.clear();
            let bytes_read = self.inner.read_line(&mut self.line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }
            if self.line.len() > MAX_OUTPUT_SIZE {
                return Err(Error::OutputTooLarge {
                    size: self.line.len(),
                    max: MAX_OUTPUT_SIZE,
                });
            }
            if !self.line.trim().is_empty() {
                return Ok(Some(self.line.trim_end().to_string()));
            }
        }
    }
}

/// Writes one JSON message per line.
pub struct FrameWriter {
    inner: BoxedWriter,
}

impl FrameWriter {
    fn new(inner: BoxedWriter) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, message: &impl serde::Serialize) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.write_frame(&json).await
    }

    /// Write an already-encoded message. `frame` must not contain newlines.
    pub async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.inner.write_all(frame.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Handle to a spawned server process.
pub struct Transport {
    name: String,
    child: Option<Child>,
}

impl Transport {
    /// Spawn the server and hand back its stdout/stdin as a [`Channel`].
    ///
    /// stderr is inherited so server diagnostics reach the terminal.
    pub fn spawn(config: &ServerConfig) -> Result<(Self, Channel)> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(Error::TransportUnavailable)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::TransportUnavailable(std::io::Error::other("failed to capture stdin"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::TransportUnavailable(std::io::Error::other("failed to capture stdout"))
        })?;

        info!(
            server = %config.name,
            command = %config.command,
            pid = child.id(),
            "spawned server process"
        );

        let transport = Self {
            name: config.name.clone(),
            child: Some(child),
        };
        Ok((transport, Channel::new(stdout, stdin)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Terminate the child and reap it.
    ///
    /// Waits [`SHUTDOWN_GRACE`] for a voluntary exit before killing.
    /// Calling this again, or after the child already exited, is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(server = %self.name, %status, "server already exited");
            return Ok(());
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(server = %self.name, %status, "server exited");
            }
            _ => {
                debug!(server = %self.name, "killing server process");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
