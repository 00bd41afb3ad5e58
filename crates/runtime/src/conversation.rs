//! Conversation orchestration.
//!
//! A [`Conversation`] binds one model backend to one tool host and runs the
//! query loop: ask the model, execute the tool calls it requests, feed the
//! results back, and repeat until the model answers in plain text.

use crate::model::{Backend, Message, ModelRequest, Part, Role, ToolCall, ToolResult, Usage};
use crate::tools::{CapabilityManifest, ToolError, ToolHost};
use crate::Result;
use tracing::{debug, warn};

/// Output-length budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Tool round-trips allowed within a single query.
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 8;

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub max_tokens: u32,
    pub max_round_trips: usize,
    pub system: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            system: None,
        }
    }
}

/// Where a query is in its model/tool cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    AwaitingModel,
    ToolCallPending(Vec<ToolCall>),
    Done,
}

/// Answer text built up over a query.
///
/// Model text is appended verbatim. Notes (tool failures, the round-trip
/// notice) sit on their own line.
#[derive(Debug, Default)]
struct Answer {
    text: String,
    after_note: bool,
}

impl Answer {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.after_note {
            self.text.push('\n');
            self.after_note = false;
        }
        self.text.push_str(text);
    }

    fn push_note(&mut self, note: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(note);
        self.after_note = true;
    }
}

/// A chat bound to one backend and one tool host.
///
/// The capability manifest is the host's, captured when the host
/// connected. History lives only in memory.
pub struct Conversation<B: Backend, H: ToolHost> {
    backend: B,
    host: H,
    config: ConversationConfig,
    messages: Vec<Message>,
    usage: Usage,
}

impl<B: Backend, H: ToolHost> Conversation<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Self::with_config(backend, host, ConversationConfig::default())
    }

    pub fn with_config(backend: B, host: H, config: ConversationConfig) -> Self {
        Self {
            backend,
            host,
            config,
            messages: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn manifest(&self) -> &CapabilityManifest {
        self.host.manifest()
    }

    /// Committed history.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tokens used by all completed queries.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Run one user query to completion and return the answer text.
    ///
    /// Tool failures are reported inside the answer and to the model; only
    /// a model failure fails the query. History is updated only when the
    /// query completes, so an error or a dropped future leaves it as it was.
    /// A query whose final reply is empty is also left out of history.
    pub async fn process_query(&mut self, query: &str) -> Result<String> {
        let mut transcript = self.messages.clone();
        transcript.push(Message::user(query));

        let mut answer = Answer::default();
        let mut usage = Usage::default();
        let mut round_trips = 0;
        let mut state = QueryState::AwaitingModel;

        loop {
            state = match state {
                QueryState::AwaitingModel => {
                    let request = ModelRequest {
                        messages: &transcript,
                        tools: self.host.manifest().specs(),
                        system: self.config.system.as_deref(),
                        max_tokens: self.config.max_tokens,
                    };
                    let response = self.backend.call(request).await?;
                    usage += response.usage;

                    let message = response.message;
                    answer.push_text(&message.text());
                    let calls = message.tool_calls();
                    let message = message.without_blank_text();

                    if calls.is_empty() {
                        if message.parts.is_empty() {
                            // Nothing to answer with; keep the query out of history.
                            debug!("model returned an empty reply");
                            self.usage += usage;
                            return Ok(answer.text);
                        }
                        transcript.push(message);
                        QueryState::Done
                    } else if round_trips >= self.config.max_round_trips {
                        let notice = format!("[stopped after {round_trips} tool round-trips]");
                        warn!(round_trips, "tool round-trip limit reached");
                        // Unanswered calls stay out of history.
                        let text = message.text();
                        let mut parts = Vec::new();
                        if !text.is_empty() {
                            parts.push(Part::Text(text));
                        }
                        parts.push(Part::Text(notice.clone()));
                        transcript.push(Message {
                            role: Role::Assistant,
                            parts,
                        });
                        answer.push_note(&notice);
                        QueryState::Done
                    } else {
                        transcript.push(message);
                        QueryState::ToolCallPending(calls)
                    }
                }
                QueryState::ToolCallPending(calls) => {
                    round_trips += 1;
                    debug!(round_trip = round_trips, calls = calls.len(), "dispatching tool calls");

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(self.dispatch(call, &mut answer).await);
                    }
                    transcript.push(Message::tool_results(results));
                    QueryState::AwaitingModel
                }
                QueryState::Done => break,
            };
        }

        self.messages = transcript;
        self.usage += usage;
        Ok(answer.text)
    }

    /// Execute one call. Failures become inline notes and failed results.
    async fn dispatch(&self, call: &ToolCall, answer: &mut Answer) -> ToolResult {
        let outcome = if self.host.manifest().contains(&call.name) {
            self.host.execute(call).await
        } else {
            Err(ToolError::UnknownTool(call.name.clone()))
        };

        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, "tool call succeeded");
                ToolResult::success(call, output)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                answer.push_note(&format!("[{e}]"));
                ToolResult::failure(call, e.to_string())
            }
        }
    }

    /// Release the tool host.
    pub async fn shutdown(&mut self) {
        self.host.shutdown().await;
    }
}
