//! In-memory fakes for the model, tool-server and connector seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::llm::{ApiError, EventStream, LlmDriver, LlmRequest};
use crate::mcp::{McpConnector, McpServerEntry, McpTool, ToolOutput, ToolServer, ToolServerError};
use crate::normalized::NormalizedEvent;

type ScriptedTurn = Result<Vec<Result<NormalizedEvent, ApiError>>, ApiError>;

/// Model driver that replays a fixed script, one entry per request.
pub(crate) struct ScriptedDriver {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedDriver {
    pub(crate) fn new(turns: Vec<Vec<Result<NormalizedEvent, ApiError>>>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request is rejected with `err`.
    pub(crate) fn failing(err: ApiError) -> Self {
        Self {
            turns: Mutex::new(VecDeque::from([Err(err)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> Result<EventStream, ApiError> {
        self.requests.lock().unwrap().push(req);
        let next = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::new(None, "script exhausted")));
        let events = next?;
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

pub(crate) fn text_turn(text: &str) -> Vec<Result<NormalizedEvent, ApiError>> {
    vec![
        Ok(NormalizedEvent::MessageDelta {
            text: text.to_string(),
        }),
        Ok(NormalizedEvent::Done),
    ]
}

pub(crate) fn tool_turn(
    call_id: &str,
    name: &str,
    arguments: &str,
) -> Vec<Result<NormalizedEvent, ApiError>> {
    vec![
        Ok(NormalizedEvent::ToolCallDelta {
            call_index: 0,
            id: Some(call_id.to_string()),
            name: Some(name.to_string()),
            arguments_delta: None,
        }),
        Ok(NormalizedEvent::ToolCallDelta {
            call_index: 0,
            id: None,
            name: None,
            arguments_delta: Some(arguments.to_string()),
        }),
        Ok(NormalizedEvent::ToolCallComplete {
            call_index: 0,
            id: call_id.to_string(),
            name: name.to_string(),
            arguments_json: arguments.to_string(),
        }),
        Ok(NormalizedEvent::Done),
    ]
}

#[derive(Default)]
struct FakeState {
    tools: Vec<McpTool>,
    fail_list: bool,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    cleanups: AtomicUsize,
}

/// Tool server whose tools answer `"<name> ok"`; a tool named `explode`
/// fails at the transport level. Clones share state.
#[derive(Clone)]
pub(crate) struct FakeToolServer {
    state: Arc<FakeState>,
}

impl FakeToolServer {
    pub(crate) fn new(tools: Vec<McpTool>) -> Self {
        Self {
            state: Arc::new(FakeState {
                tools,
                ..FakeState::default()
            }),
        }
    }

    pub(crate) fn failing_list() -> Self {
        Self {
            state: Arc::new(FakeState {
                fail_list: true,
                ..FakeState::default()
            }),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.state.calls.lock().unwrap().clone()
    }

    pub(crate) fn cleanups(&self) -> usize {
        self.state.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolServer for FakeToolServer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, ToolServerError> {
        if self.state.fail_list {
            return Err(ToolServerError::ListTools {
                server: "fake".into(),
                message: "connection refused".into(),
            });
        }
        Ok(self.state.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolServerError> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        if name == "explode" {
            return Err(ToolServerError::CallTool {
                server: "fake".into(),
                tool: name.into(),
                message: "broken pipe".into(),
            });
        }
        Ok(ToolOutput {
            text: format!("{name} ok"),
            is_error: false,
        })
    }

    async fn cleanup(&self) -> Result<(), ToolServerError> {
        self.state.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out a shared [`FakeToolServer`], or failing.
pub(crate) struct FakeConnector {
    pub(crate) server: Option<FakeToolServer>,
    pub(crate) attempts: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn serving(server: FakeToolServer) -> Self {
        Self {
            server: Some(server),
            attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            server: None,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(
        &self,
        name: &str,
        _entry: &McpServerEntry,
    ) -> anyhow::Result<Box<dyn ToolServer>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.server {
            Some(server) => Ok(Box::new(server.clone())),
            None => Err(anyhow::anyhow!("failed to connect stdio MCP server '{name}'")),
        }
    }
}
