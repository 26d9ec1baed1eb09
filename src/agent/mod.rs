//! Agent assembly and the tool-call loop.
//!
//! An [`AgentDefinition`] pairs a name and instructions with a hosted model
//! ([`LlmDriver`]) and a connected [`ToolServer`]. Running a prompt:
//! 1. Lists the server's tools (lazily, at the start of each turn)
//! 2. Streams the model response, detecting function calls
//! 3. Executes function calls through the tool server
//! 4. Feeds tool outputs back to the model
//! 5. Repeats until the model answers without calling a tool
//!
//! The agent borrows the tool server; whoever connected it keeps ownership
//! and is responsible for releasing it.

mod conversation;

pub use conversation::Conversation;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::llm::{ApiError, LlmDriver, LlmRequest};
use crate::mcp::{ToolServer, unique_exposed_names};
use crate::normalized::NormalizedEvent;

use conversation::{assistant_message, function_call, function_call_output, user_message};

/// Display name of the workspace agent.
pub const DEFAULT_AGENT_NAME: &str = "workspace-mcp";

/// Instructions given to the workspace agent.
pub const DEFAULT_INSTRUCTIONS: &str = "Use the MCP tools to help with Google Workspace tasks.";

/// Maximum number of model calls per prompt.
pub const MAX_TURNS: usize = 10;

/// Errors that end an agent run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model API (or the tool listing it depends on) failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),
}

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    complete: bool,
}

/// A named agent bound to a model and a tool server.
pub struct AgentDefinition<'a> {
    name: String,
    instructions: String,
    model: Arc<dyn LlmDriver>,
    tools: &'a dyn ToolServer,
}

impl std::fmt::Debug for AgentDefinition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("tool_server", &self.tools.name())
            .finish_non_exhaustive()
    }
}

impl<'a> AgentDefinition<'a> {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: Arc<dyn LlmDriver>,
        tools: &'a dyn ToolServer,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model,
            tools,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Run one prompt against the agent, streaming events as they happen.
    ///
    /// The stream ends after `Done` or the first error. On success the
    /// turn's items are committed to `conversation`.
    #[allow(clippy::too_many_lines)]
    pub fn run_streamed<'s>(
        &'s self,
        conversation: &'s mut Conversation,
        prompt: String,
    ) -> impl Stream<Item = Result<NormalizedEvent, AgentError>> + Send + 's {
        async_stream::stream! {
            let request_id = Uuid::new_v4().to_string();
            yield Ok(NormalizedEvent::StreamStart { request_id: request_id.clone() });

            let tools = match self.tools.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::error!(
                        request_id = %request_id,
                        server = %self.tools.name(),
                        error = %e,
                        "Tool listing failed"
                    );
                    yield Err(AgentError::Api(ApiError::tool_list(e)));
                    return;
                }
            };

            // exposed (sanitized, de-duplicated) name -> raw MCP name
            let exposed = unique_exposed_names(&tools);
            let tool_index: HashMap<String, String> = exposed
                .iter()
                .zip(&tools)
                .map(|(name, t)| (name.clone(), t.name.clone()))
                .collect();
            let tool_defs: Vec<serde_json::Value> = exposed
                .iter()
                .zip(&tools)
                .map(|(name, t)| t.to_function_tool(name))
                .collect();

            tracing::info!(
                request_id = %request_id,
                agent = %self.name,
                conversation_id = %conversation.id(),
                history_items = conversation.len(),
                tool_count = tool_defs.len(),
                "Starting agent run"
            );

            let mut turn_items = vec![user_message(&prompt)];

            for iteration in 1..=MAX_TURNS {
                let mut input = conversation.items().to_vec();
                input.extend(turn_items.iter().cloned());

                let req = LlmRequest {
                    instructions: Some(self.instructions.clone()),
                    input,
                    tools: tool_defs.clone(),
                };

                let mut events = match self.model.stream(req).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(
                            request_id = %request_id,
                            iteration = iteration,
                            error = %e,
                            status = ?e.status,
                            "Model request failed"
                        );
                        yield Err(AgentError::Api(e));
                        return;
                    }
                };

                let mut accumulators: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
                let mut assistant_text = String::new();

                while let Some(item) = events.next().await {
                    let event = match item {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::error!(request_id = %request_id, error = %e, "Model stream failed");
                            yield Err(AgentError::Api(e));
                            return;
                        }
                    };

                    match &event {
                        NormalizedEvent::MessageDelta { text } => assistant_text.push_str(text),
                        NormalizedEvent::ToolCallDelta { call_index, id, name, arguments_delta } => {
                            let acc = accumulators.entry(*call_index).or_default();
                            if acc.id.is_none() {
                                acc.id.clone_from(id);
                            }
                            if acc.name.is_none() {
                                acc.name.clone_from(name);
                            }
                            if let Some(delta) = arguments_delta {
                                acc.arguments.push_str(delta);
                            }
                        }
                        NormalizedEvent::ToolCallComplete { call_index, id, name, arguments_json } => {
                            let acc = accumulators.entry(*call_index).or_default();
                            acc.id = Some(id.clone());
                            acc.name = Some(name.clone());
                            acc.arguments.clone_from(arguments_json);
                            acc.complete = true;
                        }
                        NormalizedEvent::Done => break,
                        NormalizedEvent::StreamStart { .. } | NormalizedEvent::ToolResult { .. } => {}
                    }

                    tracing::trace!(request_id = %request_id, event = crate::normalized::event_name(&event), "Model event");
                    yield Ok(event);
                }

                if !assistant_text.is_empty() {
                    turn_items.push(assistant_message(&assistant_text));
                }

                let calls: Vec<(String, String, String)> = accumulators
                    .into_values()
                    .filter_map(|acc| {
                        if !acc.complete {
                            tracing::warn!(
                                request_id = %request_id,
                                tool_name = ?acc.name,
                                "Dropping tool call that never completed"
                            );
                            return None;
                        }
                        let id = acc.id.filter(|s| !s.is_empty())?;
                        let name = acc.name.filter(|s| !s.is_empty())?;
                        Some((id, name, acc.arguments))
                    })
                    .collect();

                if calls.is_empty() {
                    tracing::info!(
                        request_id = %request_id,
                        iteration = iteration,
                        "Agent produced final output"
                    );
                    conversation.commit(turn_items);
                    yield Ok(NormalizedEvent::Done);
                    return;
                }

                for (id, name, arguments) in &calls {
                    turn_items.push(function_call(id, name, arguments));
                }

                for (id, name, arguments) in &calls {
                    let args: serde_json::Value = serde_json::from_str(arguments)
                        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

                    tracing::info!(
                        request_id = %request_id,
                        iteration = iteration,
                        tool_id = %id,
                        tool_name = %name,
                        "Executing tool call"
                    );

                    let (content, success) = match tool_index.get(name) {
                        None => (format!("Tool {name} not found in agent {}", self.name), false),
                        Some(raw) => match self.tools.call_tool(raw, args).await {
                            Ok(output) => (output.text, !output.is_error),
                            Err(e) => {
                                tracing::error!(
                                    request_id = %request_id,
                                    tool_id = %id,
                                    tool_name = %name,
                                    error = %e,
                                    "Tool call failed"
                                );
                                (
                                    format!("An error occurred while running the tool. Please try again. Error: {e}"),
                                    false,
                                )
                            }
                        },
                    };

                    turn_items.push(function_call_output(id, &content));
                    yield Ok(NormalizedEvent::ToolResult {
                        id: id.clone(),
                        name: name.clone(),
                        content,
                        success,
                    });
                }
            }

            tracing::error!(
                request_id = %request_id,
                max_turns = MAX_TURNS,
                "Maximum agent turns exceeded"
            );
            yield Err(AgentError::MaxTurnsExceeded(MAX_TURNS));
        }
    }
}

/// An agent together with the conversation it is having.
#[derive(Debug)]
pub struct AgentSession<'a> {
    agent: &'a AgentDefinition<'a>,
    conversation: Conversation,
}

impl<'a> AgentSession<'a> {
    pub fn new(agent: &'a AgentDefinition<'a>) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn run(
        &mut self,
        prompt: String,
    ) -> impl Stream<Item = Result<NormalizedEvent, AgentError>> + Send + '_ {
        self.agent.run_streamed(&mut self.conversation, prompt)
    }
}
