//! Normalized event types for streaming agent responses.
//!
//! The Responses API driver translates server-sent events into
//! [`NormalizedEvent`]s, and the agent adds tool lifecycle events on top.
//! The REPL consumes the combined stream.
//!
//! # Event Types
//!
//! - Message deltas for incremental text output
//! - Tool call lifecycle (delta, complete, result)
//! - Stream lifecycle (start, done)
//!
//! Errors are not events; they travel as the `Err` side of the stream item.

use serde::{Deserialize, Serialize};

/// Normalized streaming events emitted by the model driver and agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    // ─────────────────────────────────────────────────────────────────────
    // Stream Lifecycle
    // ─────────────────────────────────────────────────────────────────────
    /// Indicates the start of a new agent turn.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Unique identifier for this turn.
        request_id: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Message Content
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental text delta from the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Tool Calls
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental tool call delta (streaming tool call assembly).
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        /// Output index of this tool call in the model response.
        call_index: usize,
        /// Tool call ID (may arrive in first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool/function name (may arrive in first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Incremental arguments JSON fragment.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// Tool call is fully assembled and ready for execution.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        call_index: usize,
        id: String,
        name: String,
        /// Complete arguments as JSON string.
        arguments_json: String,
    },

    /// Result from executing a tool.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// Tool call ID this result corresponds to.
        id: String,
        name: String,
        /// Text handed back to the model.
        content: String,
        #[serde(default = "default_true")]
        success: bool,
    },

    /// The model finished its response.
    #[serde(rename = "done")]
    Done,
}

fn default_true() -> bool {
    true
}

/// Stable name of a [`NormalizedEvent`], used in trace logs.
pub fn event_name(evt: &NormalizedEvent) -> &'static str {
    match evt {
        NormalizedEvent::StreamStart { .. } => "stream.start",
        NormalizedEvent::MessageDelta { .. } => "message.delta",
        NormalizedEvent::ToolCallDelta { .. } => "tool_call.delta",
        NormalizedEvent::ToolCallComplete { .. } => "tool_call.complete",
        NormalizedEvent::ToolResult { .. } => "tool_result",
        NormalizedEvent::Done => "done",
    }
}
