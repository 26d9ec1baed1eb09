//! Human-readable diagnostics for the ways a client run can end.

use crate::agent::AgentError;
use crate::mcp::Transport;

/// Printed when the user interrupts or closes input.
pub const EXIT_NOTICE: &str = "Exiting.";

const STDIO_TOOL_LIST_HINT: &str = "The MCP server failed to respond over stdio. Ensure it launches correctly, your OAuth vars are set, and the command is reachable.";

const HTTP_TOOL_LIST_HINT: &str = "The MCP server failed to respond over streamable HTTP. Ensure the container is running on the expected port and your URL/headers are correct.";

/// Guidance for a failed tool listing on the given transport.
pub fn tool_list_hint(transport: Transport) -> &'static str {
    match transport {
        Transport::Stdio => STDIO_TOOL_LIST_HINT,
        Transport::StreamableHttp => HTTP_TOOL_LIST_HINT,
    }
}

/// Rewrite an agent error into the message shown to the user.
pub fn translate(err: &AgentError, transport: Transport) -> String {
    match err {
        AgentError::Api(api) if api.is_tool_list_failure() => tool_list_hint(transport).to_string(),
        AgentError::Api(api) => format!("OpenAI API error: {}", api.message),
        other => format!("Agent error: {other}"),
    }
}
