//! Model Context Protocol (MCP) client plumbing.
//!
//! The wire protocol itself is handled by `rmcp`; this module only describes
//! how to reach a server and wraps the live connection behind [`ToolServer`].
//!
//! # Transports
//!
//! - **stdio**: the server is spawned as a child process (default
//!   `uvx workspace-mcp --tool-tier core`) with the OAuth client credentials
//!   injected into its environment.
//! - **streamable HTTP**: an already running server (default
//!   `http://localhost:8000/mcp`), optionally with a bearer token.
//!
//! # Tool Naming
//!
//! Tool names are exposed to the model sanitized to `^[a-zA-Z0-9_-]+$`
//! (e.g. `gmail.search` becomes `gmail_search`); names that collide after
//! sanitizing get a numeric suffix. Calls are mapped back to the raw name
//! before they reach the server.

pub mod config;
pub mod registry;
pub mod types;

pub use config::{McpServerEntry, Transport};
pub use registry::{McpConnector, RmcpConnector, ToolServer, ToolServerError};
pub use types::{McpTool, ToolOutput, unique_exposed_names};

/// Name the tool server is registered and logged under.
pub const SERVER_NAME: &str = "workspace-mcp";
