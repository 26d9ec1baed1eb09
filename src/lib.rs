//! Workspace MCP REPL clients
//!
//! Two small console clients that connect an OpenAI agent to a Google
//! Workspace MCP server and forward prompts to it, one line at a time.
//!
//! # Architecture
//!
//! - **Configuration**: environment (optionally seeded from `.env`) plus a few CLI overrides
//! - **MCP Client**: stdio child process or streamable HTTP, via `rmcp`
//! - **Agent**: tool-call loop over the OpenAI Responses API
//! - **REPL**: prompt, stream the answer, repeat; always releases the server on exit
//!
//! # Modules
//!
//! - [`config`]: Environment loading and validation
//! - [`mcp`]: MCP server descriptors and the live connection
//! - [`llm`]: Model driver trait and the Responses API driver
//! - [`agent`]: Agent definition, conversation memory, tool loop
//! - [`normalized`]: Unified streaming event model
//! - [`repl`]: Interactive loop
//! - [`diagnostics`]: User-facing error messages
//! - [`runner`]: Connect, run, tear down

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod agent;
pub mod config;
pub mod diagnostics;
pub mod llm;
pub mod mcp;
pub mod normalized;
pub mod repl;
pub mod runner;

#[cfg(test)]
pub(crate) mod test_support;
