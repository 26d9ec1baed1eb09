//! Hosted model client.
//!
//! The [`LlmDriver`] trait is the narrow seam the agent talks through; the
//! only production implementation is [`ResponsesDriver`] for the `OpenAI`
//! Responses API (`/v1/responses`).
//!
//! # Example
//!
//! ```rust,ignore
//! use workspace_mcp_repl::llm::{LlmSettings, ResponsesDriver};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4.1-mini".to_string(),
//! };
//! let driver = ResponsesDriver::new(settings);
//! ```

pub mod responses;

pub use responses::ResponsesDriver;

use crate::normalized::NormalizedEvent;
use futures::Stream;
use std::pin::Pin;

/// LLM connection and model settings.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// Base URL for the API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// API key for bearer authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4.1-mini`).
    pub model: String,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

/// Marker the API uses when it could not list an MCP server's tools.
pub const TOOL_LIST_ERROR_MARKER: &str = "Error retrieving tool list";

/// HTTP 424 Failed Dependency, returned alongside [`TOOL_LIST_ERROR_MARKER`].
pub const FAILED_DEPENDENCY: u16 = 424;

/// An error reported by (or on the way to) the model API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status code, when the failure came with one.
    pub status: Option<u16>,
    pub message: String,
    /// Machine-readable error code from the API body, if any.
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// The failure raised when the tool server could not list its tools.
    pub fn tool_list(cause: impl std::fmt::Display) -> Self {
        Self {
            status: Some(FAILED_DEPENDENCY),
            message: format!("{TOOL_LIST_ERROR_MARKER}: {cause}"),
            code: Some("tool_list_error".to_string()),
        }
    }

    /// Whether this is the 424 "tool list" failure.
    pub fn is_tool_list_failure(&self) -> bool {
        self.status == Some(FAILED_DEPENDENCY) && self.message.contains(TOOL_LIST_ERROR_MARKER)
    }

    /// Build an error from a non-success HTTP response body.
    ///
    /// Uses `error.message` from an `OpenAI`-style JSON body when present and
    /// falls back to the raw body text.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(ToString::to_string)
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| format!("HTTP status {status}"));

        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .map(ToString::to_string);

        Self {
            status: Some(status),
            message,
            code,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.status().map(|s| s.as_u16()), format!("Connection error: {e}"))
    }
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System-level instructions for the model.
    pub instructions: Option<String>,
    /// Conversation input items in Responses API format.
    pub input: Vec<serde_json::Value>,
    /// Available tools in Responses API function-tool format.
    pub tools: Vec<serde_json::Value>,
}

/// Stream of driver events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<NormalizedEvent, ApiError>> + Send>>;

/// Trait for LLM streaming drivers.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or cannot be sent.
    async fn stream(&self, req: LlmRequest) -> Result<EventStream, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_prefers_error_message() {
        let err = ApiError::from_body(
            424,
            r#"{"error":{"message":"Error retrieving tool list from MCP server: 'workspace'. Http status code: 500","type":"external_connector_error","code":"http_error"}}"#,
        );
        assert_eq!(err.status, Some(424));
        assert!(err.message.starts_with("Error retrieving tool list"));
        assert_eq!(err.code.as_deref(), Some("http_error"));
        assert!(err.is_tool_list_failure());
    }

    #[test]
    fn test_tool_list_failure_needs_status_and_marker() {
        assert!(ApiError::tool_list("connection refused").is_tool_list_failure());
        assert!(!ApiError::new(Some(500), "Error retrieving tool list").is_tool_list_failure());
        assert!(!ApiError::new(Some(424), "dependency failed").is_tool_list_failure());
    }

    #[test]
    fn test_from_body_falls_back_to_text() {
        assert_eq!(ApiError::from_body(502, "bad gateway\n").message, "bad gateway");
        assert_eq!(ApiError::from_body(500, "").message, "HTTP status 500");
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let settings = LlmSettings {
            base_url: "https://api.openai.com".into(),
            api_key: Some("sk-secret".into()),
            model: "gpt-4.1-mini".into(),
        };
        assert!(!format!("{settings:?}").contains("sk-secret"));
    }
}
