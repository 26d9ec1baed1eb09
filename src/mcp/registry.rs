use crate::mcp::config::McpServerEntry;
use crate::mcp::types::{McpTool, ToolOutput};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService, ServiceExt},
    transport::{
        StreamableHttpClientTransport, TokioChildProcess,
        streamable_http_client::StreamableHttpClientTransportConfig,
    },
};
use tokio::{process::Command, sync::RwLock};

/// Failures talking to an already connected tool server.
#[derive(Debug, thiserror::Error)]
pub enum ToolServerError {
    #[error("MCP server '{server}' is no longer connected")]
    Closed { server: String },

    #[error("tools/list failed for MCP server '{server}': {message}")]
    ListTools { server: String, message: String },

    #[error("tools/call failed for {server}::{tool}: {message}")]
    CallTool {
        server: String,
        tool: String,
        message: String,
    },

    #[error("shutting down MCP server '{server}' failed: {message}")]
    Cleanup { server: String, message: String },
}

/// The set of tools one MCP server offers, behind an open connection.
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<McpTool>, ToolServerError>;

    /// Call a tool by its raw (unsanitized) MCP name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolServerError>;

    /// Release the connection. Later calls on the server fail with
    /// [`ToolServerError::Closed`].
    async fn cleanup(&self) -> Result<(), ToolServerError>;
}

/// Opens connections described by an [`McpServerEntry`].
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        entry: &McpServerEntry,
    ) -> anyhow::Result<Box<dyn ToolServer>>;
}

type ClientService = RunningService<RoleClient, ()>;

/// Connector backed by the `rmcp` client transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpConnector;

#[async_trait]
impl McpConnector for RmcpConnector {
    async fn connect(
        &self,
        name: &str,
        entry: &McpServerEntry,
    ) -> anyhow::Result<Box<dyn ToolServer>> {
        let service = match entry {
            McpServerEntry::Stdio { command, args, env } => {
                // The entry already carries the inherited environment.
                let mut cmd = Command::new(command);
                cmd.args(args).env_clear().envs(env);

                let transport = TokioChildProcess::new(cmd)
                    .with_context(|| format!("failed to launch MCP server command '{command}'"))?;
                ().serve(transport)
                    .await
                    .with_context(|| format!("failed to connect stdio MCP server '{name}'"))?
            }

            McpServerEntry::StreamableHttp { url, .. } => {
                let mut headers = HeaderMap::new();
                if let Some(auth) = entry.authorization_header() {
                    let mut value =
                        HeaderValue::from_str(&auth).context("bearer token is not a valid header")?;
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }

                let client = reqwest::Client::builder()
                    .default_headers(headers)
                    .build()
                    .context("failed to build HTTP client")?;

                let config = StreamableHttpClientTransportConfig::with_uri(url.as_str());
                let transport = StreamableHttpClientTransport::with_client(client, config);
                ().serve(transport)
                    .await
                    .with_context(|| format!("failed to connect remote MCP server '{name}' at {url}"))?
            }
        };

        tracing::info!(
            name: "mcp.connected",
            server = %name,
            transport = %entry.transport(),
            "MCP server connected"
        );

        Ok(Box::new(McpServer {
            name: name.to_string(),
            service: RwLock::new(Some(service)),
        }))
    }
}

/// A live connection to one MCP server.
pub struct McpServer {
    name: String,
    service: RwLock<Option<ClientService>>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl McpServer {
    fn closed(&self) -> ToolServerError {
        ToolServerError::Closed {
            server: self.name.clone(),
        }
    }
}

#[async_trait]
impl ToolServer for McpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, ToolServerError> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| self.closed())?;

        let list_err = |message: String| ToolServerError::ListTools {
            server: self.name.clone(),
            message,
        };

        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| list_err(e.to_string()))?;

        tools
            .into_iter()
            .map(|t| {
                serde_json::to_value(&t)
                    .and_then(serde_json::from_value::<McpTool>)
                    .map_err(|e| list_err(format!("malformed tool '{}': {e}", t.name)))
            })
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolServerError> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| self.closed())?;

        let call_err = |message: String| ToolServerError::CallTool {
            server: self.name.clone(),
            tool: name.to_string(),
            message,
        };

        let res = service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
            .map_err(|e| call_err(e.to_string()))?;

        let value = serde_json::to_value(res).map_err(|e| call_err(e.to_string()))?;
        Ok(ToolOutput::from_call_result(&value))
    }

    async fn cleanup(&self) -> Result<(), ToolServerError> {
        let Some(service) = self.service.write().await.take() else {
            return Err(self.closed());
        };

        let reason = service.cancel().await.map_err(|e| ToolServerError::Cleanup {
            server: self.name.clone(),
            message: e.to_string(),
        })?;

        tracing::info!(
            name: "mcp.closed",
            server = %self.name,
            reason = ?reason,
            "MCP server connection released"
        );
        Ok(())
    }
}
