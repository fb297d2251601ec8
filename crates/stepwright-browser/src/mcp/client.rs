//! MCP Client
//!
//! High-level client over a single MCP server connection.

use super::protocol::{
    McpContent, McpError, McpInitResult, McpNotification, McpRequest, McpResult, McpTool,
    McpToolResult,
};
use super::transport::{McpConnection, McpServerConfig};
use serde::Deserialize;
use tracing::{debug, info};

/// MCP client for one server connection
pub struct McpClient {
    connection: McpConnection,
    tools: Vec<McpTool>,
}

impl McpClient {
    /// Spawn the server, run the initialize handshake and cache its tools
    pub async fn connect(config: &McpServerConfig) -> McpResult<Self> {
        let connection = McpConnection::start(config)?;
        let mut client = Self {
            connection,
            tools: Vec::new(),
        };

        client.initialize().await?;
        client.tools = client.fetch_tools().await?;

        let tool_names: Vec<&str> = client.tools.iter().map(|t| t.name.as_str()).collect();
        info!(server = %config.name, tools = ?tool_names, "MCP server initialized");

        Ok(client)
    }

    async fn initialize(&self) -> McpResult<()> {
        let request = McpRequest::new("initialize", self.connection.next_id()).with_params(
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "stepwright",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        );

        let response = self.connection.send(request).await?;

        if let Some(result) = response.result {
            let init_result: McpInitResult = serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("Failed to parse init result: {}", e)))?;

            debug!(
                server = %self.connection.name,
                protocol = %init_result.protocol_version,
                "MCP handshake complete"
            );
        }

        self.connection
            .notify(McpNotification::new("notifications/initialized"))
    }

    async fn fetch_tools(&self) -> McpResult<Vec<McpTool>> {
        let request = McpRequest::new("tools/list", self.connection.next_id());
        let response = self.connection.send(request).await?;

        if let Some(result) = response.result {
            #[derive(Deserialize)]
            struct ToolsResult {
                tools: Vec<McpTool>,
            }

            let tools_result: ToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("Failed to parse tools: {}", e)))?;

            Ok(tools_result.tools)
        } else {
            Ok(Vec::new())
        }
    }

    /// Tools advertised by the server
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Whether the server process is still attached
    pub fn is_connected(&self) -> bool {
        self.connection.is_active()
    }

    /// Call a tool
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> McpResult<McpToolResult> {
        if !self.tools.is_empty() && !self.tools.iter().any(|t| t.name == tool_name) {
            return Err(McpError::ToolNotFound(tool_name.to_string()));
        }

        let request = McpRequest::new("tools/call", self.connection.next_id()).with_params(
            serde_json::json!({
                "name": tool_name,
                "arguments": arguments
            }),
        );

        let response = self.connection.send(request).await?;

        if let Some(result) = response.result {
            serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("Failed to parse tool result: {}", e)))
        } else {
            Ok(McpToolResult {
                content: vec![McpContent::Text {
                    text: "No result returned".to_string(),
                }],
                is_error: true,
            })
        }
    }

    /// Stop the server process
    pub fn shutdown(&self) {
        self.connection.stop();
    }
}
