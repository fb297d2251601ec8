//! MCP Protocol Types
//!
//! JSON-RPC 2.0 based protocol types for MCP communication.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MCP error type
#[derive(Debug, Error)]
pub enum McpError {
    /// Transport error (I/O, process, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error (invalid JSON-RPC, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server returned an error
    #[error("Server error {code}: {message}")]
    Server {
        /// Error code
        code: i32,
        /// Error message
        message: String,
    },

    /// Timeout waiting for response
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Tool not offered by the server
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),
}

/// MCP Result type
pub type McpResult<T> = std::result::Result<T, McpError>;

/// JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request method
    pub method: String,
    /// Request ID
    pub id: u64,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl McpRequest {
    /// Create a new request
    pub fn new(method: impl Into<String>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            id,
            params: None,
        }
    }

    /// Add parameters
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpNotification {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Notification method
    pub method: String,
    /// Parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl McpNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Response ID (matches request ID)
    pub id: u64,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: String,
}

/// MCP tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// Content items
    #[serde(default)]
    pub content: Vec<McpContent>,
    /// Whether the tool call resulted in an error
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl McpToolResult {
    /// All text content joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First image payload (base64), if any
    pub fn image_data(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            McpContent::Image { data, .. } => Some(data.as_str()),
            _ => None,
        })
    }
}

/// MCP content item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McpContent {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },
    /// Image content
    #[serde(rename = "image")]
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource content
    #[serde(rename = "resource")]
    Resource {
        /// Resource URI
        uri: String,
        /// Resource text
        #[serde(default)]
        text: Option<String>,
    },
}

impl McpContent {
    /// Get text representation of content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            McpContent::Text { text } => Some(text),
            McpContent::Resource { text: Some(t), .. } => Some(t),
            _ => None,
        }
    }
}

/// MCP initialization result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpInitResult {
    /// Protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server info
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_request_serialization() {
        let request = McpRequest::new("tools/list", 1);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let json = serde_json::to_string(&McpNotification::new("notifications/initialized")).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_tool_result_with_image() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Took the full page screenshot"},
                {"type": "image", "data": "iVBORw0KGgo=", "mimeType": "image/png"}
            ]
        }"#;

        let result: McpToolResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "Took the full page screenshot");
        assert_eq!(result.image_data(), Some("iVBORw0KGgo="));
    }

    #[test]
    fn test_error_result() {
        let json = r#"{"content": [{"type": "text", "text": "Error: boom"}], "isError": true}"#;
        let result: McpToolResult = serde_json::from_str(json).unwrap();
        assert!(result.is_error);
        assert!(result.image_data().is_none());
    }
}
