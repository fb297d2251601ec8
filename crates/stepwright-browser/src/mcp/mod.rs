//! MCP (Model Context Protocol) client
//!
//! JSON-RPC 2.0 over a child process's stdin/stdout. Used to drive the
//! Playwright MCP server, which owns the actual browser.

mod client;
mod protocol;
mod transport;

pub use client::McpClient;
pub use protocol::{
    McpContent, McpError, McpInitResult, McpNotification, McpRequest, McpResponse, McpResult,
    McpRpcError, McpTool, McpToolResult, ServerInfo,
};
pub use transport::{McpConnection, McpServerConfig};
