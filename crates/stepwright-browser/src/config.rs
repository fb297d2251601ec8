//! Browser configuration

use crate::mcp::McpServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Browser configuration (`[browser]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Command that starts the Playwright MCP server
    pub command: String,
    /// Arguments passed before the generated flags
    pub args: Vec<String>,
    /// Browser channel (`chrome`, `firefox`, `webkit`, `msedge`); server default when unset
    pub browser: Option<String>,
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Per-request MCP timeout in seconds
    pub request_timeout_secs: u64,
    /// Extra environment variables for the server process
    pub env: HashMap<String, String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "@playwright/mcp@latest".to_string()],
            browser: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            request_timeout_secs: 60,
            env: HashMap::new(),
        }
    }
}

impl BrowserConfig {
    /// Full argument list for the server process
    pub fn server_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if self.headless {
            args.push("--headless".to_string());
        }
        if let Some(browser) = &self.browser {
            args.push("--browser".to_string());
            args.push(browser.clone());
        }
        args.push("--viewport-size".to_string());
        args.push(format!("{},{}", self.viewport_width, self.viewport_height));
        args
    }

    /// MCP server process configuration
    pub fn server_config(&self) -> McpServerConfig {
        let mut config = McpServerConfig::new("playwright", &self.command, self.server_args());
        config.env = self.env.clone();
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config
    }
}
