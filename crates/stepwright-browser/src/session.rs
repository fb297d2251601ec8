//! The single owned browser resource

use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::mcp::McpClient;
use crate::mcp_page::McpPage;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the Playwright MCP server and its page.
///
/// Exactly one owner drives it: `launch` before a job, `reset` between jobs,
/// `teardown` on shutdown. Every lifecycle call is idempotent.
pub struct BrowserSession {
    config: BrowserConfig,
    client: Option<Arc<McpClient>>,
    page: Option<McpPage>,
}

impl BrowserSession {
    /// New, not yet launched session
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            client: None,
            page: None,
        }
    }

    /// Whether a server is attached
    pub fn is_launched(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Start the MCP server (no-op when already running)
    pub async fn launch(&mut self) -> Result<()> {
        if self.is_launched() {
            return Ok(());
        }
        // A dead server from a previous launch is dropped first
        self.teardown().await;

        info!(
            command = %self.config.command,
            headless = self.config.headless,
            "Launching browser"
        );
        let client = McpClient::connect(&self.config.server_config()).await.map_err(|e| {
            warn!(error = %e, "Failed to start browser MCP server");
            Error::from(e)
        })?;
        let client = Arc::new(client);
        self.page = Some(McpPage::new(client.clone()));
        self.client = Some(client);
        info!("Browser launched");
        Ok(())
    }

    /// The live page, if launched
    pub fn page(&self) -> Option<&McpPage> {
        if self.is_launched() {
            self.page.as_ref()
        } else {
            None
        }
    }

    /// Close the browser window between jobs; the server is kept
    pub async fn reset(&mut self) -> Result<()> {
        match self.page() {
            Some(page) => {
                page.close_browser().await?;
                info!("Browser reset");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Close the browser and stop the server
    pub async fn teardown(&mut self) {
        if let Some(page) = self.page() {
            if let Err(e) = page.close_browser().await {
                warn!(error = %e, "Failed to close browser during teardown");
            }
        }
        self.page = None;
        if let Some(client) = self.client.take() {
            client.shutdown();
            info!("Browser session torn down");
        }
    }
}
