//! The browser page capability
//!
//! [`Page`] is the narrow surface the action-script runner and the snapshot
//! extractor drive. [`crate::McpPage`] implements it against the Playwright
//! MCP server; tests implement it with scripted fakes.

use crate::error::Result;
use crate::script::{Act, Locator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Page load milestones, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// DOM parsed (`DOMContentLoaded`)
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// All subresources loaded (`load`)
    Load,
    /// No network activity for 500ms
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl LoadState {
    /// The three settle stages, in order
    pub const SETTLE_ORDER: [LoadState; 3] =
        [Self::DomContentLoaded, Self::Load, Self::NetworkIdle];

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomContentLoaded => "domcontentloaded",
            Self::Load => "load",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "load" => Ok(Self::Load),
            "networkidle" => Ok(Self::NetworkIdle),
            // Playwright's `commit` fires before DOMContentLoaded
            "commit" => Ok(Self::DomContentLoaded),
            other => Err(format!("unknown load state '{}'", other)),
        }
    }
}

/// One live browser page
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for `wait_until`
    async fn goto(&self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()>;

    /// Resolve `locator` (auto-waiting until actionable) and perform `action`
    async fn perform(&self, locator: &Locator, action: &Act, timeout: Duration) -> Result<()>;

    /// Wait until `locator` resolves to a visible element
    async fn wait_for_locator(&self, locator: &Locator, timeout: Duration) -> Result<()>;

    /// Wait until the page reaches `state`
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    /// Sleep without touching the page
    async fn wait_for_timeout(&self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Run a page function and return its JSON result. Unsandboxed.
    async fn evaluate(&self, function: &str) -> Result<serde_json::Value>;

    /// Write a PNG screenshot to `path`
    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

    /// Current page URL
    async fn url(&self) -> Result<String>;
}
