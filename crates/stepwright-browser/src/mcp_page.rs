//! [`Page`] backed by the Playwright MCP server

use crate::error::{Error, Result};
use crate::js;
use crate::mcp::{McpClient, McpToolResult};
use crate::page::{LoadState, Page};
use crate::script::{Act, Locator};
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Attempts for a page function interrupted by a navigation
const CONTEXT_RETRIES: u32 = 3;

/// The page of a Playwright MCP browser
#[derive(Clone)]
pub struct McpPage {
    client: Arc<McpClient>,
}

impl McpPage {
    /// Wrap a connected client
    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }

    async fn call(&self, tool: &str, args: serde_json::Value) -> Result<McpToolResult> {
        Ok(self.client.call_tool(tool, args).await?)
    }

    /// Run a page function and parse its result
    async fn run_function(&self, function: &str) -> Result<serde_json::Value> {
        let mut attempt = 0;
        loop {
            let result = self
                .call("browser_evaluate", json!({ "function": function }))
                .await?;
            let text = result.text();

            if !result.is_error && !text.trim_start().starts_with("### Error") {
                return Ok(parse_evaluate_text(&text));
            }

            attempt += 1;
            if is_context_lost(&text) && attempt < CONTEXT_RETRIES {
                debug!(attempt, "page function interrupted by navigation, retrying");
                tokio::time::sleep(Duration::from_millis(250)).await;
                continue;
            }
            return Err(Error::Evaluate(strip_error_header(&text)));
        }
    }

    /// Run a page function that resolves to `{ ok, error }`
    async fn run_checked(&self, function: &str) -> std::result::Result<(), String> {
        let value = self.run_function(function).await.map_err(|e| e.to_string())?;
        if value.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(());
        }
        Err(value
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("unexpected page function result: {}", value)))
    }

    /// Close the browser window; the server stays up and relaunches on next use
    pub async fn close_browser(&self) -> Result<()> {
        let result = self.call("browser_close", json!({})).await?;
        if result.is_error {
            warn!(error = %result.text(), "browser_close reported an error");
        }
        Ok(())
    }
}

impl std::fmt::Debug for McpPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpPage")
            .field("connected", &self.client.is_connected())
            .finish()
    }
}

#[async_trait]
impl Page for McpPage {
    #[instrument(skip(self, timeout))]
    async fn goto(&self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()> {
        let result = self.call("browser_navigate", json!({ "url": url })).await?;
        if result.is_error {
            return Err(Error::Navigation(strip_error_header(&result.text())));
        }
        self.wait_for_load_state(wait_until, timeout).await
    }

    async fn perform(&self, locator: &Locator, action: &Act, timeout: Duration) -> Result<()> {
        let function = js::locate_and_act(locator, Some(action), timeout.as_millis() as u64);
        self.run_checked(&function).await.map_err(Error::Action)
    }

    async fn wait_for_locator(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let function = js::locate_and_act(locator, None, timeout.as_millis() as u64);
        self.run_checked(&function).await.map_err(Error::Timeout)
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        let function = js::wait_for_load_state(state, timeout.as_millis() as u64);
        self.run_checked(&function).await.map_err(Error::Timeout)
    }

    async fn evaluate(&self, function: &str) -> Result<serde_json::Value> {
        self.run_function(&js::page_function(function)).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        let result = self
            .call(
                "browser_take_screenshot",
                json!({ "fullPage": full_page, "type": "png" }),
            )
            .await?;
        if result.is_error {
            return Err(Error::Screenshot(strip_error_header(&result.text())));
        }
        let data = result
            .image_data()
            .ok_or_else(|| Error::Screenshot("server returned no image data".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| Error::Screenshot(format!("invalid image data: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        let value = self.run_function(js::LOCATION).await?;
        Ok(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
    }
}

/// Extract the JSON value from a `browser_evaluate` reply.
///
/// The server answers either with bare JSON or with markdown sections
/// (`### Result`, `### Ran Playwright code`, ...).
pub(crate) fn parse_evaluate_text(text: &str) -> serde_json::Value {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return value;
    }
    let section = match trimmed.find("### Result") {
        Some(start) => {
            let body = &trimmed[start + "### Result".len()..];
            body.split("\n###").next().unwrap_or("").trim()
        }
        None => trimmed,
    };
    let unfenced = section
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(unfenced).unwrap_or_else(|_| serde_json::Value::String(unfenced.to_string()))
}

/// Playwright errors raised when a navigation tears down the evaluation context
const CONTEXT_LOST: [&str; 3] = [
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Frame was detached",
];

fn is_context_lost(text: &str) -> bool {
    CONTEXT_LOST.iter().any(|m| text.contains(m))
}

fn strip_error_header(text: &str) -> String {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix("### Error").unwrap_or(trimmed).trim();
    body.split("\n###").next().unwrap_or(body).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_lost_detection() {
        assert!(is_context_lost(
            "### Error\nError: page.evaluate: Execution context was destroyed, most likely because of a navigation"
        ));
        assert!(is_context_lost("Protocol error: Cannot find context with specified id"));
        assert!(!is_context_lost("### Error\nError: navigation menu not found"));
        assert!(!is_context_lost("TypeError: result is not a function"));
    }

    #[test]
    fn test_parse_bare_json() {
        assert_eq!(parse_evaluate_text(r#"{"ok": true}"#), json!({"ok": true}));
        assert_eq!(parse_evaluate_text("\"https://a.b/\""), json!("https://a.b/"));
    }

    #[test]
    fn test_parse_markdown_sections() {
        let text = "### Result\n{\"ok\":false,\"error\":\"boom\"}\n\n### Ran Playwright code\n```js\nawait page.evaluate(...)\n```";
        assert_eq!(parse_evaluate_text(text), json!({"ok": false, "error": "boom"}));
    }

    #[test]
    fn test_parse_fenced_and_plain() {
        assert_eq!(parse_evaluate_text("### Result\n```json\n[1,2]\n```"), json!([1, 2]));
        assert_eq!(parse_evaluate_text("not json"), json!("not json"));
    }

    #[test]
    fn test_strip_error_header() {
        assert_eq!(
            strip_error_header("### Error\nError: net::ERR_NAME_NOT_RESOLVED\n### Page state\n..."),
            "Error: net::ERR_NAME_NOT_RESOLVED"
        );
        assert_eq!(strip_error_header("plain"), "plain");
    }
}
