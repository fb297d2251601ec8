//! Instruction Synthesizer
//!
//! Turns a natural-language step, the latest page state and (on retry) the
//! previous error into action-script text. A failed or empty generation
//! never escapes: a deterministic fallback script is returned instead.

use crate::analyzer::analyze;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use stepwright_browser::PageState;
use stepwright_llm::{CompletionRequest, LlmProvider, Message};
use tracing::{debug, info, instrument, warn};

/// Policy prompt for the text generator
pub const SYSTEM_PROMPT: &str = r##"You are a Playwright code generator. Generate ONLY raw Python Playwright statements operating on an existing `page` object.

Rules:
- Do NOT launch or close a browser (no `browser = p.chromium.launch()`, no `browser.close()`).
- Do NOT create pages or contexts (no `page = browser.new_page()`), the page is already open.
- Do NOT use `with sync_playwright() as p:`, imports, functions, variables or loops.
- One statement per line. Allowed statements:
  page.goto("https://example.com", wait_until="networkidle")
  page.get_by_role("button", name="Sign in").click()
  page.get_by_text("Sign in").click()
  page.get_by_label("Email").fill("user@example.com")
  page.get_by_placeholder("Search").press("Enter")
  page.get_by_test_id("login-button").click()
  page.get_by_alt_text("Logo").click()
  page.get_by_title("Close").click()
  page.locator("button[type='submit']").click()
  page.locator("#terms").check()
  page.locator("select#country").select_option("NO")
  page.get_by_text("Menu").hover()
  page.get_by_role("link", name="Docs").first.click()
  page.get_by_role("dialog").wait_for(state="visible", timeout=10000)
  page.wait_for_load_state("networkidle")
  page.wait_for_timeout(1000)
  page.keyboard.press("Enter")
- Last resort only, when no locator works: page.evaluate("() => document.querySelector('#submit').click()")
- If page state is provided, analyze it to find the correct selectors and elements.
- If there was an error in the previous execution, analyze it and fix the code.

When selecting elements, try multiple strategies in this order of preference:
1. Use role-based selectors: page.get_by_role("button", name="Submit")
2. Use text-based selectors: page.get_by_text("Sign in")
3. Use label-based selectors: page.get_by_label("Email")
4. Use placeholder-based selectors: page.get_by_placeholder("Enter your email")
5. Use test ID selectors if available: page.get_by_test_id("login-button")
6. Use CSS selectors with specific attributes: page.locator("button[type='submit']")
7. Use XPath as a last resort: page.locator("//button[contains(text(), 'Submit')]")

When analyzing error logs:
1. Look for element selectors mentioned in the error (e.g., id, name, class)
2. Check if elements are in iframes and handle accordingly
3. For invisible elements, try waiting for visibility or use different selectors
4. For timeout errors, try more specific selectors or increase timeout
5. Use try/except blocks to attempt multiple selector strategies

If one selector fails, try alternative selectors. For example:
try:
    page.get_by_role("button", name="Sign in").click()
except:
    try:
        page.get_by_text("Sign in").click()
    except:
        page.locator("button.login-button").click()
"##;

const NO_PAGE_STATE: &str = "No page state available";
const NO_PREVIOUS_ERROR: &str = "No previous error";
const FALLBACK_WAIT: &str = "page.wait_for_timeout(1000)";

static URL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>`)\]]+"#).expect("URL_LITERAL is a compile-time constant")
});

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[\w+-]*[ \t]*\r?\n(.*?)```").expect("FENCED_BLOCK is a compile-time constant")
});

/// Generation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Model override; empty selects the provider default
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

/// Inputs of one synthesis call
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Natural-language instruction (enriched on retries)
    pub instruction: &'a str,
    /// Current page state
    pub page: Option<&'a PageState>,
    /// Failure message of the previous attempt
    pub previous_error: Option<&'a str>,
    /// Attempt ordinal, 0 for the first attempt
    pub attempt: u32,
}

impl<'a> SynthesisRequest<'a> {
    /// A first-attempt request with no context
    #[must_use]
    pub fn new(instruction: &'a str) -> Self {
        Self {
            instruction,
            page: None,
            previous_error: None,
            attempt: 0,
        }
    }

    /// Attach page state
    #[must_use]
    pub fn with_page(mut self, page: &'a PageState) -> Self {
        self.page = Some(page);
        self
    }

    /// Attach the previous failure
    #[must_use]
    pub fn with_previous_error(mut self, error: &'a str, attempt: u32) -> Self {
        self.previous_error = Some(error);
        self.attempt = attempt;
        self
    }
}

/// Synthesized action-script text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Script text, fences removed
    pub code: String,
    /// Why the deterministic fallback was used, if it was
    pub fallback_reason: Option<String>,
}

impl Synthesis {
    /// Whether the deterministic fallback produced this script
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Natural language to action script
pub struct Synthesizer {
    provider: Arc<dyn LlmProvider>,
    config: SynthesizerConfig,
}

impl Synthesizer {
    /// Create a synthesizer with default settings
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            config: SynthesizerConfig::default(),
        }
    }

    /// Replace the settings
    #[must_use]
    pub fn with_config(mut self, config: SynthesizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Produce a script. Always returns something runnable.
    #[instrument(skip(self, request), fields(provider = self.provider.name(), attempt = request.attempt))]
    pub async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Synthesis {
        let completion = CompletionRequest::new(self.config.model.clone())
            .with_message(Message::system(SYSTEM_PROMPT))
            .with_message(Message::user(build_user_prompt(request)))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        info!(instruction = %request.instruction, "generating action script");
        match self.provider.complete(completion).await {
            Ok(response) => {
                let code = strip_fences(&response.content);
                if code.is_empty() {
                    warn!("model returned an empty script, using fallback");
                    return fallback(request.instruction, "empty model response");
                }
                debug!(code = %code, model = %response.model, "generated action script");
                Synthesis {
                    code,
                    fallback_reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback");
                fallback(request.instruction, &e.to_string())
            }
        }
    }
}

/// Render the user prompt for one request
pub fn build_user_prompt(request: &SynthesisRequest<'_>) -> String {
    let page = request
        .page
        .map(PageState::summary)
        .unwrap_or_else(|| NO_PAGE_STATE.to_string());
    let analysis = request
        .previous_error
        .map(|e| analyze(e).render())
        .unwrap_or_default();
    let attempt = if request.attempt == 0 {
        "First attempt".to_string()
    } else {
        request.attempt.to_string()
    };

    format!(
        "Current page state:\n{}\n\nPrevious error:\n{}\n\nError analysis:\n{}\n\nRetry attempt: {}\n\nUser request: {}",
        page,
        request.previous_error.unwrap_or(NO_PREVIOUS_ERROR),
        analysis,
        attempt,
        request.instruction
    )
}

/// The deterministic script used when generation fails: navigate to the
/// first URL literal in the instruction, otherwise a short wait
pub fn fallback(instruction: &str, reason: &str) -> Synthesis {
    let code = match URL_LITERAL.find(instruction) {
        Some(m) => {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            format!("page.goto(\"{}\", wait_until=\"load\")", url)
        }
        None => FALLBACK_WAIT.to_string(),
    };
    Synthesis {
        code,
        fallback_reason: Some(reason.to_string()),
    }
}

/// Take the first fenced block if there is one, otherwise drop stray fences
fn strip_fences(reply: &str) -> String {
    if let Some(caps) = FENCED_BLOCK.captures(reply) {
        return caps[1].trim().to_string();
    }
    reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_browser::PageSnapshot;
    use stepwright_llm::{Error as LlmError, MessageRole, MockProvider};

    fn synthesizer(mock: &MockProvider) -> Synthesizer {
        Synthesizer::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_returns_model_code_without_fences() {
        let mock = MockProvider::with_responses([
            "Here you go:\n```python\npage.get_by_role(\"button\", name=\"Sign in\").click()\n```\nDone.",
        ]);
        let synthesis = synthesizer(&mock)
            .synthesize(&SynthesisRequest::new("Click on Sign in"))
            .await;
        assert_eq!(synthesis.code, "page.get_by_role(\"button\", name=\"Sign in\").click()");
        assert!(!synthesis.is_fallback());
    }

    #[tokio::test]
    async fn test_prompt_layout() {
        let mock = MockProvider::with_responses(["page.wait_for_timeout(10)"]);
        let state = PageState::Captured(PageSnapshot {
            url: "https://example.com/".to_string(),
            title: "Example".to_string(),
            ..Default::default()
        });
        let request = SynthesisRequest::new("Click on Sign in")
            .with_page(&state)
            .with_previous_error("element is not visible", 2);
        synthesizer(&mock).synthesize(&request).await;

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("7. Use XPath as a last resort"));
        let user = &messages[1].content;
        assert!(user.starts_with("Current page state:\nCurrent URL: https://example.com/\nTitle: Example"));
        assert!(user.contains("Previous error:\nelement is not visible"));
        assert!(user.contains("Error analysis:\nIssue: Element was found but not visible"));
        assert!(user.contains("Retry attempt: 2"));
        assert!(user.ends_with("User request: Click on Sign in"));
    }

    #[test]
    fn test_policy_examples_parse() {
        let examples: Vec<&str> = SYSTEM_PROMPT
            .lines()
            .map(str::trim)
            .map(|l| l.strip_prefix("- Last resort only, when no locator works: ").unwrap_or(l))
            .filter(|l| l.starts_with("page."))
            .collect();
        assert!(examples.len() >= 18, "{:?}", examples);
        assert!(examples.iter().any(|l| l.starts_with("page.evaluate(")));
        for example in examples {
            let script = stepwright_browser::parse(example).unwrap();
            assert_eq!(script.statements.len(), 1, "{}", example);
        }
        assert!(SYSTEM_PROMPT.trim_end().ends_with(r#"page.locator("button.login-button").click()"#));
    }

    #[test]
    fn test_first_attempt_prompt() {
        let prompt = build_user_prompt(&SynthesisRequest::new("Open the menu"));
        assert!(prompt.contains("Current page state:\nNo page state available"));
        assert!(prompt.contains("Previous error:\nNo previous error"));
        assert!(prompt.contains("Retry attempt: First attempt"));
    }

    #[tokio::test]
    async fn test_fallback_navigates_to_url() {
        let mock = MockProvider::new();
        mock.push_error(LlmError::Timeout(60));
        let synthesis = synthesizer(&mock)
            .synthesize(&SynthesisRequest::new("Navigate to https://example.com"))
            .await;
        assert_eq!(synthesis.code, "page.goto(\"https://example.com\", wait_until=\"load\")");
        assert!(synthesis.is_fallback());

        let script = stepwright_browser::parse(&synthesis.code).unwrap();
        match &script.statements[0] {
            stepwright_browser::Statement::Navigate { url, .. } => {
                assert_eq!(url, "https://example.com")
            }
            other => panic!("expected navigate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_waits_without_url() {
        let mock = MockProvider::new();
        mock.push_error(LlmError::Api("quota".to_string()));
        let synthesis = synthesizer(&mock)
            .synthesize(&SynthesisRequest::new("Click on Sign in"))
            .await;
        assert_eq!(synthesis.code, "page.wait_for_timeout(1000)");
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let mock = MockProvider::with_responses(["```python\n```"]);
        let synthesis = synthesizer(&mock)
            .synthesize(&SynthesisRequest::new("Go to https://example.com/login."))
            .await;
        assert_eq!(
            synthesis.code,
            "page.goto(\"https://example.com/login\", wait_until=\"load\")"
        );
        assert_eq!(synthesis.fallback_reason.as_deref(), Some("empty model response"));
    }

    #[test]
    fn test_strip_stray_fences() {
        assert_eq!(strip_fences("```\npage.goto(\"https://a.b\")"), "page.goto(\"https://a.b\")");
        assert_eq!(strip_fences("  page.keyboard.press(\"Enter\")  "), "page.keyboard.press(\"Enter\")");
    }
}
