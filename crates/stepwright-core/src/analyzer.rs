//! Error Analyzer
//!
//! Classifies a raw failure message into known categories and extracts
//! structural hints about the element involved. The result is advisory text
//! for the next synthesis call; it never drives control flow.

use regex::Regex;
use std::sync::LazyLock;

static HINT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id="([^"]*)""#).expect("HINT_ID is a compile-time constant"));
static HINT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="([^"]*)""#).expect("HINT_NAME is a compile-time constant")
});
static HINT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="([^"]*)""#).expect("HINT_CLASS is a compile-time constant")
});
static HINT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"type="([^"]*)""#).expect("HINT_TYPE is a compile-time constant")
});
static HINT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z][\w-]*)[\s>/]").expect("HINT_TAG is a compile-time constant")
});

static WAITING_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)waiting for (get_by_\w+|locator)\(([^)]*)\)")
        .expect("WAITING_FOR is a compile-time constant")
});
static RESOLVED_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)locator resolved to (<[^>]*>)")
        .expect("RESOLVED_TO is a compile-time constant")
});

const NO_PATTERNS: &str = "No specific patterns found in error log";

/// One recognized problem and what to try next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// What went wrong
    pub issue: String,
    /// What to try next
    pub suggestion: String,
}

impl Finding {
    fn new(issue: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Attributes of the element named in a failure message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementHint {
    /// `id` attribute
    pub id: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// `class` attribute
    pub class: Option<String>,
    /// `type` attribute
    pub element_type: Option<String>,
    /// Leading tag token
    pub tag: Option<String>,
}

impl ElementHint {
    /// Whether no field was found
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.class.is_none()
            && self.element_type.is_none()
            && self.tag.is_none()
    }

    fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("id", &self.id),
            ("name", &self.name),
            ("class", &self.class),
            ("type", &self.element_type),
            ("tag", &self.tag),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    }
}

/// Advisory analysis of one failure message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorAnalysis {
    /// Recognized problems, in check order
    pub findings: Vec<Finding>,
    /// Element attributes found in the message
    pub hint: Option<ElementHint>,
}

impl ErrorAnalysis {
    /// Whether nothing was recognized
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.hint.is_none()
    }

    /// Render the text block fed to the synthesizer
    pub fn render(&self) -> String {
        if self.is_empty() {
            return NO_PATTERNS.to_string();
        }
        let mut lines = Vec::with_capacity(self.findings.len() * 2 + 1);
        if let Some(hint) = &self.hint {
            let fields: Vec<String> = hint
                .fields()
                .map(|(key, value)| format!("{}=\"{}\"", key, value))
                .collect();
            lines.push(format!("Element information found: {}", fields.join(", ")));
        }
        for finding in &self.findings {
            lines.push(format!(
                "Issue: {}\nSuggestion: {}",
                finding.issue, finding.suggestion
            ));
        }
        lines.join("\n")
    }
}

/// Analyze a raw failure message. Every check runs; several may fire.
pub fn analyze(error: &str) -> ErrorAnalysis {
    let lower = error.to_lowercase();
    let mut findings = Vec::new();

    if lower.contains("invalid action script") {
        findings.push(Finding::new(
            "Generated code used a statement outside the allowed vocabulary",
            "Use only page.goto, page.get_by_* / page.locator actions, waits and try/except",
        ));
    }
    if lower.contains("not visible") {
        findings.push(Finding::new(
            "Element was found but not visible",
            "Try waiting for visibility or use a different visible element",
        ));
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        findings.push(Finding::new(
            "Timeout occurred while waiting for element",
            "Try more specific selectors or increase timeout",
        ));
    }
    if ["no element found", "element not found", "no such element"]
        .iter()
        .any(|phrase| lower.contains(phrase))
    {
        findings.push(Finding::new(
            "Element not found with current selector",
            "Try alternative selector strategies",
        ));
    }
    if lower.contains("strict mode violation") {
        findings.push(Finding::new(
            "Selector matched more than one element",
            "Make the selector more specific (exact=True, a narrower role or name) or pick one with .first or .nth(i)",
        ));
    }
    if lower.contains("iframe") {
        findings.push(Finding::new(
            "Element might be inside an iframe",
            "Switch to the appropriate iframe before interacting with the element",
        ));
    }
    if let Some(caps) = WAITING_FOR.captures(error) {
        let method = &caps[1];
        findings.push(Finding::new(
            format!("Selector used: {}({})", method, &caps[2]),
            format!("Try alternative to {}", method),
        ));
    }
    if let Some(caps) = RESOLVED_TO.captures(error) {
        findings.push(Finding::new(
            format!("Element found: {}", &caps[1]),
            "Extract attributes from this element for more precise targeting",
        ));
    }

    let hint = extract_hint(error);
    ErrorAnalysis {
        findings,
        hint: (!hint.is_empty()).then_some(hint),
    }
}

fn extract_hint(error: &str) -> ElementHint {
    let capture = |re: &Regex| re.captures(error).map(|c| c[1].to_string());
    ElementHint {
        id: capture(&HINT_ID),
        name: capture(&HINT_NAME),
        class: capture(&HINT_CLASS),
        element_type: capture(&HINT_TYPE),
        tag: capture(&HINT_TAG),
    }
}
