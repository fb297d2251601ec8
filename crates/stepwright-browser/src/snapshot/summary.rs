//! Bounded text summaries of page state, used as model prompt context

use super::types::{ElementInfo, FormInfo, InputInfo, NavBlock, PageSnapshot, PageState};
use std::fmt::Write;

const MAX_ELEMENTS: usize = 10;
const MAX_INPUTS: usize = 8;
const MAX_LINKS: usize = 10;
const TEXT_PREVIEW_CHARS: usize = 500;
const ELEMENT_TEXT_CHARS: usize = 80;

impl PageSnapshot {
    /// Render the summary. URL and title are always present; each other
    /// section appears only when it has content.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Current URL: {}", self.url);
        let _ = write!(out, "Title: {}", self.title);

        if !self.interactive_elements.is_empty() {
            let _ = write!(
                out,
                "\n\nInteractive Elements ({} total, {} visible):",
                self.interactive_elements.len(),
                self.visible_count()
            );
            // visible elements first, document order otherwise
            let mut ordered: Vec<&ElementInfo> = self.interactive_elements.iter().collect();
            ordered.sort_by_key(|e| !e.visible);
            for element in ordered.iter().take(MAX_ELEMENTS) {
                let _ = write!(out, "\n- {}", describe_element(element));
            }
            push_remainder(&mut out, "", ordered.len(), MAX_ELEMENTS, "elements");
        }

        if !self.forms.is_empty() {
            let _ = write!(out, "\n\nForms ({}):", self.forms.len());
            for form in &self.forms {
                let _ = write!(out, "\n- {}", describe_form(form));
                for input in form.inputs.iter().take(MAX_INPUTS) {
                    let _ = write!(out, "\n  - {}", describe_input(input));
                }
                push_remainder(&mut out, "  ", form.inputs.len(), MAX_INPUTS, "inputs");
            }
        }

        if !self.navigation.is_empty() {
            out.push_str("\n\nNavigation:");
            for block in &self.navigation {
                let _ = write!(out, "\n- {}", describe_block(block));
                for link in block.links.iter().take(MAX_LINKS) {
                    let _ = write!(
                        out,
                        "\n  - \"{}\" -> {}",
                        link.text,
                        link.href.as_deref().unwrap_or("(no href)")
                    );
                }
                push_remainder(&mut out, "  ", block.links.len(), MAX_LINKS, "links");
            }
        }

        if self.iframe_count > 0 {
            let _ = write!(
                out,
                "\n\nIframes: {} (elements inside need a frame locator)",
                self.iframe_count
            );
        }

        let text = self.visible_text.trim();
        if !text.is_empty() {
            let _ = write!(
                out,
                "\n\nVisible Text Preview:\n{}",
                truncate_chars(text, TEXT_PREVIEW_CHARS)
            );
        }

        out
    }
}

impl PageState {
    /// Render the summary; a degraded state reports the error and URL
    pub fn summary(&self) -> String {
        match self {
            Self::Captured(snapshot) => snapshot.summary(),
            Self::Degraded { error, url } => format!(
                "Current URL: {}\nPage state unavailable: {}",
                url.as_deref().unwrap_or("unknown"),
                error
            ),
        }
    }
}

fn describe_element(element: &ElementInfo) -> String {
    let mut desc = format!("<{}", element.tag);
    push_attr(&mut desc, "id", element.id.as_deref());
    push_attr(&mut desc, "name", element.name.as_deref());
    push_attr(&mut desc, "type", element.element_type.as_deref());
    for key in ["role", "aria-label", "placeholder", "data-testid", "title", "alt"] {
        push_attr(&mut desc, key, element.attribute(key));
    }
    if !element.class_list.is_empty() {
        let _ = write!(desc, " class=\"{}\"", element.class_list.join(" "));
    }
    if element.tag == "a" {
        push_attr(&mut desc, "href", element.attribute("href"));
    }
    desc.push('>');

    let text = element.text.trim();
    if !text.is_empty() {
        let _ = write!(desc, " \"{}\"", truncate_chars(text, ELEMENT_TEXT_CHARS));
    }
    if !element.visible {
        desc.push_str(" [hidden]");
    }
    desc
}

fn describe_form(form: &FormInfo) -> String {
    let mut desc = String::from("form");
    if let Some(id) = form.id.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(desc, "#{}", id);
    }
    if let Some(action) = form.action.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(desc, " action={}", action);
    }
    let method = if form.method.is_empty() { "get" } else { &form.method };
    let _ = write!(desc, " method={} ({} inputs)", method, form.inputs.len());
    desc
}

fn describe_input(input: &InputInfo) -> String {
    let mut desc = format!("{} type={}", input.tag, input.input_type);
    push_attr(&mut desc, "name", input.name.as_deref());
    push_attr(&mut desc, "id", input.id.as_deref());
    push_attr(&mut desc, "placeholder", input.placeholder.as_deref());
    if let Some(value) = input.value.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(desc, " value=\"{}\"", truncate_chars(value, ELEMENT_TEXT_CHARS));
    }
    if input.required {
        desc.push_str(" (required)");
    }
    desc
}

fn describe_block(block: &NavBlock) -> String {
    let mut desc = block.kind.clone();
    if let Some(id) = block.id.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(desc, "#{}", id);
    }
    if let Some(class) = block.class.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(desc, " class=\"{}\"", class);
    }
    let _ = write!(desc, " ({} links)", block.links.len());
    desc
}

fn push_attr(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        let _ = write!(out, " {}=\"{}\"", key, value);
    }
}

fn push_remainder(out: &mut String, indent: &str, total: usize, shown: usize, what: &str) {
    if total > shown {
        let _ = write!(out, "\n{}- ... and {} more {}", indent, total - shown, what);
    }
}

/// Keep at most `max` characters, marking a cut with `...`
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::{LinkInfo, Rect};

    fn element(tag: &str, text: &str, visible: bool) -> ElementInfo {
        ElementInfo {
            tag: tag.to_string(),
            text: text.to_string(),
            visible,
            rect: Rect {
                width: if visible { 10.0 } else { 0.0 },
                height: 10.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_snapshot_has_url_and_title() {
        let snapshot = PageSnapshot {
            url: "https://example.com/".to_string(),
            title: "Example Domain".to_string(),
            ..Default::default()
        };
        assert_eq!(
            snapshot.summary(),
            "Current URL: https://example.com/\nTitle: Example Domain"
        );
    }

    #[test]
    fn test_elements_capped_with_remainder() {
        let snapshot = PageSnapshot {
            interactive_elements: (0..14).map(|i| element("button", &format!("b{}", i), true)).collect(),
            ..Default::default()
        };
        let summary = snapshot.summary();
        assert!(summary.contains("Interactive Elements (14 total, 14 visible):"));
        assert!(summary.contains("\"b9\""));
        assert!(!summary.contains("\"b10\""));
        assert!(summary.contains("- ... and 4 more elements"));
    }

    #[test]
    fn test_visible_elements_listed_first() {
        let mut hidden = element("a", "Hidden link", false);
        hidden.id = Some("h".to_string());
        let mut shown = element("button", "Sign in", true);
        shown.id = Some("signin".to_string());
        shown.class_list = vec!["btn".to_string(), "primary".to_string()];
        let snapshot = PageSnapshot {
            interactive_elements: vec![hidden, shown],
            ..Default::default()
        };
        let summary = snapshot.summary();
        let shown_at = summary.find("<button id=\"signin\" class=\"btn primary\"> \"Sign in\"").unwrap();
        let hidden_at = summary.find("<a id=\"h\"> \"Hidden link\" [hidden]").unwrap();
        assert!(shown_at < hidden_at);
    }

    #[test]
    fn test_forms_and_navigation() {
        let snapshot = PageSnapshot {
            forms: vec![FormInfo {
                id: Some("login".to_string()),
                action: Some("/session".to_string()),
                method: "post".to_string(),
                inputs: (0..10)
                    .map(|i| InputInfo {
                        tag: "input".to_string(),
                        input_type: "text".to_string(),
                        name: Some(format!("f{}", i)),
                        required: i == 0,
                        ..Default::default()
                    })
                    .collect(),
            }],
            navigation: vec![NavBlock {
                kind: "nav".to_string(),
                id: Some("main".to_string()),
                class: None,
                links: (0..12)
                    .map(|i| LinkInfo {
                        text: format!("L{}", i),
                        href: Some(format!("/p{}", i)),
                        ..Default::default()
                    })
                    .collect(),
            }],
            iframe_count: 1,
            ..Default::default()
        };
        let summary = snapshot.summary();
        assert!(summary.contains("- form#login action=/session method=post (10 inputs)"));
        assert!(summary.contains("  - input type=text name=\"f0\" (required)"));
        assert!(summary.contains("  - ... and 2 more inputs"));
        assert!(summary.contains("- nav#main (12 links)"));
        assert!(summary.contains("  - \"L0\" -> /p0"));
        assert!(summary.contains("  - ... and 2 more links"));
        assert!(summary.contains("Iframes: 1"));
    }

    #[test]
    fn test_text_preview_truncated() {
        let snapshot = PageSnapshot {
            visible_text: "é".repeat(600),
            ..Default::default()
        };
        let summary = snapshot.summary();
        let preview = summary.split("Visible Text Preview:\n").nth(1).unwrap();
        assert_eq!(preview.chars().count(), 503);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_short_text_not_marked() {
        let snapshot = PageSnapshot {
            visible_text: "Hello".to_string(),
            ..Default::default()
        };
        assert!(snapshot.summary().ends_with("Visible Text Preview:\nHello"));
    }

    #[test]
    fn test_degraded_summary() {
        let state = PageState::Degraded {
            error: "evaluation failed: boom".to_string(),
            url: None,
        };
        assert_eq!(
            state.summary(),
            "Current URL: unknown\nPage state unavailable: evaluation failed: boom"
        );
    }
}
