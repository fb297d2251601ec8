//! Snapshot data types
//!
//! Field names follow the JSON produced by the extraction page function.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point-in-time read of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSnapshot {
    /// Page URL
    pub url: String,
    /// Document title
    pub title: String,
    /// Document markup, capped in the page
    pub html: String,
    /// Whitespace-collapsed `innerText` of the body
    pub visible_text: String,
    /// Buttons, links, form controls and elements with an interactive role
    pub interactive_elements: Vec<ElementInfo>,
    /// Forms with their controls
    pub forms: Vec<FormInfo>,
    /// `nav` and `header` blocks
    pub navigation: Vec<NavBlock>,
    /// Number of `iframe` elements
    pub iframe_count: usize,
}

impl PageSnapshot {
    /// Number of interactive elements that are rendered and not hidden
    pub fn visible_count(&self) -> usize {
        self.interactive_elements.iter().filter(|e| e.visible).count()
    }
}

/// An interactive element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,
    /// `id` attribute
    pub id: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// Class list
    pub class_list: Vec<String>,
    /// `type` attribute
    #[serde(rename = "type")]
    pub element_type: Option<String>,
    /// Current value of form controls (never for password fields)
    pub value: Option<String>,
    /// Rendered text
    pub text: String,
    /// Positive area and not hidden by display, visibility or opacity
    pub visible: bool,
    /// Bounding box in CSS pixels
    pub rect: Rect,
    /// All attributes
    pub attributes: BTreeMap<String, String>,
}

impl ElementInfo {
    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Bounding geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// A `form` element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormInfo {
    /// `id` attribute
    pub id: Option<String>,
    /// `action` attribute
    pub action: Option<String>,
    /// Lowercase method, `get` when absent
    pub method: String,
    /// `input`, `select` and `textarea` descendants in document order
    pub inputs: Vec<InputInfo>,
}

/// A form control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputInfo {
    /// Lowercase tag name
    pub tag: String,
    /// Input type, or the tag name for `select`/`textarea`
    #[serde(rename = "type")]
    pub input_type: String,
    /// `name` attribute
    pub name: Option<String>,
    /// `id` attribute
    pub id: Option<String>,
    /// `placeholder` attribute
    pub placeholder: Option<String>,
    /// `required` flag
    pub required: bool,
    /// Current value (never for password fields)
    pub value: Option<String>,
}

/// A `nav` or `header` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavBlock {
    /// `nav` or `header`
    #[serde(rename = "type")]
    pub kind: String,
    /// `id` attribute
    pub id: Option<String>,
    /// `class` attribute
    pub class: Option<String>,
    /// Contained links in document order
    pub links: Vec<LinkInfo>,
}

/// A link inside a navigation block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkInfo {
    /// Link text
    pub text: String,
    /// `href` attribute
    pub href: Option<String>,
    /// `id` attribute
    pub id: Option<String>,
    /// `class` attribute
    pub class: Option<String>,
}

/// The outcome of one extraction
#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    /// Extraction succeeded
    Captured(PageSnapshot),
    /// Extraction failed; only the error and a best-effort URL are known
    Degraded {
        /// Why extraction failed
        error: String,
        /// The page URL, when it could still be read
        url: Option<String>,
    },
}

impl PageState {
    /// The page URL, if known
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Captured(snapshot) => Some(&snapshot.url),
            Self::Degraded { url, .. } => url.as_deref(),
        }
    }

    /// Whether extraction failed
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The snapshot, when captured
    pub fn snapshot(&self) -> Option<&PageSnapshot> {
        match self {
            Self::Captured(snapshot) => Some(snapshot),
            Self::Degraded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_page_function_output() {
        let value = json!({
            "url": "https://example.com/login",
            "title": "Login",
            "html": "<html></html>",
            "visibleText": "Welcome back",
            "interactiveElements": [{
                "tag": "button",
                "id": "submit",
                "name": null,
                "classList": ["btn", "primary"],
                "type": "submit",
                "value": null,
                "text": "Sign in",
                "visible": true,
                "rect": {"x": 10.0, "y": 20.0, "width": 80.0, "height": 30.0},
                "attributes": {"id": "submit", "class": "btn primary"}
            }],
            "forms": [{
                "id": "login",
                "action": "/session",
                "method": "post",
                "inputs": [{"tag": "input", "type": "email", "name": "email", "id": null,
                            "placeholder": "Email", "required": true, "value": ""}]
            }],
            "navigation": [{"type": "nav", "id": null, "class": "top",
                            "links": [{"text": "Home", "href": "/", "id": null, "class": null}]}],
            "iframeCount": 2
        });

        let snapshot: PageSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(snapshot.title, "Login");
        assert_eq!(snapshot.interactive_elements[0].element_type.as_deref(), Some("submit"));
        assert_eq!(snapshot.interactive_elements[0].attribute("class"), Some("btn primary"));
        assert_eq!(snapshot.forms[0].inputs[0].input_type, "email");
        assert!(snapshot.forms[0].inputs[0].required);
        assert_eq!(snapshot.navigation[0].kind, "nav");
        assert_eq!(snapshot.iframe_count, 2);
        assert_eq!(snapshot.visible_count(), 1);
    }

    #[test]
    fn test_missing_fields_default() {
        let snapshot: PageSnapshot = serde_json::from_value(json!({"url": "about:blank"})).unwrap();
        assert_eq!(snapshot.url, "about:blank");
        assert!(snapshot.forms.is_empty());
        assert_eq!(snapshot.iframe_count, 0);
    }

    #[test]
    fn test_page_state_accessors() {
        let degraded = PageState::Degraded {
            error: "boom".to_string(),
            url: Some("https://a.b/".to_string()),
        };
        assert!(degraded.is_degraded());
        assert_eq!(degraded.url(), Some("https://a.b/"));
        assert!(degraded.snapshot().is_none());

        let captured = PageState::Captured(PageSnapshot {
            url: "https://c.d/".to_string(),
            ..Default::default()
        });
        assert!(!captured.is_degraded());
        assert_eq!(captured.url(), Some("https://c.d/"));
    }
}
