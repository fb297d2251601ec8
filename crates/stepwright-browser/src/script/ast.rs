use crate::page::LoadState;
use std::fmt;
use std::time::Duration;

/// A parsed, validated action script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionScript {
    /// Statements, executed in order
    pub statements: Vec<Statement>,
}

impl ActionScript {
    /// Whether the script does nothing
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Total statements including those nested in fallbacks
    pub fn statement_count(&self) -> usize {
        fn count(stmts: &[Statement]) -> usize {
            stmts
                .iter()
                .map(|s| match s {
                    Statement::Fallback(alts) => 1 + alts.iter().map(|a| count(a)).sum::<usize>(),
                    _ => 1,
                })
                .sum()
        }
        count(&self.statements)
    }
}

/// One statement against the implicit page
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `page.goto(url, wait_until=...)`
    Navigate {
        /// Target URL
        url: String,
        /// Load state to wait for after navigating
        wait_until: Option<LoadState>,
    },
    /// Locate an element and act on it
    Act {
        /// Element locator
        locator: Locator,
        /// Action to perform
        action: Act,
        /// Per-statement timeout override
        timeout: Option<Duration>,
    },
    /// Block until a condition holds
    WaitFor(WaitCondition),
    /// Run a page function. Unsandboxed: the script runs with full page privileges.
    Evaluate {
        /// Function or expression source
        script: String,
    },
    /// `try`/`except` chain: alternatives tried in order until one succeeds
    Fallback(Vec<Vec<Statement>>),
}

/// How an element is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    /// ARIA role (+ accessible name)
    Role,
    /// Visible text
    Text,
    /// Associated label text
    Label,
    /// Placeholder attribute
    Placeholder,
    /// `data-testid` attribute
    TestId,
    /// `alt` attribute
    AltText,
    /// `title` attribute
    Title,
    /// CSS selector
    Css,
}

impl LocatorKind {
    /// Method name in the canonical dialect
    pub fn method(&self) -> &'static str {
        match self {
            Self::Role => "get_by_role",
            Self::Text => "get_by_text",
            Self::Label => "get_by_label",
            Self::Placeholder => "get_by_placeholder",
            Self::TestId => "get_by_test_id",
            Self::AltText => "get_by_alt_text",
            Self::Title => "get_by_title",
            Self::Css => "locator",
        }
    }

    /// Inverse of [`LocatorKind::method`]
    pub fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "get_by_role" => Self::Role,
            "get_by_text" => Self::Text,
            "get_by_label" => Self::Label,
            "get_by_placeholder" => Self::Placeholder,
            "get_by_test_id" => Self::TestId,
            "get_by_alt_text" => Self::AltText,
            "get_by_title" => Self::Title,
            "locator" => Self::Css,
            _ => return None,
        })
    }

    /// Identifier used by the in-page resolver
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Text => "text",
            Self::Label => "label",
            Self::Placeholder => "placeholder",
            Self::TestId => "testid",
            Self::AltText => "alt",
            Self::Title => "title",
            Self::Css => "css",
        }
    }
}

/// Which match to pick when several elements resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorIndex {
    /// `.first`
    First,
    /// `.last`
    Last,
    /// `.nth(i)`; negative counts from the end
    Nth(i64),
}

/// Element locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Strategy
    pub kind: LocatorKind,
    /// Role name, text, label, CSS selector, ...
    pub value: String,
    /// Accessible name filter (role locators)
    pub name: Option<String>,
    /// Exact (whole-string, case-sensitive) matching
    pub exact: bool,
    /// Disambiguation; `None` means exactly one match is required
    pub index: Option<LocatorIndex>,
}

impl Locator {
    /// New locator with default options
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            name: None,
            exact: false,
            index: None,
        }
    }

    /// CSS selector locator
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, selector)
    }

    /// Role locator with an accessible name
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        let mut locator = Self::new(LocatorKind::Role, role);
        locator.name = Some(name.into());
        locator
    }

    /// The element that currently has keyboard focus
    pub fn focused() -> Self {
        let mut locator = Self::css(":focus");
        locator.index = Some(LocatorIndex::First);
        locator
    }

    /// Builder: set index
    pub fn with_index(mut self, index: LocatorIndex) -> Self {
        self.index = Some(index);
        self
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Renders in the canonical dialect, e.g. `get_by_role("button", name="Sign in")`
impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind.method(), quote(&self.value))?;
        if let Some(name) = &self.name {
            write!(f, ", name={}", quote(name))?;
        }
        if self.exact {
            f.write_str(", exact=True")?;
        }
        f.write_str(")")?;
        match self.index {
            Some(LocatorIndex::First) => f.write_str(".first"),
            Some(LocatorIndex::Last) => f.write_str(".last"),
            Some(LocatorIndex::Nth(i)) => write!(f, ".nth({})", i),
            None => Ok(()),
        }
    }
}

/// Element action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Act {
    /// `.click()`
    Click,
    /// `.dblclick()`
    DoubleClick,
    /// `.fill(value)`
    Fill(String),
    /// `.check()`
    Check,
    /// `.uncheck()`
    Uncheck,
    /// `.hover()`
    Hover,
    /// `.press(key)`
    Press(String),
    /// `.select_option(values)`
    SelectOption(Vec<String>),
}

impl Act {
    /// Method name in the canonical dialect
    pub fn method(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "dblclick",
            Self::Fill(_) => "fill",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Hover => "hover",
            Self::Press(_) => "press",
            Self::SelectOption(_) => "select_option",
        }
    }
}

/// What a `WaitFor` statement blocks on
#[derive(Debug, Clone, PartialEq)]
pub enum WaitCondition {
    /// `page.wait_for_load_state(state)`
    LoadState {
        /// Target state
        state: LoadState,
        /// Timeout override
        timeout: Option<Duration>,
    },
    /// `page.wait_for_timeout(ms)`
    Timeout(Duration),
    /// `locator.wait_for()` / `page.wait_for_selector(css)`
    Locator {
        /// Element locator
        locator: Locator,
        /// Timeout override
        timeout: Option<Duration>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        let locator = Locator::role("button", "Sign in");
        assert_eq!(locator.to_string(), r#"get_by_role("button", name="Sign in")"#);

        let mut text = Locator::new(LocatorKind::Text, "Next").with_index(LocatorIndex::Nth(2));
        text.exact = true;
        assert_eq!(text.to_string(), r#"get_by_text("Next", exact=True).nth(2)"#);

        let css = Locator::css(r#"input[name="q"]"#).with_index(LocatorIndex::First);
        assert_eq!(css.to_string(), r#"locator("input[name=\"q\"]").first"#);
    }

    #[test]
    fn test_kind_method_roundtrip() {
        for kind in [
            LocatorKind::Role,
            LocatorKind::Text,
            LocatorKind::Label,
            LocatorKind::Placeholder,
            LocatorKind::TestId,
            LocatorKind::AltText,
            LocatorKind::Title,
            LocatorKind::Css,
        ] {
            assert_eq!(LocatorKind::from_method(kind.method()), Some(kind));
        }
    }

    #[test]
    fn test_statement_count_includes_fallbacks() {
        let script = ActionScript {
            statements: vec![
                Statement::Evaluate {
                    script: "() => 1".into(),
                },
                Statement::Fallback(vec![
                    vec![Statement::WaitFor(WaitCondition::Timeout(Duration::from_millis(5)))],
                    vec![],
                ]),
            ],
        };
        assert_eq!(script.statement_count(), 3);
    }
}
