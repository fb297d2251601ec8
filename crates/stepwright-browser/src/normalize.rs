//! Code normalizer
//!
//! Rewrites synthesized action code into the canonical dialect accepted by
//! [`crate::script::parse`]. Pure text transform, line by line:
//!
//! 1. expand leading tabs, map camelCase accessors to snake_case,
//!    `.type(` to `.fill(`, drop `async`/`await`, drop trailing `;`
//! 2. drop fences, imports, driver-session scaffolding and
//!    browser/context/page lifecycle lines
//! 3. dedent, collapse blank-line runs, trim
//!
//! Normalizing normalized code returns it unchanged.

use regex::Regex;
use std::sync::LazyLock;

/// Alternate spellings and their canonical forms. No output contains an input.
const ALIASES: &[(&str, &str)] = &[
    ("getByRole(", "get_by_role("),
    ("getByText(", "get_by_text("),
    ("getByLabel(", "get_by_label("),
    ("getByPlaceholder(", "get_by_placeholder("),
    ("getByTestId(", "get_by_test_id("),
    ("getByAltText(", "get_by_alt_text("),
    ("getByTitle(", "get_by_title("),
    ("waitForLoadState(", "wait_for_load_state("),
    ("waitForTimeout(", "wait_for_timeout("),
    ("waitForSelector(", "wait_for_selector("),
    ("waitFor(", "wait_for("),
    ("selectOption(", "select_option("),
    ("toBeVisible(", "to_be_visible("),
    ("insertText(", "insert_text("),
    ("waitUntil", "wait_until"),
    (".type(", ".fill("),
];

static AWAIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bawait\s+").expect("AWAIT is a compile-time constant"));

static ASYNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\basync\s+").expect("ASYNC is a compile-time constant"));

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:import\s|from\s+\S+\s+import\s|(?:const|let|var)\s+.*=\s*require\(|require\()")
        .expect("IMPORT is a compile-time constant")
});

static SCAFFOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"def\s+\w+\s*\(.*\)\s*(?:->.*)?:",
        r"|with\s+(?:sync|async)_playwright\(\).*:",
        r"|asyncio\.run\(.*\)",
        r"|(?:run|main)\(.*\)",
        r"|if\s+__name__\s*==.*:",
        r"|\(\s*(?:async\s*)?\(\s*\)\s*=>\s*\{",
        r"|function\s+\w+\s*\(.*\)\s*\{",
        r"|(?:test|it)\(.*=>\s*\{",
        r"|\}\s*\)?\s*(?:\(\s*\))?",
        r"|(?:module\.)?exports\b.*",
        r")$"
    ))
    .expect("SCAFFOLD is a compile-time constant")
});

static LIFECYCLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(?:const|let|var)\s+)?(?:browser|context|page|p|playwright)\s*=[^=]",
        r"|\.launch(?:_persistent_context|PersistentContext)?\s*\(",
        r"|\bnew_(?:page|context)\s*\(",
        r"|\bnew(?:Page|Context)\s*\(",
        r"|^(?:browser|context|page|playwright|p)\.(?:close|stop)\s*\(",
        r"|^page\.(?:set_default_timeout|set_default_navigation_timeout|set_viewport_size)\s*\(",
        r"|\b(?:sync|async)_playwright\b",
    ))
    .expect("LIFECYCLE is a compile-time constant")
});

/// Canonicalize synthesized action code
pub fn normalize(code: &str) -> String {
    let kept: Vec<String> = code
        .lines()
        .map(rewrite_line)
        .filter(|line| keep(line.trim()))
        .collect();

    let indent = kept
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = Vec::with_capacity(kept.len());
    for line in &kept {
        let line = if line.trim().is_empty() {
            ""
        } else {
            &line[indent..]
        };
        if line.is_empty() && out.last().is_none_or(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

fn rewrite_line(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let lead = &line[..line.len() - body.len()];
    let mut text = lead.replace('\t', "    ");
    text.push_str(body);

    for (from, to) in ALIASES {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }
    let text = AWAIT.replace_all(&text, "");
    let text = ASYNC.replace_all(&text, "");
    text.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

fn keep(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return true;
    }
    !(trimmed.starts_with("```")
        || IMPORT.is_match(trimmed)
        || SCAFFOLD.is_match(trimmed)
        || LIFECYCLE.is_match(trimmed))
}
