//! Parser for the canonical action dialect
//!
//! One Playwright-style call per line against an implicit `page`:
//!
//! ```text
//! page.goto("https://example.com", wait_until="networkidle")
//! try:
//!     page.get_by_role("button", name="Sign in").click()
//! except:
//!     page.get_by_text("Sign in").first.click(timeout=5000)
//! ```
//!
//! Options may be keyword arguments or a trailing `{ key: value }` object.
//! Anything outside the vocabulary is rejected with a line-numbered error.

use super::ast::{Act, ActionScript, Locator, LocatorIndex, LocatorKind, Statement, WaitCondition};
use crate::page::LoadState;
use std::time::Duration;
use thiserror::Error;

/// Script parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based source line
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Parse action-script text into an [`ActionScript`]
pub fn parse(source: &str) -> Result<ActionScript, ParseError> {
    let lines: Vec<Line<'_>> = source
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| Line::new(idx + 1, raw))
        .collect();

    let base = lines.first().map_or(0, |l| l.indent);
    let mut parser = BlockParser { lines, pos: 0 };
    let statements = parser.parse_block(base)?;
    if let Some(line) = parser.lines.get(parser.pos) {
        return Err(ParseError::new(line.no, "unexpected dedent"));
    }
    Ok(ActionScript { statements })
}

// ============================================================================
// Block structure
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    no: usize,
    indent: usize,
    text: &'a str,
}

impl<'a> Line<'a> {
    fn new(no: usize, raw: &'a str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') || text.starts_with("//") {
            return None;
        }
        let indent = raw
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum();
        Some(Self { no, indent, text })
    }
}

struct BlockParser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl BlockParser<'_> {
    fn parse_block(&mut self, indent: usize) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ParseError::new(line.no, "unexpected indentation"));
            }
            if let Some(rest) = header_body(line.text, "try") {
                statements.push(self.parse_try(line, rest)?);
            } else if is_except(line.text) {
                return Err(ParseError::new(line.no, "'except' without 'try'"));
            } else {
                self.pos += 1;
                statements.extend(parse_line(line.text).map_err(|m| ParseError::new(line.no, m))?);
            }
        }
        Ok(statements)
    }

    /// Parse the block introduced by a `header:` line (inline or indented)
    fn parse_body(&mut self, header: Line<'_>, inline: &str) -> Result<Vec<Statement>, ParseError> {
        if !inline.is_empty() {
            return parse_line(inline)
                .map(|s| s.into_iter().collect())
                .map_err(|m| ParseError::new(header.no, m));
        }
        match self.lines.get(self.pos) {
            Some(next) if next.indent > header.indent => {
                let indent = next.indent;
                self.parse_block(indent)
            }
            _ => Err(ParseError::new(header.no, "expected an indented block")),
        }
    }

    fn parse_try(&mut self, header: Line<'_>, inline: &str) -> Result<Statement, ParseError> {
        self.pos += 1;
        let mut alternatives = vec![self.parse_body(header, inline)?];

        while let Some(line) = self.lines.get(self.pos).copied() {
            if line.indent != header.indent || !is_except(line.text) {
                break;
            }
            self.pos += 1;
            let rest = line.text.split_once(':').map(|(_, r)| r.trim()).unwrap_or("");
            let mut handler = self.parse_body(line, rest)?;
            // except: try: ... nests another fallback; flatten it into this chain
            if handler.len() == 1 && matches!(handler[0], Statement::Fallback(_)) {
                if let Some(Statement::Fallback(alts)) = handler.pop() {
                    alternatives.extend(alts);
                }
            } else {
                alternatives.push(handler);
            }
        }

        if alternatives.len() == 1 {
            return Err(ParseError::new(header.no, "'try' without 'except'"));
        }
        if let Some(line) = self.lines.get(self.pos) {
            if line.indent == header.indent
                && (header_body(line.text, "finally").is_some() || header_body(line.text, "else").is_some())
            {
                return Err(ParseError::new(line.no, "'finally'/'else' blocks are not supported"));
            }
        }
        Ok(Statement::Fallback(alternatives))
    }
}

/// `try:` / `try: stmt` -> Some(inline body)
fn header_body<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?.trim_start();
    rest.strip_prefix(':').map(str::trim)
}

fn is_except(text: &str) -> bool {
    text == "except:"
        || text.starts_with("except:")
        || (text.starts_with("except ") && text.contains(':'))
}

// ============================================================================
// Single statements
// ============================================================================

fn parse_line(text: &str) -> Result<Option<Statement>, String> {
    let tokens = lex(text)?;
    let mut cur = Cursor { tokens, pos: 0 };
    let statement = cur.statement()?;
    if let Some(tok) = cur.peek() {
        return Err(format!("unexpected {} after statement", tok.describe()));
    }
    Ok(statement)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Eq,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("`{}`", s),
            Tok::Str(s) => format!("string \"{}\"", s),
            Tok::Num(n) => format!("number {}", n),
            Tok::LParen => "`(`".into(),
            Tok::RParen => "`)`".into(),
            Tok::LBrace => "`{`".into(),
            Tok::RBrace => "`}`".into(),
            Tok::LBracket => "`[`".into(),
            Tok::RBracket => "`]`".into(),
            Tok::Comma => "`,`".into(),
            Tok::Colon => "`:`".into(),
            Tok::Dot => "`.`".into(),
            Tok::Eq => "`=`".into(),
        }
    }
}

fn lex(text: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '#' => break,
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '(' | ')' | '{' | '}' | '[' | ']' | ',' | ':' | '.' | '=' => {
                tokens.push(match c {
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    ',' => Tok::Comma,
                    ':' => Tok::Colon,
                    '.' => Tok::Dot,
                    _ => Tok::Eq,
                });
                i += 1;
            }
            '"' | '\'' | '`' => {
                let (s, next) = lex_string(&chars, i)?;
                tokens.push(Tok::Str(s));
                i = next;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Tok::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                // r"..." / f"..." string prefixes
                if ident.len() == 1
                    && matches!(ident.as_str(), "r" | "f" | "b")
                    && matches!(chars.get(i), Some('"') | Some('\''))
                {
                    let (s, next) = lex_string(&chars, i)?;
                    tokens.push(Tok::Str(s));
                    i = next;
                } else {
                    tokens.push(Tok::Ident(ident));
                }
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };
    let mut out = String::new();

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(&e) if e == '\\' || e == '"' || e == '\'' || e == '`' => out.push(e),
                Some(&e) => {
                    out.push('\\');
                    out.push(e);
                }
                None => return Err("unterminated string".to_string()),
            }
            i += 2;
            continue;
        }
        if c == quote {
            if !triple {
                return Ok((out, i + 1));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((out, i + 3));
            }
        }
        out.push(c);
        i += 1;
    }
    Err("unterminated string".to_string())
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
    Ident(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Null => "None",
            Value::List(_) => "list",
            Value::Dict(_) => "object",
            Value::Ident(_) => "expression",
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl Args {
    /// Keyword lookup; camelCase spellings are accepted for JS-style options
    fn kw(&self, name: &str) -> Option<&Value> {
        let camel = snake_to_camel(name);
        self.keyword
            .iter()
            .rev()
            .find(|(k, _)| k == name || *k == camel)
            .map(|(_, v)| v)
    }

    fn str_at(&self, index: usize, what: &str) -> Result<String, String> {
        match self.positional.get(index) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(format!("{} must be a string, found {}", what, other.kind())),
            None => Err(format!("missing {}", what)),
        }
    }

    fn str_kw(&self, name: &str) -> Result<Option<String>, String> {
        match self.kw(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(format!("`{}` must be a string, found {}", name, other.kind())),
        }
    }

    fn bool_kw(&self, name: &str) -> Result<bool, String> {
        match self.kw(name) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(format!("`{}` must be a boolean, found {}", name, other.kind())),
        }
    }

    fn timeout(&self) -> Result<Option<Duration>, String> {
        match self.kw("timeout") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Num(ms)) if *ms >= 0.0 => Ok(Some(Duration::from_millis(*ms as u64))),
            Some(other) => Err(format!("`timeout` must be a non-negative number, found {}", other.kind())),
        }
    }

    fn shifted(&self, by: usize) -> Args {
        Args {
            positional: self.positional.iter().skip(by).cloned().collect(),
            keyword: self.keyword.clone(),
        }
    }
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

struct Segment {
    name: String,
    args: Option<Args>,
}

struct Cursor {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Tok) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(format!("expected {}, found {}", want.describe(), tok.describe())),
            None => Err(format!("expected {}, found end of line", want.describe())),
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(s)) => Ok(s),
            Some(tok) => Err(format!("expected a name, found {}", tok.describe())),
            None => Err("expected a name, found end of line".to_string()),
        }
    }

    fn statement(&mut self) -> Result<Option<Statement>, String> {
        let root = self.ident()?;
        match root.as_str() {
            "pass" if self.peek().is_none() => Ok(None),
            "print" => {
                // Diagnostic output is dropped
                self.pos = self.tokens.len();
                Ok(None)
            }
            "time" => {
                let segments = self.segments()?;
                match segments.as_slice() {
                    [Segment { name, args: Some(args) }] if name == "sleep" => {
                        let secs = num_at(args, 0, "sleep seconds")?;
                        let duration = Duration::try_from_secs_f64(secs.max(0.0))
                            .map_err(|_| format!("sleep seconds out of range: {}", secs))?;
                        Ok(Some(Statement::WaitFor(WaitCondition::Timeout(duration))))
                    }
                    _ => Err("only `time.sleep(seconds)` is supported".to_string()),
                }
            }
            "expect" => self.expect_statement().map(Some),
            "page" => {
                let segments = self.segments()?;
                interpret(&segments).map(Some)
            }
            other => Err(format!("expected a `page.` statement, found `{}`", other)),
        }
    }

    /// `expect(<locator>).to_be_visible(...)`
    fn expect_statement(&mut self) -> Result<Statement, String> {
        self.expect(Tok::LParen)?;
        match self.ident()?.as_str() {
            "page" => {}
            other => return Err(format!("expect() needs a page locator, found `{}`", other)),
        }
        let inner = self.segments()?;
        self.expect(Tok::RParen)?;
        let outer = self.segments()?;

        let (locator, rest) = locator_chain(&inner)?;
        if !rest.is_empty() {
            return Err("expect() takes a bare locator".to_string());
        }
        match outer.as_slice() {
            [Segment { name, args: Some(args) }] if name == "to_be_visible" => {
                Ok(Statement::WaitFor(WaitCondition::Locator {
                    locator,
                    timeout: args.timeout()?,
                }))
            }
            [Segment { name, .. }] => Err(format!("unsupported assertion `{}`", name)),
            _ => Err("expected `.to_be_visible()`".to_string()),
        }
    }

    fn segments(&mut self) -> Result<Vec<Segment>, String> {
        let mut segments = Vec::new();
        while self.peek() == Some(&Tok::Dot) {
            self.pos += 1;
            let name = self.ident()?;
            let args = if self.peek() == Some(&Tok::LParen) {
                self.pos += 1;
                Some(self.call_args()?)
            } else {
                None
            };
            segments.push(Segment { name, args });
        }
        if segments.is_empty() {
            return Err("expected `.` after `page`".to_string());
        }
        Ok(segments)
    }

    /// Arguments after `(` through the matching `)`
    fn call_args(&mut self) -> Result<Args, String> {
        let mut args = Args::default();
        loop {
            if self.peek() == Some(&Tok::RParen) {
                self.pos += 1;
                return Ok(args);
            }
            let is_keyword = matches!(self.peek(), Some(Tok::Ident(_)))
                && self.tokens.get(self.pos + 1) == Some(&Tok::Eq);
            if is_keyword {
                let name = self.ident()?;
                self.pos += 1;
                let value = self.value()?;
                args.keyword.push((name, value));
            } else {
                match self.value()? {
                    // JS-style options object
                    Value::Dict(entries) => args.keyword.extend(entries),
                    value => args.positional.push(value),
                }
            }
            match self.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => return Ok(args),
                Some(tok) => return Err(format!("expected `,` or `)`, found {}", tok.describe())),
                None => return Err("unclosed `(`".to_string()),
            }
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Value::Str(s)),
            Some(Tok::Num(n)) => Ok(Value::Num(n)),
            Some(Tok::Ident(id)) => Ok(match id.as_str() {
                "True" | "true" => Value::Bool(true),
                "False" | "false" => Value::Bool(false),
                "None" | "null" | "undefined" => Value::Null,
                _ => {
                    if self.peek() == Some(&Tok::Dot) || self.peek() == Some(&Tok::LParen) {
                        return Err(format!("expressions like `{}...` are not supported as arguments", id));
                    }
                    Value::Ident(id)
                }
            }),
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                loop {
                    if self.peek() == Some(&Tok::RBracket) {
                        self.pos += 1;
                        return Ok(Value::List(items));
                    }
                    items.push(self.value()?);
                    match self.next() {
                        Some(Tok::Comma) => {}
                        Some(Tok::RBracket) => return Ok(Value::List(items)),
                        _ => return Err("unclosed `[`".to_string()),
                    }
                }
            }
            Some(Tok::LBrace) => {
                let mut entries = Vec::new();
                loop {
                    if self.peek() == Some(&Tok::RBrace) {
                        self.pos += 1;
                        return Ok(Value::Dict(entries));
                    }
                    let key = match self.next() {
                        Some(Tok::Ident(k)) | Some(Tok::Str(k)) => k,
                        _ => return Err("expected an object key".to_string()),
                    };
                    self.expect(Tok::Colon)?;
                    entries.push((key, self.value()?));
                    match self.next() {
                        Some(Tok::Comma) => {}
                        Some(Tok::RBrace) => return Ok(Value::Dict(entries)),
                        _ => return Err("unclosed `{`".to_string()),
                    }
                }
            }
            Some(tok) => Err(format!("unexpected {}", tok.describe())),
            None => Err("unexpected end of line".to_string()),
        }
    }
}

fn num_at(args: &Args, index: usize, what: &str) -> Result<f64, String> {
    match args.positional.get(index) {
        Some(Value::Num(n)) => Ok(*n),
        Some(other) => Err(format!("{} must be a number, found {}", what, other.kind())),
        None => Err(format!("missing {}", what)),
    }
}

fn require_args<'a>(segment: &'a Segment) -> Result<&'a Args, String> {
    segment
        .args
        .as_ref()
        .ok_or_else(|| format!("`{}` must be called", segment.name))
}

fn load_state(value: &str) -> Result<LoadState, String> {
    value.parse::<LoadState>()
}

/// Interpret `page.<segments>`
fn interpret(segments: &[Segment]) -> Result<Statement, String> {
    let first = &segments[0];
    let rest = &segments[1..];
    let single = |stmt: Statement| {
        if rest.is_empty() {
            Ok(stmt)
        } else {
            Err(format!("unexpected `.{}` after `{}`", rest[0].name, first.name))
        }
    };

    match first.name.as_str() {
        "goto" => {
            let args = require_args(first)?;
            let url = args.str_at(0, "url")?;
            let wait_until = args.str_kw("wait_until")?.map(|s| load_state(&s)).transpose()?;
            single(Statement::Navigate { url, wait_until })
        }
        "wait_for_load_state" => {
            let args = require_args(first)?;
            let state = match args.positional.first() {
                Some(Value::Str(s)) => load_state(s)?,
                Some(other) => return Err(format!("load state must be a string, found {}", other.kind())),
                None => match args.str_kw("state")? {
                    Some(s) => load_state(&s)?,
                    None => LoadState::Load,
                },
            };
            single(Statement::WaitFor(WaitCondition::LoadState {
                state,
                timeout: args.timeout()?,
            }))
        }
        "wait_for_timeout" => {
            let args = require_args(first)?;
            let ms = num_at(args, 0, "timeout")?;
            single(Statement::WaitFor(WaitCondition::Timeout(Duration::from_millis(
                ms.max(0.0) as u64,
            ))))
        }
        "wait_for_selector" => {
            let args = require_args(first)?;
            let locator = Locator::css(args.str_at(0, "selector")?);
            if let Some(state) = args.str_kw("state")? {
                if state != "visible" && state != "attached" {
                    return Err(format!("wait_for_selector state '{}' is not supported", state));
                }
            }
            single(Statement::WaitFor(WaitCondition::Locator {
                locator,
                timeout: args.timeout()?,
            }))
        }
        "evaluate" => {
            let args = require_args(first)?;
            single(Statement::Evaluate {
                script: args.str_at(0, "script")?,
            })
        }
        "keyboard" => match rest {
            [seg] => {
                let args = require_args(seg)?;
                let action = match seg.name.as_str() {
                    "press" => Act::Press(args.str_at(0, "key")?),
                    "fill" | "type" | "insert_text" => Act::Fill(args.str_at(0, "text")?),
                    other => return Err(format!("unsupported keyboard method `{}`", other)),
                };
                Ok(Statement::Act {
                    locator: Locator::focused(),
                    action,
                    timeout: args.timeout()?,
                })
            }
            _ => Err("expected `page.keyboard.press(key)`".to_string()),
        },
        name if is_action(name) => {
            // page.click("css"), page.fill("css", "value")
            let args = require_args(first)?;
            let locator = Locator::css(args.str_at(0, "selector")?);
            let action = build_act(name, &args.shifted(1))?;
            single(Statement::Act {
                locator,
                action,
                timeout: args.timeout()?,
            })
        }
        name if LocatorKind::from_method(name).is_some() => {
            let (locator, rest) = locator_chain(segments)?;
            match rest {
                [] => Err(format!("`{}` has no action", locator)),
                [seg] if seg.name == "wait_for" => {
                    let args = require_args(seg)?;
                    if let Some(state) = args.str_kw("state")? {
                        if state != "visible" && state != "attached" {
                            return Err(format!("wait_for state '{}' is not supported", state));
                        }
                    }
                    Ok(Statement::WaitFor(WaitCondition::Locator {
                        locator,
                        timeout: args.timeout()?,
                    }))
                }
                [seg] if is_action(&seg.name) => {
                    let args = require_args(seg)?;
                    Ok(Statement::Act {
                        locator,
                        action: build_act(&seg.name, args)?,
                        timeout: args.timeout()?,
                    })
                }
                [seg] => Err(format!("unsupported locator method `{}`", seg.name)),
                [seg, ..] => Err(format!("unexpected `.{}` after action", seg.name)),
            }
        }
        other => Err(format!("unsupported page method `{}`", other)),
    }
}

fn is_action(name: &str) -> bool {
    matches!(
        name,
        "click" | "dblclick" | "fill" | "type" | "check" | "uncheck" | "hover" | "press" | "select_option"
    )
}

fn build_act(name: &str, args: &Args) -> Result<Act, String> {
    Ok(match name {
        "click" => Act::Click,
        "dblclick" => Act::DoubleClick,
        "fill" | "type" => Act::Fill(args.str_at(0, "value")?),
        "check" => Act::Check,
        "uncheck" => Act::Uncheck,
        "hover" => Act::Hover,
        "press" => Act::Press(args.str_at(0, "key")?),
        "select_option" => {
            let values = match args.positional.first() {
                Some(Value::Str(s)) => vec![s.clone()],
                Some(Value::List(items)) => items
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => Ok(s.clone()),
                        other => Err(format!("option must be a string, found {}", other.kind())),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(other) => return Err(format!("option must be a string, found {}", other.kind())),
                None => match (args.str_kw("value")?, args.str_kw("label")?) {
                    (Some(v), _) | (None, Some(v)) => vec![v],
                    (None, None) => return Err("missing option value".to_string()),
                },
            };
            Act::SelectOption(values)
        }
        other => return Err(format!("unsupported action `{}`", other)),
    })
}

/// Build a locator from `get_by_*(...)` plus `.first`/`.last`/`.nth(i)`;
/// returns the remaining segments.
fn locator_chain(segments: &[Segment]) -> Result<(Locator, &[Segment]), String> {
    let head = segments
        .first()
        .ok_or_else(|| "expected a locator".to_string())?;
    let kind = LocatorKind::from_method(&head.name)
        .ok_or_else(|| format!("expected a locator, found `{}`", head.name))?;
    let args = require_args(head)?;

    let what = match kind {
        LocatorKind::Role => "role",
        LocatorKind::Css => "selector",
        _ => "text",
    };
    let mut locator = Locator::new(kind, args.str_at(0, what)?);
    locator.exact = args.bool_kw("exact")?;
    if kind == LocatorKind::Role {
        locator.name = args.str_kw("name")?;
    }
    if args.kw("has_text").is_some() || args.kw("has").is_some() {
        return Err("locator filters (`has_text`, `has`) are not supported".to_string());
    }

    let mut rest = &segments[1..];
    while let Some(seg) = rest.first() {
        let index = match (seg.name.as_str(), &seg.args) {
            ("first", None) => LocatorIndex::First,
            ("last", None) => LocatorIndex::Last,
            // JS spells these as methods
            ("first", Some(a)) | ("last", Some(a)) if a.positional.is_empty() => {
                if seg.name == "first" {
                    LocatorIndex::First
                } else {
                    LocatorIndex::Last
                }
            }
            ("nth", Some(a)) => LocatorIndex::Nth(num_at(a, 0, "index")? as i64),
            (name, _) if LocatorKind::from_method(name).is_some() => {
                return Err("chained locators are not supported".to_string());
            }
            _ => break,
        };
        locator.index = Some(index);
        rest = &rest[1..];
    }
    Ok((locator, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(src: &str) -> Statement {
        let script = parse(src).unwrap();
        assert_eq!(script.statements.len(), 1, "{:?}", script);
        script.statements.into_iter().next().unwrap()
    }

    #[test]
    fn test_navigate() {
        assert_eq!(
            one(r#"page.goto("https://example.com", wait_until="networkidle")"#),
            Statement::Navigate {
                url: "https://example.com".into(),
                wait_until: Some(LoadState::NetworkIdle),
            }
        );
        assert_eq!(
            one("page.goto('https://a.b')"),
            Statement::Navigate {
                url: "https://a.b".into(),
                wait_until: None,
            }
        );
    }

    #[test]
    fn test_role_click() {
        match one(r#"page.get_by_role("button", name="Sign in").click()"#) {
            Statement::Act { locator, action, timeout } => {
                assert_eq!(locator, Locator::role("button", "Sign in"));
                assert_eq!(action, Act::Click);
                assert!(timeout.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_js_style_options() {
        match one(r#"page.get_by_role('link', { name: 'Log in', exact: true }).click({ timeout: 5000 })"#) {
            Statement::Act { locator, timeout, .. } => {
                assert_eq!(locator.name.as_deref(), Some("Log in"));
                assert!(locator.exact);
                assert_eq!(timeout, Some(Duration::from_millis(5000)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_index_modifiers() {
        match one(r#"page.get_by_text("Next").nth(1).click()"#) {
            Statement::Act { locator, .. } => assert_eq!(locator.index, Some(LocatorIndex::Nth(1))),
            other => panic!("unexpected {:?}", other),
        }
        match one(r#"page.locator("a.item").last.hover()"#) {
            Statement::Act { locator, action, .. } => {
                assert_eq!(locator.kind, LocatorKind::Css);
                assert_eq!(locator.index, Some(LocatorIndex::Last));
                assert_eq!(action, Act::Hover);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fill_press_select() {
        match one(r#"page.get_by_label("Email").fill("user@example.com")"#) {
            Statement::Act { action, .. } => assert_eq!(action, Act::Fill("user@example.com".into())),
            other => panic!("unexpected {:?}", other),
        }
        match one(r##"page.fill("#password", "s3cret#1")"##) {
            Statement::Act { locator, action, .. } => {
                assert_eq!(locator, Locator::css("#password"));
                assert_eq!(action, Act::Fill("s3cret#1".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
        match one(r#"page.locator("select#country").select_option(["in", "us"])"#) {
            Statement::Act { action, .. } => {
                assert_eq!(action, Act::SelectOption(vec!["in".into(), "us".into()]))
            }
            other => panic!("unexpected {:?}", other),
        }
        match one(r#"page.keyboard.press("Enter")"#) {
            Statement::Act { locator, action, .. } => {
                assert_eq!(locator, Locator::focused());
                assert_eq!(action, Act::Press("Enter".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_waits() {
        assert_eq!(
            one(r#"page.wait_for_load_state("domcontentloaded")"#),
            Statement::WaitFor(WaitCondition::LoadState {
                state: LoadState::DomContentLoaded,
                timeout: None,
            })
        );
        assert_eq!(
            one("page.wait_for_timeout(1000)"),
            Statement::WaitFor(WaitCondition::Timeout(Duration::from_millis(1000)))
        );
        assert_eq!(
            one("time.sleep(2)"),
            Statement::WaitFor(WaitCondition::Timeout(Duration::from_secs(2)))
        );
        match one(r#"expect(page.get_by_text("how are you?")).to_be_visible(timeout=3000)"#) {
            Statement::WaitFor(WaitCondition::Locator { locator, timeout }) => {
                assert_eq!(locator.kind, LocatorKind::Text);
                assert_eq!(timeout, Some(Duration::from_millis(3000)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comments_and_hash_in_strings() {
        let script = parse(
            "# open the page\npage.locator(\"#login\").click()  # trailing comment\n\n// js comment\n",
        )
        .unwrap();
        assert_eq!(script.statements.len(), 1);
    }

    #[test]
    fn test_try_except_fallback() {
        let src = r#"
try:
    page.get_by_role("button", name="Sign in").click()
except Exception as e:
    print(f"first failed: {e}")
    page.get_by_text("Sign in").first.click()
"#;
        match one(src) {
            Statement::Fallback(alts) => {
                assert_eq!(alts.len(), 2);
                assert_eq!(alts[0].len(), 1);
                assert_eq!(alts[1].len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_except_try_flattens() {
        let src = r#"
try:
    page.get_by_role("link", name="Log in").click()
except:
    try:
        page.get_by_text("Log in").click()
    except:
        page.locator("a[href*='login']").click()
page.wait_for_load_state("load")
"#;
        let script = parse(src).unwrap();
        assert_eq!(script.statements.len(), 2);
        match &script.statements[0] {
            Statement::Fallback(alts) => assert_eq!(alts.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inline_except_pass() {
        let src = "try:\n    page.get_by_text(\"Accept cookies\").click(timeout=2000)\nexcept: pass\n";
        match one(src) {
            Statement::Fallback(alts) => {
                assert_eq!(alts.len(), 2);
                assert!(alts[1].is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse("page.goto(\"https://a.b\")\nbrowser.close()").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("browser"));

        let err = parse("page.get_by_text(\"x\")").unwrap_err();
        assert!(err.message.contains("no action"));

        let err = parse("try:\n    page.wait_for_timeout(1)\n").unwrap_err();
        assert_eq!(err.line, 1);

        let err = parse("page.get_by_role(\"x\").get_by_text(\"y\").click()").unwrap_err();
        assert!(err.message.contains("chained"));

        let err = parse("page.goto(\"unterminated)").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_out_of_range_waits() {
        let err = parse("time.sleep(99999999999999999999999)").unwrap_err();
        assert!(err.message.contains("out of range"), "{}", err.message);

        assert_eq!(
            one("time.sleep(-3)"),
            Statement::WaitFor(WaitCondition::Timeout(Duration::ZERO))
        );
        assert_eq!(
            one("page.wait_for_timeout(99999999999999999999999)"),
            Statement::WaitFor(WaitCondition::Timeout(Duration::from_millis(u64::MAX)))
        );
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let err = parse("page.screenshot(path=\"x.png\")").unwrap_err();
        assert!(err.message.contains("screenshot"));
    }

    #[test]
    fn test_empty_script() {
        assert!(parse("\n# nothing\n").unwrap().is_empty());
    }
}
