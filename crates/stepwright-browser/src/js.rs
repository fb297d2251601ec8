//! Page functions sent through `browser_evaluate`
//!
//! Each builder returns an `async () => {...}` source string with its
//! parameters inlined as a JSON literal. Functions that can fail resolve to
//! `{ ok: false, error }` with Playwright-style messages instead of throwing.

use crate::page::LoadState;
use crate::script::{Act, Locator, LocatorIndex};
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

/// Source that already declares a function: `function`, `async`, or an arrow head
static FUNCTION_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?(?:function\b|\([^()]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)")
        .expect("FUNCTION_SOURCE is a compile-time constant")
});

const SPEC_PLACEHOLDER: &str = "__SPEC__";

/// Location of the current page
pub(crate) const LOCATION: &str = "() => location.href";

const LOCATE_AND_ACT: &str = r#"async () => {
  const spec = __SPEC__;
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const matches = (actual, expected) => {
    const a = norm(actual);
    if (spec.exact) return a === expected;
    return a.toLowerCase().includes(norm(expected).toLowerCase());
  };
  const isVisible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.display !== 'none' &&
      style.visibility !== 'hidden' && style.opacity !== '0';
  };
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    switch (tag) {
      case 'button': return 'button';
      case 'a': case 'area': return el.hasAttribute('href') ? 'link' : null;
      case 'input':
        if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
        if (type === 'checkbox') return 'checkbox';
        if (type === 'radio') return 'radio';
        if (type === 'range') return 'slider';
        if (type === 'number') return 'spinbutton';
        if (type === 'search') return 'searchbox';
        if (type === 'hidden') return null;
        return 'textbox';
      case 'textarea': return 'textbox';
      case 'select': return (el.multiple || el.size > 1) ? 'listbox' : 'combobox';
      case 'option': return 'option';
      case 'img': return 'img';
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'ul': case 'ol': return 'list';
      case 'li': return 'listitem';
      case 'nav': return 'navigation';
      case 'dialog': return 'dialog';
      case 'table': return 'table';
      case 'tr': return 'row';
      case 'td': return 'cell';
      default: return null;
    }
  };
  const roleOf = (el) => (el.getAttribute('role') || '').trim().split(/\s+/)[0] || implicitRole(el);
  const labelsOf = (el) => {
    const out = [];
    if (el.id) {
      document.querySelectorAll('label').forEach((l) => { if (l.htmlFor === el.id) out.push(l.innerText); });
    }
    const wrap = el.closest('label');
    if (wrap) out.push(wrap.innerText);
    return out;
  };
  const labelledBy = (el) => (el.getAttribute('aria-labelledby') || '').split(/\s+/).filter(Boolean)
    .map((id) => { const n = document.getElementById(id); return n ? n.innerText : ''; }).join(' ');
  const accessibleName = (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria) return aria;
    const by = labelledBy(el);
    if (norm(by)) return by;
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'input' && ['button', 'submit', 'reset'].includes(type)) return el.value || '';
    if (tag === 'img' || (tag === 'input' && type === 'image')) return el.getAttribute('alt') || '';
    if (['input', 'textarea', 'select'].includes(tag)) {
      const labels = labelsOf(el);
      if (labels.length) return labels.join(' ');
    }
    const text = el.innerText || el.textContent || '';
    if (norm(text)) return text;
    return el.getAttribute('title') || el.getAttribute('placeholder') || '';
  };
  const all = () => Array.from(document.querySelectorAll('body *'))
    .filter((el) => !['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE'].includes(el.tagName));
  const innermost = (els) => els.filter((el) => !els.some((o) => o !== el && el.contains(o)));
  const attrMatch = (name) => all().filter((el) => el.hasAttribute(name) && matches(el.getAttribute(name), spec.value));
  const resolve = () => {
    switch (spec.kind) {
      case 'css': return Array.from(document.querySelectorAll(spec.value));
      case 'testid': return all().filter((el) => el.getAttribute('data-testid') === spec.value);
      case 'placeholder': return attrMatch('placeholder');
      case 'alt': return attrMatch('alt');
      case 'title': return attrMatch('title');
      case 'label': return all()
        .filter((el) => ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName) || el.isContentEditable ||
          el.hasAttribute('aria-label') || el.hasAttribute('aria-labelledby'))
        .filter((el) => [el.getAttribute('aria-label') || '', labelledBy(el), ...labelsOf(el)]
          .some((n) => norm(n) && matches(n, spec.value)));
      case 'text': return innermost(all().filter((el) => matches(el.innerText || el.textContent, spec.value)));
      case 'role': return all().filter((el) => roleOf(el) === spec.value)
        .filter((el) => spec.name === null || matches(accessibleName(el), spec.name));
      default: return [];
    }
  };
  const pick = (els) => {
    if (spec.index === null) {
      if (els.length > 1) return { strict: els.length };
      return els.length === 1 ? { el: els[0] } : {};
    }
    const i = spec.index < 0 ? els.length + spec.index : spec.index;
    return (i >= 0 && i < els.length) ? { el: els[i] } : {};
  };
  const preview = (el) => {
    const tag = el.tagName.toLowerCase();
    const attrs = Array.from(el.attributes).slice(0, 6)
      .map((a) => a.name + '="' + a.value.slice(0, 40) + '"').join(' ');
    const text = norm(el.innerText || el.textContent).slice(0, 40);
    return '<' + tag + (attrs ? ' ' + attrs : '') + '>' + text + '</' + tag + '>';
  };

  const deadline = Date.now() + spec.timeout;
  let reason = 'no element found';
  let el = null;
  while (true) {
    let found;
    try {
      found = pick(resolve());
    } catch (e) {
      return { ok: false, error: 'Error: invalid locator ' + spec.describe + ': ' + e.message };
    }
    if (found.strict) {
      return { ok: false, error: 'Error: strict mode violation: ' + spec.describe + ' resolved to ' + found.strict + ' elements' };
    }
    el = found.el || null;
    if (!el) {
      reason = 'no element found';
    } else if (!isVisible(el)) {
      reason = 'element is not visible';
    } else if (spec.action && spec.action.type !== 'hover' && el.disabled) {
      reason = 'element is not enabled';
    } else {
      break;
    }
    if (Date.now() >= deadline) {
      let msg = 'Timeout ' + spec.timeout + 'ms exceeded while waiting for ' + spec.describe;
      msg += el ? '\n  - locator resolved to ' + preview(el) + '\n  - ' + reason : ': ' + reason;
      return { ok: false, error: msg };
    }
    await new Promise((r) => setTimeout(r, 100));
  }
  if (!spec.action) return { ok: true };

  const a = spec.action;
  const mouse = (type) => el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, composed: true, view: window }));
  const key = (type) => el.dispatchEvent(new KeyboardEvent(type, { key: a.value, bubbles: true, cancelable: true, composed: true }));
  const fire = (type) => el.dispatchEvent(new Event(type, { bubbles: true }));
  try {
    el.scrollIntoView({ block: 'center', inline: 'center' });
    switch (a.type) {
      case 'click':
        mouse('mouseover'); mouse('mousedown');
        if (el.focus) el.focus();
        mouse('mouseup'); el.click();
        break;
      case 'dblclick':
        mouse('mousedown'); mouse('mouseup'); el.click();
        mouse('mousedown'); mouse('mouseup'); el.click();
        mouse('dblclick');
        break;
      case 'hover':
        mouse('mouseover'); mouse('mouseenter'); mouse('mousemove');
        break;
      case 'fill': {
        if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {
          const t = (el.type || '').toLowerCase();
          if (['checkbox', 'radio', 'button', 'submit', 'reset', 'file', 'image', 'hidden'].includes(t)) {
            return { ok: false, error: 'Error: Input of type "' + t + '" cannot be filled\n  - locator resolved to ' + preview(el) };
          }
          el.focus();
          const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
          Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, a.value);
          fire('input'); fire('change');
        } else if (el.isContentEditable) {
          el.focus();
          el.textContent = a.value;
          fire('input');
        } else {
          return { ok: false, error: 'Error: Element is not an <input>, <textarea> or [contenteditable] element\n  - locator resolved to ' + preview(el) };
        }
        break;
      }
      case 'check':
      case 'uncheck': {
        const want = a.type === 'check';
        const state = () => (el.type === 'checkbox' || el.type === 'radio') ? el.checked : el.getAttribute('aria-checked') === 'true';
        if (state() !== want) el.click();
        if (state() !== want) return { ok: false, error: 'Error: Clicking the checkbox did not change its state' };
        break;
      }
      case 'press':
        if (el.focus) el.focus();
        key('keydown'); key('keypress');
        if (a.value === 'Enter' && el.tagName === 'INPUT' && el.form) {
          if (el.form.requestSubmit) el.form.requestSubmit(); else el.form.submit();
        }
        key('keyup');
        break;
      case 'select': {
        if (el.tagName !== 'SELECT') {
          return { ok: false, error: 'Error: Element is not a <select> element\n  - locator resolved to ' + preview(el) };
        }
        const opts = Array.from(el.options);
        const chosen = a.values.map((v) => opts.find((o) => o.value === v || norm(o.label) === v || norm(o.text) === v));
        if (chosen.some((o) => !o)) return { ok: false, error: 'Error: options not found: ' + a.values.join(', ') };
        opts.forEach((o) => { o.selected = chosen.includes(o); });
        fire('input'); fire('change');
        break;
      }
    }
  } catch (e) {
    return { ok: false, error: 'Error: ' + e.message };
  }
  return { ok: true };
}"#;

const WAIT_FOR_LOAD_STATE: &str = r#"async () => {
  const spec = __SPEC__;
  const deadline = Date.now() + spec.timeout;
  const fail = () => ({ ok: false, error: 'Timeout ' + spec.timeout + 'ms exceeded waiting for load state "' + spec.state + '"' });
  const reached = () => spec.state === 'domcontentloaded'
    ? document.readyState !== 'loading'
    : document.readyState === 'complete';
  while (!reached()) {
    if (Date.now() >= deadline) return fail();
    await new Promise((r) => setTimeout(r, 50));
  }
  if (spec.state === 'networkidle') {
    let count = performance.getEntriesByType('resource').length;
    let quietSince = Date.now();
    while (Date.now() - quietSince < 500) {
      if (Date.now() >= deadline) return fail();
      await new Promise((r) => setTimeout(r, 100));
      const now = performance.getEntriesByType('resource').length;
      if (now !== count) { count = now; quietSince = Date.now(); }
    }
  }
  return { ok: true };
}"#;

fn with_spec(template: &str, spec: serde_json::Value) -> String {
    template.replacen(SPEC_PLACEHOLDER, &spec.to_string(), 1)
}

fn index_value(index: Option<LocatorIndex>) -> serde_json::Value {
    match index {
        None => serde_json::Value::Null,
        Some(LocatorIndex::First) => json!(0),
        Some(LocatorIndex::Last) => json!(-1),
        Some(LocatorIndex::Nth(i)) => json!(i),
    }
}

fn action_value(action: &Act) -> serde_json::Value {
    match action {
        Act::Click => json!({ "type": "click" }),
        Act::DoubleClick => json!({ "type": "dblclick" }),
        Act::Fill(value) => json!({ "type": "fill", "value": value }),
        Act::Check => json!({ "type": "check" }),
        Act::Uncheck => json!({ "type": "uncheck" }),
        Act::Hover => json!({ "type": "hover" }),
        Act::Press(key) => json!({ "type": "press", "value": key }),
        Act::SelectOption(values) => json!({ "type": "select", "values": values }),
    }
}

/// Resolve `locator`, wait until actionable, then perform `action` (or just wait when `None`)
pub(crate) fn locate_and_act(locator: &Locator, action: Option<&Act>, timeout_ms: u64) -> String {
    let spec = json!({
        "kind": locator.kind.as_str(),
        "value": locator.value,
        "name": locator.name,
        "exact": locator.exact,
        "index": index_value(locator.index),
        "describe": locator.to_string(),
        "action": action.map(action_value),
        "timeout": timeout_ms,
    });
    with_spec(LOCATE_AND_ACT, spec)
}

/// Poll until the document reaches `state`
pub(crate) fn wait_for_load_state(state: LoadState, timeout_ms: u64) -> String {
    with_spec(
        WAIT_FOR_LOAD_STATE,
        json!({ "state": state.as_str(), "timeout": timeout_ms }),
    )
}

/// Turn script text into a page function. Function sources pass through;
/// a bare expression becomes `() => (expr)`, statements become a block body.
pub(crate) fn page_function(script: &str) -> String {
    let source = script.trim();
    if FUNCTION_SOURCE.is_match(source) {
        return source.to_string();
    }
    let body = source.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if body.contains(';') || body.contains('\n') {
        format!("() => {{\n{}\n}}", body)
    } else {
        format!("() => ({})", body)
    }
}
