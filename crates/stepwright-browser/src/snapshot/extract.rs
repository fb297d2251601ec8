//! Snapshot extraction

use super::types::{PageSnapshot, PageState};
use crate::page::Page;
use tracing::{debug, instrument, warn};

/// Page function collecting a [`PageSnapshot`]. Read-only against the page.
const EXTRACT: &str = r#"() => {
  const MAX_HTML = 20000;
  const MAX_TEXT = 5000;
  const MAX_ELEMENTS = 200;
  const clip = (s, n) => (s || '').replace(/\s+/g, ' ').trim().slice(0, n);
  const isVisible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0
      && style.display !== 'none'
      && style.visibility !== 'hidden'
      && style.opacity !== '0';
  };
  const rectOf = (el) => {
    const r = el.getBoundingClientRect();
    return { x: r.x, y: r.y, width: r.width, height: r.height };
  };
  const attrsOf = (el) => {
    const out = {};
    for (const a of Array.from(el.attributes)) {
      if (a.name === 'value' && el.type === 'password') continue;
      out[a.name] = clip(a.value, 200);
    }
    return out;
  };
  const valueOf = (el) => {
    if (el.type === 'password') return null;
    return typeof el.value === 'string' ? clip(el.value, 200) : null;
  };
  const classOf = (el) => (typeof el.className === 'string' && el.className) ? el.className : null;

  const INTERACTIVE = [
    'button', 'a', 'input', 'select', 'textarea',
    '[role="button"]', '[role="link"]', '[role="checkbox"]', '[role="radio"]',
    '[role="tab"]', '[role="menuitem"]', '[role="option"]', '[role="switch"]',
    '[role="combobox"]', '[role="textbox"]', '[role="searchbox"]',
  ].join(', ');

  const interactiveElements = Array.from(document.querySelectorAll(INTERACTIVE))
    .slice(0, MAX_ELEMENTS)
    .map((el) => ({
      tag: el.tagName.toLowerCase(),
      id: el.id || null,
      name: el.getAttribute('name'),
      classList: Array.from(el.classList || []),
      type: el.getAttribute('type'),
      value: valueOf(el),
      text: clip(el.innerText || el.textContent, 200),
      visible: isVisible(el),
      rect: rectOf(el),
      attributes: attrsOf(el),
    }));

  const forms = Array.from(document.forms).map((form) => ({
    id: form.id || null,
    action: form.getAttribute('action'),
    method: (form.getAttribute('method') || 'get').toLowerCase(),
    inputs: Array.from(form.querySelectorAll('input, select, textarea')).map((el) => {
      const tag = el.tagName.toLowerCase();
      return {
        tag,
        type: tag === 'input' ? (el.getAttribute('type') || 'text').toLowerCase() : tag,
        name: el.getAttribute('name'),
        id: el.id || null,
        placeholder: el.getAttribute('placeholder'),
        required: !!el.required,
        value: valueOf(el),
      };
    }),
  }));

  const navigation = Array.from(document.querySelectorAll('nav, header')).map((block) => ({
    type: block.tagName.toLowerCase(),
    id: block.id || null,
    class: classOf(block),
    links: Array.from(block.querySelectorAll('a')).map((a) => ({
      text: clip(a.innerText || a.textContent, 100),
      href: a.getAttribute('href'),
      id: a.id || null,
      class: classOf(a),
    })),
  }));

  return {
    url: location.href,
    title: document.title || '',
    html: document.documentElement ? document.documentElement.outerHTML.slice(0, MAX_HTML) : '',
    visibleText: clip(document.body ? document.body.innerText : '', MAX_TEXT),
    interactiveElements,
    forms,
    navigation,
    iframeCount: document.querySelectorAll('iframe').length,
  };
}"#;

/// Capture the state of `page`.
///
/// Never fails: when the page cannot be read the result is
/// [`PageState::Degraded`] carrying the error and, if it can still be
/// read, the URL.
#[instrument(skip(page))]
pub async fn capture(page: &dyn Page) -> PageState {
    let error = match page.evaluate(EXTRACT).await {
        Ok(value) => match serde_json::from_value::<PageSnapshot>(value) {
            Ok(snapshot) => {
                debug!(
                    url = %snapshot.url,
                    elements = snapshot.interactive_elements.len(),
                    forms = snapshot.forms.len(),
                    "page state captured"
                );
                return PageState::Captured(snapshot);
            }
            Err(e) => format!("unexpected snapshot shape: {}", e),
        },
        Err(e) => e.to_string(),
    };

    let url = page.url().await.ok();
    warn!(error = %error, url = ?url, "page state extraction failed");
    PageState::Degraded { error, url }
}
