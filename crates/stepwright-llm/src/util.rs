//! Common utilities for LLM providers

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Mask API key for safe display in logs
///
/// Shows first 4 and last 4 characters for keys longer than 8 characters,
/// otherwise shows "****".
///
/// # Examples
/// ```
/// use stepwright_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY || !key.is_ascii() {
        return "****".to_string();
    }
    format!(
        "{}...{}",
        &key[..KEY_MASK_VISIBLE_CHARS],
        &key[key.len() - KEY_MASK_VISIBLE_CHARS..]
    )
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
