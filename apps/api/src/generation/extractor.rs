//! Response Extractor — recovers a JSON candidate from raw model text.
//!
//! Order of preference: text that is already a bare object or array, a
//! ```json fenced block, any fenced block, then the whole text (narrowed to
//! its outermost `{...}` span when prose surrounds it). Parsing is left to the
//! caller so that "nothing to parse" and "parsed but wrong shape" stay
//! distinct failures.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A fenced block with its (possibly empty) language tag.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("model output contained no JSON candidate")]
    Empty,
}

/// First non-empty fenced body whose tag passes `accept`.
fn first_fenced(text: &str, accept: impl Fn(&str) -> bool) -> Option<&str> {
    FENCE
        .captures_iter(text)
        .filter(|c| c.get(1).is_some_and(|tag| accept(tag.as_str())))
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str().trim())
        .find(|s| !s.is_empty())
}

/// Bare objects and arrays are returned whole, so fences quoted inside
/// string values never split them.
fn is_bare_json(text: &str) -> bool {
    (text.starts_with('{') && text.ends_with('}'))
        || (text.starts_with('[') && text.ends_with(']'))
}

/// Narrows prose-wrapped output to the outermost object span.
fn outermost_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Returns the trimmed JSON candidate inside `raw`.
pub fn extract(raw: &str) -> Result<&str, ExtractionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if is_bare_json(text) {
        return Ok(text);
    }

    if let Some(candidate) = first_fenced(text, |tag| tag.eq_ignore_ascii_case("json")) {
        return Ok(candidate);
    }
    if let Some(candidate) = first_fenced(text, |_| true) {
        return Ok(candidate);
    }

    Ok(outermost_object(text))
}
