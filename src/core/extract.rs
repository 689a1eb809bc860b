//! Fenced code block extraction from free-form model text.

use std::sync::LazyLock;

use regex::Regex;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python(.*?)```").expect("fence regex should be valid"));

/// Extract the first ```` ```python ```` fenced block from a model response.
///
/// Returns the trimmed interior of the first match, or `None` when the text
/// contains no such block. Later blocks are ignored. Never fails.
pub fn extract_code(response: &str) -> Option<String> {
    FENCE_RE
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
}
