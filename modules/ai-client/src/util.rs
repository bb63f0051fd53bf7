use std::sync::LazyLock;

use regex::Regex;

static FIRST_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"));

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Remove every markdown code fence marker (```json and ```) from a response.
pub fn strip_code_blocks(response: &str) -> String {
    response.replace("```json", "").replace("```", "").trim().to_string()
}

/// Replace ASCII control characters (other than tab, LF and CR) with spaces.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => c,
            c if (c as u32) < 0x20 => ' ',
            c => c,
        })
        .collect()
}

/// The first `{ … }` span in the text, shortest match.
pub fn first_json_object(text: &str) -> Option<&str> {
    FIRST_OBJECT.find(text).map(|m| m.as_str())
}
