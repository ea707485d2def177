// src/utils/html.rs

use std::collections::HashSet;

/// Longest display name accepted into a room, in characters.
const MAX_DISPLAY_NAME: usize = 64;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive while dangerous tags
/// (like <script>, <iframe>) and malicious attributes (like onclick) are stripped.
/// Question text, options and explanations pass through here before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes a display name before it is stored in a room or broadcast.
///
/// Strips markup, trims whitespace and truncates. Falls back to `fallback`
/// when nothing printable is left. The result is plain text: entities that
/// ammonia escapes on output are decoded again, since names travel as JSON.
pub fn display_name(input: &str, fallback: &str) -> String {
    let mut builder = ammonia::Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    let cleaned = builder.clean(input).to_string();
    let cleaned = html_escape::decode_html_entities(&cleaned);
    let trimmed: String = cleaned.trim().chars().take(MAX_DISPLAY_NAME).collect();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed
    }
}
