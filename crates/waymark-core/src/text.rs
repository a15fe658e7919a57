//! Small text helpers shared by plan parsing and content handling.

/// Removes a surrounding Markdown code fence, if present.
///
/// Text generation services frequently wrap code or JSON in a fence with an
/// optional language tag. Text without a leading fence is returned trimmed.
///
/// ```rust
/// use waymark_core::text::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```rust\nfn main() {}\n```"), "fn main() {}");
/// assert_eq!(strip_code_fence("plain"), "plain");
/// ```
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => return trimmed,
    };
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim_end_matches(['\n', '\r']),
        None => body,
    }
}

/// Shortens text for inclusion in error messages, respecting char
/// boundaries.
pub fn truncate_for_error(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }
    let mut end = max_len;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &input[..end])
}
