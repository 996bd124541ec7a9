//! Text helpers shared by the filter and the merger.
//!
//! Case folding for pattern matching, and title derivation for records.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Markdown marker runs stripped from a candidate title line.
static TITLE_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*\-]+").unwrap());

/// Marker runs stripped from content when falling back to a prefix title.
static CONTENT_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#*\-!]+").unwrap());

/// Lines at or above this many characters are never used as titles.
const MAX_TITLE_LINE_CHARS: usize = 100;

/// Titles are cut to this many characters.
const MAX_TITLE_CHARS: usize = 80;

/// Prefix length used when no line qualifies as a title.
const FALLBACK_TITLE_CHARS: usize = 50;

/// Fold text for case-insensitive substring matching.
///
/// Applies NFKC so full-width and compatibility forms compare equal to their
/// plain counterparts, then lowercases. Whitespace is left as is, so a
/// pattern never matches across a line break.
pub fn fold(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Derive a record title from markdown content.
///
/// Takes the first non-empty line shorter than 100 characters that is not an
/// image line, strips markdown markers and truncates to 80 characters. When no
/// line qualifies, the first 50 characters of the cleaned content are used.
pub fn derive_title(content: &str) -> String {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') || line.chars().count() >= MAX_TITLE_LINE_CHARS
        {
            continue;
        }
        let title = TITLE_MARKER_REGEX.replace_all(line, "");
        let title = title.trim();
        if !title.is_empty() {
            return truncate_chars(title, MAX_TITLE_CHARS).to_string();
        }
    }

    let cleaned = CONTENT_MARKER_REGEX.replace_all(content, "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > FALLBACK_TITLE_CHARS {
        format!("{}...", truncate_chars(cleaned, FALLBACK_TITLE_CHARS).trim_end())
    } else {
        cleaned.to_string()
    }
}

/// Cut a string to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
