//! Utility functions and helpers.

pub mod http;
pub mod time;

use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Escape characters that legacy chat Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    static SPECIAL: OnceLock<Regex> = OnceLock::new();
    let re = SPECIAL.get_or_init(|| Regex::new(r"([_*`\[])").expect("static regex"));
    re.replace_all(text, r"\$1").into_owned()
}

/// Cut text to at most `max` grapheme clusters, appending an ellipsis when cut.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Placeholder for empty values in messages.
pub fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}
