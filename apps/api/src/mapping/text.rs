//! Display-text post-processing applied to every filled value.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const ARROW_GLYPHS: &[char] = &[
    '\u{2193}', '\u{21A9}', '\u{21B2}', '\u{21B3}', '\u{2191}', '\u{2192}', '\u{2190}', '\u{21E8}',
    '\u{21E6}', '\u{21E7}', '\u{21E9}', '\u{27A4}', '\u{279C}',
];

const BULLET_GLYPHS: &[char] = &['●', '•', '·', '▪', '◦', '■'];

fn spaces_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{3000}]{2,}").expect("spaces pattern is valid"))
}

/// True for null, blank strings, and empty arrays or objects.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => {
            if map.contains_key("raw") || map.contains_key("optimized") {
                display_value(value).is_empty()
            } else {
                map.is_empty()
            }
        }
        Value::Number(_) | Value::Bool(_) => false,
    }
}

/// Renders a resolved value as display text.
///
/// Raw/optimized pairs prefer `optimized`; lists are joined with a space
/// after dropping blank items.
pub fn display_value(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => join_items(items.iter().map(display_value)),
        Value::Object(map) => {
            let optimized = map.get("optimized").map(display_value).unwrap_or_default();
            if !optimized.is_empty() {
                optimized
            } else if let Some(raw) = map.get("raw") {
                display_value(raw)
            } else {
                map.get("value").map(display_value).unwrap_or_default()
            }
        }
    };
    clean_text(&text)
}

/// Renders a resolved value as a list of display items.
pub fn display_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_list(s),
        other => {
            let text = display_value(other);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
    }
}

pub fn join_items(items: impl IntoIterator<Item = String>) -> String {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Comma-separated text as items, accepting full-width separators.
pub fn split_list(text: &str) -> Vec<String> {
    text.split([',', '，', '、', ';', '；'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Drops arrow glyphs and leading bullets, folds single newlines into spaces,
/// keeps paragraph breaks.
pub fn clean_text(text: &str) -> String {
    let scrubbed: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !ARROW_GLYPHS.contains(c))
        .collect();

    let paragraphs: Vec<String> = scrubbed
        .split("\n\n")
        .map(|para| {
            let lines: Vec<&str> = para
                .split('\n')
                .map(|line| line.trim().trim_start_matches(BULLET_GLYPHS).trim())
                .filter(|line| !line.is_empty())
                .collect();
            spaces_regex().replace_all(&lines.join(" "), " ").into_owned()
        })
        .filter(|p| !p.is_empty())
        .collect();

    paragraphs.join("\n\n")
}
