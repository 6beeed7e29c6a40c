//! Text-level repairs for model output that is almost, but not quite, JSON.
//!
//! Every pass tracks string-literal state, so content inside a string is never
//! altered. `recovery::recover` applies the passes cumulatively, in the order of
//! [`REPAIRS`], re-decoding after each one.

/// A named repair pass over raw text.
pub struct Repair {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

pub const REPAIRS: [Repair; 4] = [
    Repair {
        name: "strip_comments",
        apply: strip_comments,
    },
    Repair {
        name: "single_quotes",
        apply: convert_single_quotes,
    },
    Repair {
        name: "trailing_commas",
        apply: remove_trailing_commas,
    },
    Repair {
        name: "inner_quotes",
        apply: escape_inner_quotes,
    },
];

#[derive(Clone, Copy, PartialEq)]
enum QuoteState {
    Outside,
    Double,
    Single,
}

/// Removes `//` and `#` line comments that sit outside string literals.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                i = skip_to_line_end(&chars, i);
                continue;
            }
            '#' => {
                i = skip_to_line_end(&chars, i);
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

/// Rewrites `'single quoted'` literals as double-quoted JSON strings.
///
/// A `'` opens a literal only where a JSON value or key may start, and closes
/// it only where a value may end; any other `'` inside the literal is kept as an
/// apostrophe. Inner `"` are escaped.
pub fn convert_single_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = QuoteState::Outside;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            QuoteState::Outside => {
                if c == '"' {
                    state = QuoteState::Double;
                    out.push(c);
                } else if c == '\'' && opens_single_literal(&chars, i) {
                    state = QuoteState::Single;
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
            QuoteState::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == '"' {
                    state = QuoteState::Outside;
                }
            }
            QuoteState::Single => match c {
                '\\' => match chars.get(i + 1) {
                    Some('\'') => {
                        out.push('\'');
                        i += 1;
                    }
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                        i += 1;
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' if closes_literal(&chars, i) => {
                    out.push('"');
                    state = QuoteState::Outside;
                }
                _ => out.push(c),
            },
        }
        i += 1;
    }

    out
}

/// Drops a `,` that is directly followed (ignoring whitespace) by `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' && matches!(next_non_whitespace(&chars, i + 1), Some('}') | Some(']')) {
            // dropped
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}

/// Escapes `"` characters that appear inside a string value but cannot be its
/// closing quote, e.g. `"the "best" team"`.
pub fn escape_inner_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        } else if c == '\\' {
            out.push(c);
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
                i += 1;
            }
        } else if c == '"' {
            if closes_literal(&chars, i) {
                in_string = false;
                out.push(c);
            } else {
                out.push_str("\\\"");
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}

fn skip_to_line_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn opens_single_literal(chars: &[char], at: usize) -> bool {
    let prev = chars[..at].iter().rev().find(|c| !c.is_whitespace());
    matches!(prev, None | Some(':') | Some(',') | Some('{') | Some('['))
}

/// A quote at `at` ends a literal when the next character on the same line
/// is a structural delimiter, or the line/text ends.
fn closes_literal(chars: &[char], at: usize) -> bool {
    let next = chars[at + 1..]
        .iter()
        .find(|c| !matches!(c, ' ' | '\t' | '\r'));
    matches!(
        next,
        None | Some(':') | Some(',') | Some('}') | Some(']') | Some('\n')
    )
}

fn next_non_whitespace(chars: &[char], from: usize) -> Option<char> {
    chars.get(from..)?.iter().find(|c| !c.is_whitespace()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_keeps_urls_inside_strings() {
        let input = "{\n  \"site\": \"https://example.com\", // homepage\n  # note\n  \"n\": 1\n}";
        let out = strip_comments(input);
        assert!(out.contains("https://example.com"));
        assert!(!out.contains("homepage"));
        assert!(!out.contains("note"));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["n"], 1);
    }

    #[test]
    fn test_strip_comments_hash_inside_string_untouched() {
        let input = r#"{"tag": "C# developer"}"#;
        assert_eq!(strip_comments(input), input);
    }

    #[test]
    fn test_single_quotes_converted() {
        let out = convert_single_quotes("{'name': 'Li Lei', 'tags': ['a', 'b']}");
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["name"], "Li Lei");
        assert_eq!(v["tags"][1], "b");
    }

    #[test]
    fn test_single_quotes_escape_inner_double_quote_and_keep_apostrophe() {
        let out = convert_single_quotes(r#"{'quote': 'he said "go"', 'note': 'it's fine'}"#);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["quote"], "he said \"go\"");
        assert_eq!(v["note"], "it's fine");
    }

    #[test]
    fn test_single_quotes_leave_apostrophes_in_double_strings() {
        let input = r#"{"note": "don't touch"}"#;
        assert_eq!(convert_single_quotes(input), input);
    }

    #[test]
    fn test_trailing_commas_removed() {
        let out = remove_trailing_commas("{\"a\": [1, 2, ],\n \"b\": {\"c\": 3,\n},\n}");
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["a"][1], 2);
        assert_eq!(v["b"]["c"], 3);
    }

    #[test]
    fn test_trailing_comma_inside_string_kept() {
        let input = r#"{"a": "x, }"}"#;
        assert_eq!(remove_trailing_commas(input), input);
    }

    #[test]
    fn test_inner_quotes_escaped() {
        let out = escape_inner_quotes(r#"{"title": "the "best" team", "n": "1"}"#);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["title"], "the \"best\" team");
        assert_eq!(v["n"], "1");
    }

    #[test]
    fn test_inner_quotes_valid_json_unchanged() {
        let input = "{\"a\": \"x\",\n \"b\": [\"y\", \"z\"]\n}";
        assert_eq!(escape_inner_quotes(input), input);
    }
}
