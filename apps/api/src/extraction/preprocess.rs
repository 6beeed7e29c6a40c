//! Cleanup of extracted resume text before it is sent to the model.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

pub const MAX_TEXT_CHARS: usize = 30_000;

const TRUNCATION_MARGIN: usize = 100;
const WORK_KEYWORDS: &[&str] = &[
    "公司", "职位", "岗位", "部门", "负责", "职责", "工作", "项目", "业绩", "管理", "团队", "汇报",
    "company", "position", "responsib", "work", "project",
];

fn page_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(第?\s*\d{1,3}\s*页?(\s*/\s*\d{1,3}\s*页?)?|page\s*\d{1,3}(\s*(of|/)\s*\d{1,3})?|-\s*\d{1,3}\s*-)$")
            .expect("page number pattern is valid")
    })
}

/// Drops blank and page-number lines, collapses spaces, and truncates overlong
/// text at a paragraph or sentence boundary.
pub fn preprocess_text(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| l.chars().count() >= 2 && !is_page_marker(l))
        .collect();
    let cleaned = lines.join("\n");

    let len = cleaned.chars().count();
    if len <= MAX_TEXT_CHARS {
        debug!(chars = len, "resume text within limit");
        return cleaned;
    }
    let truncated = smart_truncate(&cleaned, MAX_TEXT_CHARS);
    warn!(
        original_chars = len,
        kept_chars = truncated.chars().count(),
        "resume text truncated before parsing"
    );
    truncated
}

fn is_page_marker(line: &str) -> bool {
    let lower = line.to_lowercase();
    if WORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return false;
    }
    page_number_regex().is_match(line.trim())
}

/// Cuts at the last newline or sentence end in the final fifth of the window.
fn smart_truncate(text: &str, max_chars: usize) -> String {
    let target = max_chars.saturating_sub(TRUNCATION_MARGIN);
    let byte_end = text.char_indices().nth(target).map_or(text.len(), |(i, _)| i);
    let window = &text[..byte_end];
    let floor = window.len() * 4 / 5;

    let cut = window
        .rfind('\n')
        .filter(|&i| i > floor)
        .or_else(|| {
            ["。", "；", ". ", "; "]
                .iter()
                .filter_map(|end| window.rfind(end).map(|i| i + end.len()))
                .filter(|&i| i > floor)
                .max()
        })
        .unwrap_or(window.len());

    let mut out = window[..cut].trim_end().to_string();
    out.push_str(&format!(
        "\n\n[text truncated: kept {} of {} characters]",
        out.chars().count(),
        text.chars().count()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_blank_and_page_lines() {
        let text = "Li Lei\n\n  page 2  \n第3页\n- 4 -\nSoftware   Engineer at Acme\nx\n2019.4-2022.6";
        assert_eq!(
            preprocess_text(text),
            "Li Lei\nSoftware Engineer at Acme\n2019.4-2022.6"
        );
    }

    #[test]
    fn test_work_lines_and_years_survive() {
        assert_eq!(preprocess_text("项目 12"), "项目 12");
        assert_eq!(preprocess_text("2019"), "2019");
    }

    #[test]
    fn test_long_text_truncated_on_line_boundary() {
        let line = "a".repeat(99);
        let text = vec![line; 400].join("\n");
        let out = preprocess_text(&text);
        assert!(out.chars().count() < MAX_TEXT_CHARS);
        let body = out.split("\n\n[text truncated").next().unwrap();
        assert!(body.lines().all(|l| l.len() == 99));
        assert!(out.contains("[text truncated: kept"));
    }
}
