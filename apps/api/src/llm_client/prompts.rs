// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to prompts whose answers must come from the supplied material only.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    Use only information present in the material provided. \
    If a value cannot be determined, return an empty string or an empty list for it. \
    Never invent names, dates, companies or numbers.";

/// Fills `{name}` placeholders in a prompt template.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let out = render("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y and x");
    }
}
