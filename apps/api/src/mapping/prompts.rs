// LLM prompt constants for the Mapping module.

/// System prompt for template analysis.
pub const ANALYZE_SYSTEM: &str =
    "You are an expert in resume templates and structured resume data. \
    Decide, for every template field, where its value comes from in a parsed resume. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Template analysis prompt. Replace `{template_summary}` before sending.
pub const ANALYZE_PROMPT_TEMPLATE: &str = r#"Analyze this resume template and produce field mapping rules.

TEMPLATE (sections and fields):
{template_summary}

The parsed resume has this structure (prefix every path with `parsed_data.`):
- basic_info: {name, gender, birth_date, phone, email, location, work_location, ...}
- work_experiences[]: {company, position, start_date, end_date, is_current, location,
  responsibilities, achievements, skills_used, implicit_info{team_size, business_domain, tech_stack}}
- education[]: {school, major, degree, education_level, start_date, graduation_date}
- skills: {technical{explicit, inferred}, soft, languages}
- projects[]: {name, description, role, responsibilities, achievements, outcome}

Return JSON with this EXACT schema:
{
  "field_mapping": {
    "<section type>": {
      "<field id>": {
        "data_source": "parsed_data.basic_info.location || parsed_data.basic_info.work_location",
        "type": "direct | fallback | combine",
        "transform": null,
        "needs_ai_extraction": false
      }
    }
  },
  "complex_fields": ["<field ids that need generated content>"]
}

Rules:
- Use `[]` after a collection name for per-row fields: "parsed_data.work_experiences[].company".
- Use `||` for fallbacks and type "fallback".
- A period field built from start and end dates uses type "combine" with
  transform "combine(start_date, end_date)".
- education_level is the degree tier (本科/研究生/high school/bachelor/graduate); never map it from degree.
- Set needs_ai_extraction to true only when no path can supply the value."#;

/// System prompt for single-field external fill.
pub const FIELD_FILL_SYSTEM: &str =
    "You fill one field of a resume template from a small piece of resume data. \
    You MUST respond with valid JSON only, in the form {\"<field id>\": <value>}.";

/// Field fill prompt. Replace `{field_id}`, `{field_label}`, `{field_description}`,
/// `{field_shape}` and `{context}`.
pub const FIELD_FILL_PROMPT_TEMPLATE: &str = r#"Fill the template field below.

FIELD ID: {field_id}
LABEL: {field_label}
DESCRIPTION: {field_description}
EXPECTED SHAPE: {field_shape}

DATA:
{context}

Return exactly: {"{field_id}": <value>}
For shape "list" return an array of short strings; for "textarea" return a single string
that may contain line breaks; otherwise a single-line string."#;

/// System prompt for filling a template that declares no sections.
pub const TEMPLATE_FILL_SYSTEM: &str =
    "You lay out resume data into a document template. \
    You MUST respond with valid JSON only.";

/// Whole-template fill prompt. Replace `{template}` and `{resume}`.
pub const TEMPLATE_FILL_PROMPT_TEMPLATE: &str = r#"The template below has no machine-readable sections.
Produce its sections from the resume.

TEMPLATE:
{template}

RESUME:
{resume}

Return JSON: {"components": [{"type": "<section type>", "title": "<title>", "fields": [{"id": "<field id>"}], "data": {...}}]}
Object sections put values in data as {field_id: value}; list sections as {"rows": [{field_id: value}]}."#;
