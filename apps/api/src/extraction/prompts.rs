// Resume parsing prompt templates.

pub const RESUME_PARSE_SYSTEM: &str = "\
You are a precise resume data extractor. \
Convert resume text into structured JSON following the schema exactly. \
Respond with valid JSON only, no markdown fences and no explanations. \
Never invent facts that are not in the text. \
Keep education_level (the tier: high school, associate, bachelor, graduate) \
separate from degree (the title: bachelor's, master's, doctorate).";

pub const RESUME_PARSE_PROMPT_TEMPLATE: &str = r#"Extract the following resume into JSON.

RESUME TEXT:
{raw_text}

OUTPUT SCHEMA:
{
  "basic_info": {
    "name": "string", "gender": "string", "birth_date": "YYYY-MM",
    "phone": "string", "email": "string", "location": "string",
    "work_location": "string", "education_level": "string"
  },
  "work_experiences": [{
    "company": "string", "position": "string",
    "start_date": "YYYY-MM", "end_date": "YYYY-MM" | "", "is_current": true | false,
    "location": "string",
    "responsibilities": {"raw": ["string"], "optimized": ["string"]},
    "achievements": {"raw": ["string"], "optimized": ["string"]},
    "skills_used": {"explicit": ["string"], "implicit": ["string"]},
    "implicit_info": {
      "team_size": {"value": "string", "basis": "string"},
      "business_domain": {"value": "string", "basis": "string"},
      "tech_stack": {"value": ["string"], "basis": "string"}
    },
    "report_to": "string", "reason_for_leaving": "string"
  }],
  "education": [{
    "school": "string", "major": "string", "degree": "string",
    "education_level": "string", "start_date": "YYYY-MM", "graduation_date": "YYYY-MM"
  }],
  "skills": {
    "technical": {"explicit": ["string"], "inferred": ["string"]},
    "soft": ["string"],
    "languages": ["string"]
  },
  "projects": [{
    "name": "string", "role": "string",
    "description": {"raw": ["string"], "optimized": ["string"]},
    "responsibilities": ["string"],
    "achievements": {"raw": ["string"], "optimized": ["string"]},
    "outcome": "string", "start_date": "YYYY-MM", "end_date": "YYYY-MM"
  }]
}

RULES:
- "raw" keeps the original wording; "optimized" is a concise rewrite of the same facts.
- Use "" or [] for anything the text does not state.
- An ongoing job has is_current = true and an empty end_date.
- Inferred attributes must cite their basis in the text."#;
