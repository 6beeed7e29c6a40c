// LLM prompt constants for the Matching module.

/// System prompt for candidate/job analysis.
pub const MATCH_ANALYSIS_SYSTEM: &str =
    "You are a senior technical recruiter who evaluates how well a candidate fits a position. \
    Judge skills, experience, organisational fit and culture fit, and name concrete risks. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Match analysis prompt. Replace `{job}`, `{resume}` and `{constraints}` before sending.
pub const MATCH_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Evaluate this candidate against the position.

POSITION:
{job}

CANDIDATE (parsed resume, JSON):
{resume}

Assess:
1. Skill match: do the candidate's skills cover the position's requirements?
2. Experience match: seniority, domain and scope of past roles.
3. Organisational fit: suitability for the team and its way of working.
4. Culture fit: alignment with the company's values.
5. Risks: e.g. frequent job changes, skill gaps, unexplained gaps.
6. An overall score from 0 to 10.

Return JSON with this EXACT schema:
{
  "score": 7.5,
  "strengths": ["<concrete strength>"],
  "weaknesses": ["<concrete gap>"],
  "risk_points": ["<risk>"],
  "organization_match": {"score": 8.0, "analysis": "<one or two sentences>"},
  "culture_match": {"score": 7.0, "analysis": "<one or two sentences>"},
  "recommendation": "strongly recommended | recommended | cautious | not recommended",
  "detailed_analysis": "<a short paragraph>"
}

All scores are numbers between 0 and 10.
{constraints}"#;
