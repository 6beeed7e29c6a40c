//! Builds a [`CanonicalResume`] from the recovered parser output.
//!
//! Reads are tolerant: a field of the wrong shape is treated as absent rather
//! than rejecting the whole resume. Problems worth a human look end up in
//! `CanonicalResume::warnings`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::extraction::credentials::{self, AcademicLevel, CredentialKind};
use crate::extraction::models::{
    dedup_preserving_order, CanonicalResume, Descriptive, Education, ImplicitAttributes, Inferred,
    Project, Skills, SkillsUsed, TechnicalSkills, WorkExperience,
};
use crate::extraction::recovery::PartialParse;
use crate::mapping::synonyms;

const PRESENT_WORDS: &[&str] = &["至今", "现在", "目前", "今", "present", "now", "current", "today"];

const WORK_KNOWN_KEYS: &[&str] = &[
    "company",
    "position",
    "title",
    "job_title",
    "start_date",
    "end_date",
    "is_current",
    "location",
    "work_location",
    "responsibilities",
    "achievements",
    "skills_used",
    "implicit_info",
    "report_to",
    "reason_for_leaving",
];

const EDUCATION_KNOWN_KEYS: &[&str] = &[
    "school",
    "university",
    "college",
    "major",
    "degree",
    "education_level",
    "degree_level",
    "start_date",
    "end_date",
    "graduation_date",
];

const PROJECT_KNOWN_KEYS: &[&str] = &[
    "name",
    "project_name",
    "description",
    "content",
    "project_description",
    "role",
    "project_role",
    "responsibilities",
    "achievements",
    "outcome",
    "start_date",
    "end_date",
];

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4})\s*[年./\-]\s*(\d{1,2})").expect("date pattern is valid")
    })
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{4})\s*年?\s*$").expect("year pattern is valid"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
    })
}

/// Normalizes a recovered parser payload. Never fails: missing sections
/// become empty collections.
pub fn normalize_resume(value: &Value, partial: Option<PartialParse>) -> CanonicalResume {
    let empty = Map::new();
    let root = value.as_object().unwrap_or(&empty);
    let mut warnings = Vec::new();

    let basic_info = root
        .get("basic_info")
        .and_then(Value::as_object)
        .map(|m| normalize_basic_info(m, &mut warnings))
        .unwrap_or_default();

    let mut work_experiences: Vec<WorkExperience> = array_of(root, &["work_experiences", "work_experience"])
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(idx, m)| normalize_work(m, idx, &mut warnings))
        .collect();
    sort_work_experiences(&mut work_experiences);

    let education = array_of(root, &["education", "educations"])
        .iter()
        .filter_map(Value::as_object)
        .map(normalize_education)
        .collect();

    let skills = root.get("skills").map(normalize_skills).unwrap_or_default();

    let projects = array_of(root, &["projects", "project_experiences"])
        .iter()
        .filter_map(Value::as_object)
        .map(normalize_project)
        .collect();

    if partial.is_some() {
        warnings.push("resume was recovered from truncated model output; some data may be missing".to_string());
    }

    CanonicalResume {
        basic_info,
        work_experiences,
        education,
        skills,
        projects,
        partial,
        warnings,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering
// ────────────────────────────────────────────────────────────────────────────

/// Canonical work ordering: current job first, then newest start date first.
/// Entries without a recognisable start date sort last; ties keep source order.
pub fn sort_work_experiences(experiences: &mut [WorkExperience]) {
    experiences.sort_by(|a, b| {
        b.is_current
            .cmp(&a.is_current)
            .then_with(|| compare_start_desc(a, b))
    });
}

fn compare_start_desc(a: &WorkExperience, b: &WorkExperience) -> Ordering {
    let key = |e: &WorkExperience| e.start_date.as_deref().and_then(year_month);
    match (key(a), key(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dates
// ────────────────────────────────────────────────────────────────────────────

/// Parses `2020-1`, `2020.01`, `2020/1`, `2020年1月`, or a bare year.
pub fn year_month(text: &str) -> Option<(i32, u32)> {
    if let Some(caps) = date_regex().captures(text) {
        let year = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return (1..=12).contains(&month).then_some((year, month));
    }
    let caps = year_regex().captures(text)?;
    Some((caps[1].parse().ok()?, 1))
}

/// `YYYY-MM` when the text holds a recognisable date, otherwise the trimmed text.
pub fn normalize_date(text: &str) -> String {
    match year_month(text) {
        Some((y, m)) => format!("{y:04}-{m:02}"),
        None => text.trim().to_string(),
    }
}

pub fn is_present_marker(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    PRESENT_WORDS.iter().any(|w| lowered == *w)
}

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

fn normalize_basic_info(map: &Map<String, Value>, warnings: &mut Vec<String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    // canonical keys first so a synonym never shadows the real key
    let (canonical, other): (Vec<_>, Vec<_>) = map
        .iter()
        .partition(|(k, _)| synonyms::resolve(k) == k.as_str());

    for (key, value) in canonical.into_iter().chain(other) {
        let Some(text) = scalar_text(value) else { continue };
        let resolved = synonyms::resolve(key);
        if out.contains_key(resolved.as_str()) {
            out.entry(key.clone()).or_insert(text);
        } else {
            out.insert(resolved, text);
        }
    }

    if let Some(phone) = out.get("phone").map(|p| normalize_phone(p)) {
        out.insert("phone".to_string(), phone);
    }
    if let Some(email) = out.get("email") {
        if !email_regex().is_match(email) {
            warnings.push(format!("basic_info.email '{email}' does not look like an email address"));
        }
    }
    out
}

/// Keeps digits and `+`; an 11-digit mobile number is grouped 3-4-4.
pub fn normalize_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.len() == 11 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &cleaned[..3], &cleaned[3..7], &cleaned[7..])
    } else if cleaned.is_empty() {
        phone.trim().to_string()
    } else {
        cleaned
    }
}

fn normalize_work(map: &Map<String, Value>, idx: usize, warnings: &mut Vec<String>) -> WorkExperience {
    let start_date = text_of(map, &["start_date"]).map(|s| normalize_date(&s));
    let raw_end = text_of(map, &["end_date"]);
    let ended_now = raw_end.as_deref().map(is_present_marker).unwrap_or(false);
    let is_current = map.get("is_current").map(truthy).unwrap_or(false) || ended_now;
    let end_date = if is_current {
        None
    } else {
        raw_end.map(|s| normalize_date(&s))
    };

    if let (Some(start), Some(end)) = (
        start_date.as_deref().and_then(year_month),
        end_date.as_deref().and_then(year_month),
    ) {
        if start > end {
            warnings.push(format!(
                "work_experiences[{idx}] starts ({}-{:02}) after it ends ({}-{:02})",
                start.0, start.1, end.0, end.1
            ));
        }
    }

    let skills_used = match map.get("skills_used") {
        Some(Value::Object(m)) => SkillsUsed {
            explicit: string_list(m.get("explicit")),
            implicit: string_list(m.get("implicit")),
        },
        other => SkillsUsed {
            explicit: string_list(other),
            implicit: Vec::new(),
        },
    };

    WorkExperience {
        company: text_of(map, &["company"])
            .map(|c| collapse_whitespace(&c))
            .unwrap_or_default(),
        position: text_of(map, &["position", "title", "job_title"]).unwrap_or_default(),
        start_date,
        end_date,
        is_current,
        location: text_of(map, &["location", "work_location"]),
        responsibilities: descriptive(map.get("responsibilities")),
        achievements: descriptive(map.get("achievements")),
        skills_used,
        implicit_info: map
            .get("implicit_info")
            .and_then(Value::as_object)
            .map(implicit_attributes)
            .unwrap_or_default(),
        report_to: text_of(map, &["report_to"]),
        reason_for_leaving: text_of(map, &["reason_for_leaving"]),
        extra: extra_fields(map, WORK_KNOWN_KEYS),
    }
}

fn implicit_attributes(map: &Map<String, Value>) -> ImplicitAttributes {
    let inferred_text = |key: &str, basis_key: &str| -> Option<Inferred<String>> {
        match map.get(key) {
            Some(Value::Object(o)) => text_of(o, &["value"]).map(|value| Inferred {
                value,
                basis: text_of(o, &["basis"]),
            }),
            Some(v) => scalar_text(v).map(|value| Inferred {
                value,
                basis: text_of(map, &[basis_key]),
            }),
            None => None,
        }
    };

    let tech_stack = match map.get("tech_stack") {
        Some(Value::Object(o)) => Some(Inferred {
            value: string_list(o.get("value")),
            basis: text_of(o, &["basis"]),
        }),
        Some(v) => Some(Inferred {
            value: string_list(Some(v)),
            basis: text_of(map, &["tech_stack_basis"]),
        }),
        None => None,
    }
    .filter(|t| !t.value.is_empty());

    ImplicitAttributes {
        team_size: inferred_text("team_size", "team_size_basis"),
        business_domain: inferred_text("business_domain", "domain_basis"),
        tech_stack,
    }
}

fn normalize_education(map: &Map<String, Value>) -> Education {
    let mut degree = text_of(map, &["degree"]);
    let mut education_level = text_of(map, &["education_level", "degree_level"]);

    // a tier word in `degree` belongs in `education_level`
    if let Some(d) = degree.as_deref() {
        if let Some(c) = credentials::classify(d) {
            if c.kind == CredentialKind::Tier && d.trim() != "研究生" {
                if education_level.is_none() {
                    education_level = Some(d.trim().to_string());
                }
                degree = None;
            }
        }
    }
    if let Some(d) = degree.as_deref() {
        if let Some(title) = credentials::canonical_title(d) {
            degree = Some(title.to_string());
        }
    }

    education_level = reconcile_education_level(degree.as_deref(), education_level);

    Education {
        school: text_of(map, &["school", "university", "college"]).unwrap_or_default(),
        major: text_of(map, &["major"]),
        degree,
        education_level,
        start_date: text_of(map, &["start_date"]).map(|s| normalize_date(&s)),
        graduation_date: text_of(map, &["graduation_date", "end_date"]).map(|s| normalize_date(&s)),
        extra: extra_fields(map, EDUCATION_KNOWN_KEYS),
    }
}

/// `education_level` must be a tier, never a copy of a master's/doctorate title.
/// A graduate degree with a missing, bachelor or title-shaped level becomes the
/// graduate tier; a level holding a title otherwise becomes that title's tier.
fn reconcile_education_level(degree: Option<&str>, level: Option<String>) -> Option<String> {
    let degree_level = degree.and_then(credentials::level_of);
    let level_credential = level.as_deref().and_then(credentials::classify);

    if let Some(dl @ (AcademicLevel::Master | AcademicLevel::Doctorate)) = degree_level {
        let sample = degree.unwrap_or_default();
        let needs_fix = match level_credential {
            None => true,
            Some(c) => c.kind == CredentialKind::Title || c.level < AcademicLevel::Master,
        };
        if needs_fix {
            debug!(?dl, ?level, "education_level corrected to graduate tier");
            return Some(credentials::graduate_tier_label(sample).to_string());
        }
        return level;
    }

    match (level, level_credential) {
        (Some(l), Some(c)) if c.kind == CredentialKind::Title => {
            Some(credentials::tier_label(c.level, &l).to_string())
        }
        (level, _) => level,
    }
}

fn normalize_skills(value: &Value) -> Skills {
    match value {
        Value::Object(map) => {
            let technical = match map.get("technical").or_else(|| map.get("technical_skills")) {
                Some(Value::Object(t)) => TechnicalSkills {
                    explicit: string_list(t.get("explicit")),
                    inferred: string_list(t.get("inferred")),
                },
                other => TechnicalSkills {
                    explicit: string_list(other),
                    inferred: Vec::new(),
                },
            };
            Skills {
                technical,
                soft: string_list(map.get("soft").or_else(|| map.get("soft_skills"))),
                languages: string_list(map.get("languages").or_else(|| map.get("language_ability"))),
            }
        }
        other => Skills {
            technical: TechnicalSkills {
                explicit: string_list(Some(other)),
                inferred: Vec::new(),
            },
            ..Default::default()
        },
    }
}

fn normalize_project(map: &Map<String, Value>) -> Project {
    let description = ["description", "content", "project_description"]
        .iter()
        .map(|k| descriptive(map.get(*k)))
        .find(|d| !d.is_empty())
        .unwrap_or_default();

    Project {
        name: text_of(map, &["name", "project_name"]).unwrap_or_default(),
        description,
        role: text_of(map, &["role", "project_role"]),
        responsibilities: string_list(map.get("responsibilities")),
        achievements: descriptive(map.get("achievements")),
        outcome: text_of(map, &["outcome"]),
        start_date: text_of(map, &["start_date"]).map(|s| normalize_date(&s)),
        end_date: text_of(map, &["end_date"]).map(|s| normalize_date(&s)),
        extra: extra_fields(map, PROJECT_KNOWN_KEYS),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tolerant readers
// ────────────────────────────────────────────────────────────────────────────

fn array_of<'a>(root: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|k| root.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// A scalar as display text; raw/optimized objects collapse to their display form.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(o) => {
            let d = descriptive(Some(value));
            if d.is_empty() {
                o.get("value").and_then(scalar_text).unwrap_or_default()
            } else {
                d.display_items().join(" ")
            }
        }
        Value::Null => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

fn text_of(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(scalar_text))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => dedup_preserving_order(items.iter().filter_map(scalar_text)),
        Some(Value::String(s)) => dedup_preserving_order(
            s.split([',', '，', '、', ';', '；'])
                .map(str::to_string),
        ),
        Some(v @ Value::Number(_)) => scalar_text(v).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn descriptive(value: Option<&Value>) -> Descriptive {
    let lines = |v: Option<&Value>| -> Vec<String> {
        match v {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(other) => scalar_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    };
    match value {
        Some(Value::Object(o)) if o.contains_key("raw") || o.contains_key("optimized") => {
            let raw = lines(o.get("raw"));
            match o.get("optimized") {
                Some(opt) => Descriptive::enhanced(raw, lines(Some(opt))),
                None => Descriptive::plain(raw),
            }
        }
        Some(Value::Object(_)) | None | Some(Value::Null) => Descriptive::default(),
        other => Descriptive::plain(lines(other)),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1" | "是"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn extra_fields(map: &Map<String, Value>, known: &[&str]) -> BTreeMap<String, Value> {
    map.iter()
        .filter(|(k, v)| !known.contains(&k.as_str()) && !k.starts_with('_') && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
