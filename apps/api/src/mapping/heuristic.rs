//! Tier B: resolve template fields without a cached rule.
//!
//! Lookups go exact key, then synonym, then a short alias table for fields
//! whose meaning is ambiguous. Nothing here fails; a miss is `None`.

use serde_json::Value;

use crate::extraction::models::{
    dedup_preserving_order, CanonicalResume, Descriptive, Education, Project, Skills, WorkExperience,
};
use crate::extraction::normalize::normalize_date;
use crate::mapping::models::FieldSpec;
use crate::mapping::synonyms;

pub const PRESENT_LABEL: &str = "present";

/// Basic-info aliases: template field → basic-info keys tried in order.
const BASIC_ALIASES: &[(&str, &[&str])] = &[
    ("current_location", &["location", "work_location"]),
    ("location", &["location", "work_location"]),
    ("work_location", &["work_location", "location"]),
    ("current_work_location", &["work_location", "location"]),
    ("website", &["website", "website_url"]),
    ("website_url", &["website_url", "website"]),
    ("linkedin", &["linkedin", "linkedin_url"]),
    ("linkedin_url", &["linkedin_url", "linkedin"]),
    ("birthday", &["birth_date", "birthday", "出生日期", "出生年月"]),
    ("birth_date", &["birth_date", "birthday", "出生日期", "出生年月"]),
    ("gender", &["gender", "性别", "性"]),
];

/// `start - end`, or `start - present` for an ongoing entry. Blank without a start.
pub fn format_period(start: Option<&str>, end: Option<&str>, is_current: bool) -> String {
    let start = start.map(normalize_date).unwrap_or_default();
    if start.is_empty() {
        return String::new();
    }
    let end = end.map(normalize_date).unwrap_or_default();
    if is_current || end.is_empty() {
        format!("{start} - {PRESENT_LABEL}")
    } else {
        format!("{start} - {end}")
    }
}

fn text(value: impl Into<String>) -> Option<Value> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(Value::String(value))
}

fn opt_text(value: Option<&str>) -> Option<Value> {
    value.and_then(|v| text(v))
}

fn list(items: Vec<String>) -> Option<Value> {
    (!items.is_empty()).then(|| Value::Array(items.into_iter().map(Value::String).collect()))
}

fn descriptive(d: &Descriptive) -> Option<Value> {
    text(d.display_items().join(" "))
}

/// Candidate names for a field: its key, declared synonyms, and their canonical forms.
fn candidate_names(field: &FieldSpec, key: &str) -> Vec<String> {
    let mut names = vec![key.to_string(), synonyms::resolve(key)];
    for s in &field.synonyms {
        names.push(s.clone());
        names.push(synonyms::resolve(s));
    }
    names.dedup();
    names
}

// ────────────────────────────────────────────────────────────────────────────
// Object sections
// ────────────────────────────────────────────────────────────────────────────

pub fn basic_field(resume: &CanonicalResume, field: &FieldSpec, key: &str) -> Option<Value> {
    for name in candidate_names(field, key) {
        if let Some(v) = resume.basic(&name) {
            return text(v);
        }
    }

    let lowered = key.to_lowercase();
    if let Some((_, keys)) = BASIC_ALIASES.iter().find(|(alias, _)| *alias == lowered) {
        if let Some(v) = resume.basic_any(keys) {
            return text(v);
        }
    }

    // highest-education shortcuts for profile-style templates
    let first_edu = resume.education.first()?;
    match synonyms::resolve(key).as_str() {
        "education_level" => opt_text(first_edu.education_level.as_deref()),
        "degree" => opt_text(first_edu.degree.as_deref()),
        "school" => text(first_edu.school.clone()),
        "major" => opt_text(first_edu.major.as_deref()),
        _ => None,
    }
}

pub fn skills_field(skills: &Skills, key: &str) -> Option<Value> {
    match synonyms::resolve(key).as_str() {
        "technical" => list(skills.technical_union()),
        "soft" => list(skills.soft.clone()),
        "languages" => list(skills.languages.clone()),
        "skills" | "all" | "all_skills" => list(dedup_preserving_order(
            skills
                .technical_union()
                .into_iter()
                .chain(skills.soft.iter().cloned())
                .chain(skills.languages.iter().cloned()),
        )),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collection rows
// ────────────────────────────────────────────────────────────────────────────

pub fn work_field(exp: &WorkExperience, field: &FieldSpec, key: &str) -> Option<Value> {
    for name in candidate_names(field, key) {
        let found = match name.as_str() {
            "company" => text(exp.company.clone()),
            "position" => text(exp.position.clone()),
            "location" | "work_location" => opt_text(exp.location.as_deref())
                .or_else(|| extra_text(&exp.extra, "work_location")),
            "start_date" => opt_text(exp.start_date.as_deref()),
            "end_date" => {
                if exp.is_current {
                    text(PRESENT_LABEL)
                } else {
                    opt_text(exp.end_date.as_deref())
                }
            }
            "period" => text(format_period(
                exp.start_date.as_deref(),
                exp.end_date.as_deref(),
                exp.is_current,
            )),
            "responsibilities" => descriptive(&exp.responsibilities),
            "achievements" => descriptive(&exp.achievements),
            "skills_used" => list(dedup_preserving_order(
                exp.skills_used
                    .explicit
                    .iter()
                    .chain(exp.skills_used.implicit.iter())
                    .cloned(),
            )),
            "team_size" => exp.implicit_info.team_size.as_ref().and_then(|i| text(i.value.clone())),
            "business_domain" => exp
                .implicit_info
                .business_domain
                .as_ref()
                .and_then(|i| text(i.value.clone())),
            "tech_stack" => exp
                .implicit_info
                .tech_stack
                .as_ref()
                .and_then(|i| list(i.value.clone())),
            "report_to" => opt_text(exp.report_to.as_deref()),
            "reason_for_leaving" => opt_text(exp.reason_for_leaving.as_deref()),
            other => extra_value(&exp.extra, other),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn education_field(edu: &Education, field: &FieldSpec, key: &str) -> Option<Value> {
    for name in candidate_names(field, key) {
        let found = match name.as_str() {
            "school" => text(edu.school.clone()),
            "major" => opt_text(edu.major.as_deref()),
            "degree" => opt_text(edu.degree.as_deref()),
            // never filled from `degree`
            "education_level" => opt_text(edu.education_level.as_deref()),
            "start_date" => opt_text(edu.start_date.as_deref()),
            "end_date" | "graduation_date" => opt_text(edu.graduation_date.as_deref()),
            "period" => text(format_period(
                edu.start_date.as_deref(),
                edu.graduation_date.as_deref(),
                false,
            )),
            other => extra_value(&edu.extra, other),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn project_field(project: &Project, field: &FieldSpec, key: &str) -> Option<Value> {
    for name in candidate_names(field, key) {
        let found = match name.as_str() {
            "name" | "project_name" => text(project.name.clone()),
            "description" => descriptive(&project.description),
            "role" => opt_text(project.role.as_deref())
                .or_else(|| text(project.responsibilities.join("；"))),
            "achievements" | "project_achievements" => {
                descriptive(&project.achievements).or_else(|| opt_text(project.outcome.as_deref()))
            }
            "outcome" => opt_text(project.outcome.as_deref()),
            "responsibilities" => list(project.responsibilities.clone()),
            "start_date" => opt_text(project.start_date.as_deref()),
            "end_date" => opt_text(project.end_date.as_deref()),
            "period" => text(format_period(
                project.start_date.as_deref(),
                project.end_date.as_deref(),
                false,
            )),
            other => extra_value(&project.extra, other),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn extra_value(extra: &std::collections::BTreeMap<String, Value>, key: &str) -> Option<Value> {
    extra
        .get(key)
        .filter(|v| !crate::mapping::text::is_blank(v))
        .cloned()
}

fn extra_text(extra: &std::collections::BTreeMap<String, Value>, key: &str) -> Option<Value> {
    extra.get(key).and_then(Value::as_str).and_then(|s| text(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::models::{ImplicitAttributes, Inferred, TechnicalSkills};
    use serde_json::json;

    #[test]
    fn test_period_scenarios() {
        assert_eq!(format_period(Some("2020-01"), None, true), "2020-01 - present");
        assert_eq!(format_period(Some("2020-01"), Some(""), true), "2020-01 - present");
        assert_eq!(format_period(Some("2020.1"), Some("2023年6月"), false), "2020-01 - 2023-06");
        assert_eq!(format_period(None, Some("2023-06"), false), "");
    }

    #[test]
    fn test_basic_aliases() {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("work_location".into(), "Hangzhou".into());
        resume.basic_info.insert("性".into(), "男".into());
        resume.basic_info.insert("website_url".into(), "https://x.dev".into());

        let f = FieldSpec::simple("current_location");
        assert_eq!(basic_field(&resume, &f, "current_location"), Some(json!("Hangzhou")));
        assert_eq!(basic_field(&resume, &f, "gender"), Some(json!("男")));
        assert_eq!(basic_field(&resume, &f, "website"), Some(json!("https://x.dev")));
        assert_eq!(basic_field(&resume, &f, "nickname"), None);
    }

    #[test]
    fn test_field_synonyms_from_template() {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("phone".into(), "138-0000-0000".into());
        let f = FieldSpec {
            synonyms: vec!["联系电话".into()],
            ..FieldSpec::simple("contact")
        };
        assert_eq!(basic_field(&resume, &f, "contact"), Some(json!("138-0000-0000")));
    }

    #[test]
    fn test_work_row_fields() {
        let exp = WorkExperience {
            company: "Acme".into(),
            start_date: Some("2020-01".into()),
            is_current: true,
            responsibilities: Descriptive::enhanced(vec!["raw".into()], vec!["Built it".into(), "Ran it".into()]),
            implicit_info: ImplicitAttributes {
                team_size: Some(Inferred {
                    value: "12".into(),
                    basis: None,
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let f = FieldSpec::simple("x");
        assert_eq!(work_field(&exp, &f, "period"), Some(json!("2020-01 - present")));
        assert_eq!(work_field(&exp, &f, "公司"), Some(json!("Acme")));
        assert_eq!(work_field(&exp, &f, "responsibilities"), Some(json!("Built it Ran it")));
        assert_eq!(work_field(&exp, &f, "team_size"), Some(json!("12")));
        assert_eq!(work_field(&exp, &f, "business_domain"), None);
    }

    #[test]
    fn test_education_level_not_from_degree() {
        let edu = Education {
            school: "PKU".into(),
            degree: Some("硕士".into()),
            ..Default::default()
        };
        assert_eq!(education_field(&edu, &FieldSpec::simple("x"), "education_level"), None);
        assert_eq!(education_field(&edu, &FieldSpec::simple("x"), "学位"), Some(json!("硕士")));
    }

    #[test]
    fn test_project_role_falls_back_to_responsibilities() {
        let p = Project {
            name: "Search".into(),
            responsibilities: vec!["设计".into(), "开发".into()],
            outcome: Some("QPS x3".into()),
            ..Default::default()
        };
        let f = FieldSpec::simple("x");
        assert_eq!(project_field(&p, &f, "project_role"), Some(json!("设计；开发")));
        assert_eq!(project_field(&p, &f, "project_achievements"), Some(json!("QPS x3")));
        assert_eq!(project_field(&p, &f, "项目名称"), Some(json!("Search")));
        assert_eq!(project_field(&p, &f, "project_name"), Some(json!("Search")));
    }

    #[test]
    fn test_skills_lists() {
        let skills = Skills {
            technical: TechnicalSkills {
                explicit: vec!["Rust".into()],
                inferred: vec!["rust".into(), "Linux".into()],
            },
            soft: vec!["沟通".into()],
            languages: vec![],
        };
        assert_eq!(skills_field(&skills, "technical_ability"), Some(json!(["Rust", "Linux"])));
        assert_eq!(skills_field(&skills, "soft_skills"), Some(json!(["沟通"])));
        assert_eq!(skills_field(&skills, "languages"), None);
    }
}
