//! One predicate per rule type. Each returns a verdict plus a reason that
//! names both the candidate's value and the requirement.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::{json, Value};

use crate::extraction::credentials::{level_of, AcademicLevel};
use crate::extraction::models::{CanonicalResume, WorkExperience};
use crate::extraction::normalize::year_month;
use crate::mapping::accessor::Accessor;
use crate::screening::models::{AgeTarget, Comparator, SkillMatch, AGE_TOLERANCE};

const BIRTH_KEYS: &[&str] = &["birth_date", "birthday", "出生日期", "出生年月"];
const LOCATION_KEYS: &[&str] = &["location", "current_location", "work_location"];

pub struct Verdict {
    pub passed: bool,
    pub reason: String,
    pub matched: Value,
    pub expected: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Education
// ────────────────────────────────────────────────────────────────────────────

/// Highest tier across every education entry, looking at both `degree` and
/// `education_level`.
pub fn highest_level(resume: &CanonicalResume) -> Option<(AcademicLevel, String)> {
    resume
        .education
        .iter()
        .flat_map(|e| [e.degree.as_deref(), e.education_level.as_deref()])
        .flatten()
        .filter_map(|label| level_of(label).map(|level| (level, label.to_string())))
        .max_by_key(|(level, _)| *level)
}

pub fn check_education(
    resume: &CanonicalResume,
    required: AcademicLevel,
    required_label: &str,
    comparator: Comparator,
) -> Verdict {
    let expected = json!(required_label);
    let Some((level, label)) = highest_level(resume) else {
        return Verdict {
            passed: false,
            reason: format!("no education information; required {comparator} {required_label}"),
            matched: Value::Null,
            expected,
        };
    };
    let passed = comparator.compare_numbers(f64::from(level.ordinal()), f64::from(required.ordinal()));
    Verdict {
        passed,
        reason: format!(
            "highest education {label} ({}), required {comparator} {required_label} ({})",
            level.ordinal(),
            required.ordinal()
        ),
        matched: json!(label),
        expected,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

fn first_of_month(text: &str) -> Option<NaiveDate> {
    let (year, month) = year_month(text)?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn span_days(exp: &WorkExperience, today: NaiveDate) -> i64 {
    let Some(start) = exp.start_date.as_deref().and_then(first_of_month) else {
        return 0;
    };
    let end = if exp.is_current {
        today
    } else {
        exp.end_date.as_deref().and_then(first_of_month).unwrap_or(today)
    };
    (end - start).num_days().max(0)
}

/// Total years of work, rounded to one decimal. A current, missing or
/// unreadable end date counts as `today`.
pub fn experience_years(resume: &CanonicalResume, today: NaiveDate) -> f64 {
    let days: i64 = resume.work_experiences.iter().map(|e| span_days(e, today)).sum();
    (days as f64 / 365.0 * 10.0).round() / 10.0
}

pub fn check_experience(resume: &CanonicalResume, years: f64, comparator: Comparator, today: NaiveDate) -> Verdict {
    let total = experience_years(resume, today);
    Verdict {
        passed: comparator.compare_numbers(total, years),
        reason: format!("{total} years of experience, required {comparator} {years}"),
        matched: json!(total),
        expected: json!(years),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

pub fn check_skills(resume: &CanonicalResume, required: &[String], match_type: SkillMatch) -> Verdict {
    let have: Vec<String> = resume
        .skills
        .technical_union()
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    let matched: Vec<&String> = required
        .iter()
        .filter(|r| have.contains(&r.trim().to_lowercase()))
        .collect();

    let (passed, mode) = match match_type {
        _ if required.is_empty() => (true, "no skills required"),
        SkillMatch::Any => (!matched.is_empty(), "any one required"),
        SkillMatch::All => (matched.len() == required.len(), "all required"),
    };
    Verdict {
        passed,
        reason: format!(
            "matched {} of {} required skills [{}] ({mode})",
            matched.len(),
            required.len(),
            required.join(", ")
        ),
        matched: json!(matched),
        expected: json!(required),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Age
// ────────────────────────────────────────────────────────────────────────────

fn birth_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4})\s*[-./年]\s*(\d{1,2})(?:\s*[-./月]\s*(\d{1,2}))?")
            .expect("birth date pattern is valid")
    })
}

pub fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    let caps = birth_regex().captures(text)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps.get(3).and_then(|d| d.as_str().parse().ok()).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn check_age(resume: &CanonicalResume, target: &AgeTarget, today: NaiveDate) -> Verdict {
    let expected = match target {
        AgeTarget::Range { min, max } => json!({"min": min, "max": max}),
        AgeTarget::Around { age } => json!(age),
        AgeTarget::Compare { age, .. } => json!(age),
    };
    let requirement = match target {
        AgeTarget::Range { min, max } => format!(
            "{}-{}",
            min.map_or("any".to_string(), |m| m.to_string()),
            max.map_or("any".to_string(), |m| m.to_string())
        ),
        AgeTarget::Around { age } => format!("{age} (±{AGE_TOLERANCE})"),
        AgeTarget::Compare { comparator, age } => format!("{comparator} {age}"),
    };

    let Some(birth) = resume.basic_any(BIRTH_KEYS).and_then(parse_birth_date) else {
        return Verdict {
            passed: false,
            reason: format!("no readable birth date; required age {requirement}"),
            matched: Value::Null,
            expected,
        };
    };
    let age = age_on(birth, today);
    let passed = match *target {
        AgeTarget::Range { min, max } => {
            min.map_or(true, |m| age >= m as i32) && max.map_or(true, |m| age <= m as i32)
        }
        AgeTarget::Around { age: t } => (age - t as i32).unsigned_abs() <= AGE_TOLERANCE,
        AgeTarget::Compare { comparator, age: t } => comparator.compare_numbers(f64::from(age), f64::from(t)),
    };
    Verdict {
        passed,
        reason: format!("age {age}, required {requirement}"),
        matched: json!(age),
        expected,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Location
// ────────────────────────────────────────────────────────────────────────────

pub fn check_location(resume: &CanonicalResume, accepted: &[String]) -> Verdict {
    let expected = json!(accepted);
    let location = resume.basic_any(LOCATION_KEYS);
    if accepted.is_empty() {
        return Verdict {
            passed: true,
            reason: "no location requirement".to_string(),
            matched: json!(location),
            expected,
        };
    }
    let Some(location) = location else {
        return Verdict {
            passed: false,
            reason: format!("no location information; accepted [{}]", accepted.join(", ")),
            matched: Value::Null,
            expected,
        };
    };

    let have = location.to_lowercase();
    // "北京" accepts "北京市" and the other way round
    let hit = accepted.iter().find(|want| {
        let want = want.to_lowercase();
        have.contains(&want) || want.contains(&have)
    });
    Verdict {
        passed: hit.is_some(),
        reason: format!(
            "location {location}, accepted [{}], matched {}",
            accepted.join(", "),
            hit.map_or("none", String::as_str)
        ),
        matched: json!(location),
        expected,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Custom
// ────────────────────────────────────────────────────────────────────────────

pub fn check_custom(
    document: &Value,
    path: &str,
    accessor: &Accessor,
    comparator: Comparator,
    expected: &Value,
) -> Verdict {
    match accessor.resolve(document) {
        None | Some(Value::Null) => Verdict {
            passed: false,
            reason: format!("field {path} not found; required {comparator} {expected}"),
            matched: Value::Null,
            expected: expected.clone(),
        },
        Some(actual) => Verdict {
            passed: comparator.compare_values(actual, expected),
            reason: format!("field {path} is {actual}, required {comparator} {expected}"),
            matched: actual.clone(),
            expected: expected.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::models::{Education, WorkExperience};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn job(start: &str, end: Option<&str>, current: bool) -> WorkExperience {
        WorkExperience {
            start_date: Some(start.into()),
            end_date: end.map(String::from),
            is_current: current,
            ..Default::default()
        }
    }

    #[test]
    fn test_experience_sums_spans_and_rounds() {
        let resume = CanonicalResume {
            work_experiences: vec![
                job("2022-06", None, true),
                job("2019.06", Some("2021.06"), false),
                job("2018-01", Some("2017-01"), false),
                job("unknown", Some("2020-01"), false),
            ],
            ..Default::default()
        };
        // 2022-06-01..2024-06-15 = 745 days, 2019-06..2021-06 = 731 days
        assert_eq!(experience_years(&resume, today()), 4.0);
    }

    #[test]
    fn test_missing_end_counts_until_today() {
        let resume = CanonicalResume {
            work_experiences: vec![job("2023-06", Some(""), false)],
            ..Default::default()
        };
        assert_eq!(experience_years(&resume, today()), 1.0);
    }

    #[test]
    fn test_highest_level_uses_degree_and_level() {
        let resume = CanonicalResume {
            education: vec![
                Education {
                    education_level: Some("本科".into()),
                    ..Default::default()
                },
                Education {
                    degree: Some("硕士".into()),
                    education_level: Some("研究生".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let (level, _) = highest_level(&resume).unwrap();
        assert_eq!(level, AcademicLevel::Master);
        let v = check_education(&resume, AcademicLevel::Bachelor, "本科", Comparator::Ge);
        assert!(v.passed);
        assert!(v.reason.contains("本科"));
    }

    #[test]
    fn test_age_birthday_not_yet_reached() {
        let birth = NaiveDate::from_ymd_opt(1990, 8, 1).unwrap();
        assert_eq!(age_on(birth, today()), 33);
        assert_eq!(parse_birth_date("1990年8月"), Some(birth));
        assert_eq!(parse_birth_date("1990.08.01"), Some(birth));
    }

    #[test]
    fn test_age_around_tolerance() {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("出生年月".into(), "1992-01".into());
        assert!(check_age(&resume, &AgeTarget::Around { age: 30 }, today()).passed);
        assert!(!check_age(&resume, &AgeTarget::Around { age: 35 }, today()).passed);
        let missing = check_age(&CanonicalResume::default(), &AgeTarget::Around { age: 30 }, today());
        assert!(!missing.passed);
        assert!(missing.reason.contains("birth date"));
    }

    #[test]
    fn test_location_substring_both_ways() {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("work_location".into(), "北京市".into());
        assert!(check_location(&resume, &["北京".into()]).passed);
        resume.basic_info.insert("work_location".into(), "Shanghai".into());
        assert!(check_location(&resume, &["shanghai pudong".into()]).passed);
        assert!(!check_location(&CanonicalResume::default(), &["北京".into()]).passed);
        assert!(check_location(&CanonicalResume::default(), &[]).passed);
    }

    #[test]
    fn test_skills_any_all_empty() {
        let mut resume = CanonicalResume::default();
        resume.skills.technical.explicit = vec!["Rust".into()];
        resume.skills.technical.inferred = vec!["Docker".into()];
        let req = vec!["rust".to_string(), "docker".to_string()];
        assert!(check_skills(&resume, &req, SkillMatch::All).passed);
        let req = vec!["rust".to_string(), "go".to_string()];
        assert!(!check_skills(&resume, &req, SkillMatch::All).passed);
        assert!(check_skills(&resume, &req, SkillMatch::Any).passed);
        assert!(check_skills(&resume, &[], SkillMatch::All).passed);
    }

    #[test]
    fn test_custom_path_with_index() {
        let doc = json!({"education": [{"school": "Tsinghua"}]});
        let accessor = Accessor::parse("education.0.school").unwrap();
        let v = check_custom(&doc, "education.0.school", &accessor, Comparator::Eq, &json!("tsinghua"));
        assert!(v.passed);
        let missing = Accessor::parse("basic_info.nickname").unwrap();
        assert!(!check_custom(&doc, "basic_info.nickname", &missing, Comparator::Eq, &json!("x")).passed);
    }
}
