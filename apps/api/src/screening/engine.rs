//! Rule evaluation.
//!
//! `passed` = no AND rule failed, and when OR rules exist at least one of
//! them passed. An empty active set passes.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extraction::models::CanonicalResume;
use crate::screening::models::{Evaluation, FailedRule, FilterRule, LogicOperator, RuleOutcome, RuleSpec};
use crate::screening::predicates::{
    check_age, check_custom, check_education, check_experience, check_location, check_skills, Verdict,
};

pub fn evaluate(rules: &[FilterRule], resume: &CanonicalResume) -> Evaluation {
    evaluate_on(rules, resume, Utc::now().date_naive())
}

/// Evaluation with an explicit "today", which age and tenure depend on.
pub fn evaluate_on(rules: &[FilterRule], resume: &CanonicalResume, today: NaiveDate) -> Evaluation {
    let mut active: Vec<&FilterRule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));

    if active.is_empty() {
        return Evaluation {
            passed: true,
            failed_rules: Vec::new(),
            details: Vec::new(),
            summary: "no active rules configured".to_string(),
            total_rules: 0,
            passed_rules: 0,
        };
    }

    // custom rules walk the resume as JSON
    let document = active
        .iter()
        .any(|r| matches!(r.spec, Ok(RuleSpec::Custom { .. })))
        .then(|| serde_json::to_value(resume).unwrap_or_default());

    let details: Vec<RuleOutcome> = active
        .iter()
        .map(|rule| evaluate_rule(rule, resume, document.as_ref(), today))
        .collect();

    let and_failed = details
        .iter()
        .any(|d| d.logic == LogicOperator::And && !d.passed);
    let mut or_rules = details.iter().filter(|d| d.logic == LogicOperator::Or).peekable();
    let or_satisfied = or_rules.peek().is_none() || or_rules.any(|d| d.passed);
    let passed = !and_failed && or_satisfied;

    let failed_rules: Vec<FailedRule> = details
        .iter()
        .filter(|d| !d.passed)
        .map(|d| FailedRule {
            rule_id: d.rule_id,
            rule_name: d.rule_name.clone(),
            rule_type: d.rule_type.clone(),
            reason: d.reason.clone(),
        })
        .collect();

    let total_rules = details.len();
    let passed_rules = total_rules - failed_rules.len();
    let summary = if failed_rules.is_empty() {
        format!("passed all {total_rules} rules")
    } else {
        let names: Vec<&str> = failed_rules.iter().map(|f| f.rule_name.as_str()).collect();
        format!(
            "failed {} of {total_rules} rules: {}",
            failed_rules.len(),
            names.join(", ")
        )
    };
    debug!(passed, total_rules, passed_rules, "filter rules evaluated");

    Evaluation {
        passed,
        failed_rules,
        details,
        summary,
        total_rules,
        passed_rules,
    }
}

fn evaluate_rule(
    rule: &FilterRule,
    resume: &CanonicalResume,
    document: Option<&Value>,
    today: NaiveDate,
) -> RuleOutcome {
    let verdict = match &rule.spec {
        Err(e) => {
            warn!(rule_id = %rule.id, rule = %rule.name, error = %e, "filter rule misconfigured; failing it");
            Verdict {
                passed: false,
                reason: format!("rule configuration error: {e}"),
                matched: Value::Null,
                expected: Value::Null,
            }
        }
        Ok(RuleSpec::Education {
            required,
            required_label,
            comparator,
        }) => check_education(resume, *required, required_label, *comparator),
        Ok(RuleSpec::Experience { years, comparator }) => check_experience(resume, *years, *comparator, today),
        Ok(RuleSpec::Skill { skills, match_type }) => check_skills(resume, skills, *match_type),
        Ok(RuleSpec::Age(target)) => check_age(resume, target, today),
        Ok(RuleSpec::Location { locations }) => check_location(resume, locations),
        Ok(RuleSpec::Custom {
            path,
            accessor,
            comparator,
            value,
        }) => check_custom(document.unwrap_or(&Value::Null), path, accessor, *comparator, value),
    };

    RuleOutcome {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        rule_type: rule.rule_type.clone(),
        logic: rule.logic,
        passed: verdict.passed,
        reason: verdict.reason,
        matched_value: verdict.matched,
        expected_value: verdict.expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn resume() -> CanonicalResume {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("location".into(), "北京".into());
        resume.skills.technical.explicit = vec!["Rust".into()];
        resume
    }

    #[test]
    fn test_no_rules_pass() {
        let eval = evaluate_on(&[], &resume(), today());
        assert!(eval.passed);
        assert_eq!(eval.summary, "no active rules configured");
    }

    #[test]
    fn test_inactive_rules_are_ignored() {
        let mut rule = FilterRule::new("Shanghai only", "location", &json!({"locations": ["上海"]}));
        rule.is_active = false;
        assert!(evaluate_on(&[rule], &resume(), today()).passed);
    }

    #[test]
    fn test_and_failure_fails_set() {
        let rules = vec![
            FilterRule::new("City", "location", &json!({"locations": ["北京"]})),
            FilterRule::new("Go", "skill", &json!({"skills": ["Go"]})),
        ];
        let eval = evaluate_on(&rules, &resume(), today());
        assert!(!eval.passed);
        assert_eq!(eval.total_rules, 2);
        assert_eq!(eval.passed_rules, 1);
        assert_eq!(eval.summary, "failed 1 of 2 rules: Go");
        assert!(eval.details.iter().all(|d| !d.reason.is_empty()));
    }

    #[test]
    fn test_or_rules_need_one_pass() {
        let rules = vec![
            FilterRule::new("Go", "skill", &json!({"skills": ["Go"]})).with_logic(LogicOperator::Or),
            FilterRule::new("Rust", "skill", &json!({"skills": ["rust"]})).with_logic(LogicOperator::Or),
        ];
        let eval = evaluate_on(&rules, &resume(), today());
        assert!(eval.passed);
        assert_eq!(eval.failed_rules.len(), 1);

        let none = vec![FilterRule::new("Go", "skill", &json!({"skills": ["Go"]})).with_logic(LogicOperator::Or)];
        assert!(!evaluate_on(&none, &resume(), today()).passed);
    }

    #[test]
    fn test_or_pass_does_not_rescue_and_failure() {
        let rules = vec![
            FilterRule::new("Rust", "skill", &json!({"skills": ["rust"]})).with_logic(LogicOperator::Or),
            FilterRule::new("Shanghai", "location", &json!({"locations": ["上海"]})),
        ];
        assert!(!evaluate_on(&rules, &resume(), today()).passed);
    }

    #[test]
    fn test_config_error_fails_closed_and_others_run() {
        let rules = vec![
            FilterRule::new("Broken", "experience", &json!({"operator": ">="})),
            FilterRule::new("City", "location", &json!({"locations": ["北京"]})),
        ];
        let eval = evaluate_on(&rules, &resume(), today());
        assert!(!eval.passed);
        assert_eq!(eval.failed_rules.len(), 1);
        assert!(eval.failed_rules[0].reason.contains("years"));
        assert!(eval.details[1].passed);
    }

    #[test]
    fn test_priority_orders_details() {
        let rules = vec![
            FilterRule::new("Low", "skill", &json!({"skills": []})).with_priority(1),
            FilterRule::new("High", "skill", &json!({"skills": []})).with_priority(10),
        ];
        let eval = evaluate_on(&rules, &resume(), today());
        assert_eq!(eval.details[0].rule_name, "High");
        assert_eq!(eval.summary, "passed all 2 rules");
    }

    #[test]
    fn test_skill_all_with_empty_requirement_passes() {
        let rules = vec![FilterRule::new("Any", "skill", &json!({"skills": [], "match_type": "all"}))];
        assert!(evaluate_on(&rules, &CanonicalResume::default(), today()).passed);
    }

    #[test]
    fn test_custom_rule_reads_resume_json() {
        let rules = vec![FilterRule::new(
            "Named",
            "custom",
            &json!({"field_path": "basic_info.location", "operator": "in", "value": ["北京", "上海"]}),
        )];
        assert!(evaluate_on(&rules, &resume(), today()).passed);
    }
}
