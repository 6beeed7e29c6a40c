//! Typed filter rules.
//!
//! A stored rule is a `(rule_type, rule_config)` pair of loosely-shaped JSON.
//! It is parsed once into a [`RuleSpec`] when loaded; a config that cannot be
//! parsed becomes a [`RuleConfigError`] carried by the rule, and that rule
//! fails closed at evaluation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::extraction::credentials::{level_of, AcademicLevel};
use crate::mapping::accessor::Accessor;
use crate::models::screening::FilterRuleRow;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleConfigError {
    #[error("unknown rule type '{0}'")]
    UnknownType(String),

    #[error("unknown comparator '{0}'")]
    UnknownComparator(String),

    #[error("comparator '{comparator}' is not supported by {rule_type} rules")]
    UnsupportedComparator { rule_type: &'static str, comparator: Comparator },

    #[error("rule config is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("rule config key '{key}' is invalid: {message}")]
    InvalidValue { key: &'static str, message: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Comparator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "in_range")]
    InRange,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::In => "in",
            Comparator::NotIn => "not_in",
            Comparator::InRange => "in_range",
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, Comparator::In | Comparator::NotIn | Comparator::InRange)
    }

    /// Numeric comparison for the ordering comparators.
    pub fn compare_numbers(self, left: f64, right: f64) -> bool {
        match self {
            Comparator::Eq => (left - right).abs() < f64::EPSILON,
            Comparator::Ne => (left - right).abs() >= f64::EPSILON,
            Comparator::Gt => left > right,
            Comparator::Ge => left >= right,
            Comparator::Lt => left < right,
            Comparator::Le => left <= right,
            Comparator::In | Comparator::NotIn | Comparator::InRange => false,
        }
    }

    /// Comparison between arbitrary JSON values, used by custom rules.
    ///
    /// Numbers (and numeric strings) compare numerically, other strings
    /// case-insensitively. `in`/`not_in` expect an array on the right and
    /// `in_range` a `[min, max]` array or a `"min-max"` string.
    pub fn compare_values(self, left: &Value, right: &Value) -> bool {
        match self {
            Comparator::In => match right {
                Value::Array(items) => items.iter().any(|item| loosely_equal(left, item)),
                _ => false,
            },
            Comparator::NotIn => match right {
                Value::Array(items) => !items.iter().any(|item| loosely_equal(left, item)),
                _ => true,
            },
            Comparator::InRange => match (as_number(left), range_bounds(right)) {
                (Some(v), Some((lo, hi))) => lo <= v && v <= hi,
                _ => false,
            },
            Comparator::Eq => loosely_equal(left, right),
            Comparator::Ne => !loosely_equal(left, right),
            ordering => match (as_number(left), as_number(right)) {
                (Some(l), Some(r)) => ordering.compare_numbers(l, r),
                _ => match (left.as_str(), right.as_str()) {
                    (Some(l), Some(r)) => {
                        let (l, r) = (l.to_lowercase(), r.to_lowercase());
                        match ordering {
                            Comparator::Gt => l > r,
                            Comparator::Ge => l >= r,
                            Comparator::Lt => l < r,
                            Comparator::Le => l <= r,
                            _ => false,
                        }
                    }
                    _ => false,
                },
            },
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = RuleConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "==" | "=" | "eq" => Comparator::Eq,
            "!=" | "ne" => Comparator::Ne,
            ">" | "gt" => Comparator::Gt,
            ">=" | "gte" => Comparator::Ge,
            "<" | "lt" => Comparator::Lt,
            "<=" | "lte" => Comparator::Le,
            "in" => Comparator::In,
            "not_in" | "not in" => Comparator::NotIn,
            "in_range" | "between" => Comparator::InRange,
            other => return Err(RuleConfigError::UnknownComparator(other.to_string())),
        })
    }
}

pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
        return (l - r).abs() < f64::EPSILON;
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.trim().eq_ignore_ascii_case(r.trim()),
        _ => left == right,
    }
}

fn range_bounds(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Array(items) if items.len() == 2 => Some((as_number(&items[0])?, as_number(&items[1])?)),
        Value::String(s) => {
            let (lo, hi) = s.split_once('-')?;
            Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
        }
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule specs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("or") {
            LogicOperator::Or
        } else {
            LogicOperator::And
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillMatch {
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgeTarget {
    /// Inclusive bounds; either side may be open.
    Range { min: Option<u32>, max: Option<u32> },
    /// A single target age, accepted within ±2 years.
    Around { age: u32 },
    Compare { comparator: Comparator, age: u32 },
}

pub const AGE_TOLERANCE: u32 = 2;

#[derive(Debug, Clone)]
pub enum RuleSpec {
    Education {
        required: AcademicLevel,
        required_label: String,
        comparator: Comparator,
    },
    Experience {
        years: f64,
        comparator: Comparator,
    },
    Skill {
        skills: Vec<String>,
        match_type: SkillMatch,
    },
    Age(AgeTarget),
    Location {
        locations: Vec<String>,
    },
    Custom {
        path: String,
        accessor: Accessor,
        comparator: Comparator,
        value: Value,
    },
}

impl RuleSpec {
    pub fn parse(rule_type: &str, config: &Value) -> Result<Self, RuleConfigError> {
        match rule_type.trim().to_lowercase().as_str() {
            "education" => parse_education(config),
            "experience" => parse_experience(config),
            "skill" | "skills" => parse_skill(config),
            "age" => parse_age(config),
            "location" => parse_location(config),
            "custom" => parse_custom(config),
            other => Err(RuleConfigError::UnknownType(other.to_string())),
        }
    }
}

fn comparator_or(config: &Value, default: Comparator) -> Result<Comparator, RuleConfigError> {
    match config.get("operator").and_then(Value::as_str) {
        Some(op) if !op.trim().is_empty() => op.parse(),
        _ => Ok(default),
    }
}

fn ordering_comparator(
    config: &Value,
    rule_type: &'static str,
) -> Result<Comparator, RuleConfigError> {
    let comparator = comparator_or(config, Comparator::Ge)?;
    if !comparator.is_ordering() {
        return Err(RuleConfigError::UnsupportedComparator { rule_type, comparator });
    }
    Ok(comparator)
}

fn string_list(config: &Value, key: &'static str) -> Result<Vec<String>, RuleConfigError> {
    match config.get(key) {
        None | Some(Value::Null) => Err(RuleConfigError::MissingKey(key)),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from))
            .collect()),
        Some(Value::String(s)) => Ok(crate::mapping::text::split_list(s)),
        Some(_) => Err(RuleConfigError::InvalidValue {
            key,
            message: "expected a list of strings".to_string(),
        }),
    }
}

fn parse_education(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    let label = config
        .get("degree")
        .or_else(|| config.get("education_level"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RuleConfigError::MissingKey("degree"))?;
    let required = level_of(label).ok_or_else(|| RuleConfigError::InvalidValue {
        key: "degree",
        message: format!("'{label}' is not a recognised degree"),
    })?;
    Ok(RuleSpec::Education {
        required,
        required_label: label.to_string(),
        comparator: ordering_comparator(config, "education")?,
    })
}

fn parse_experience(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    let raw = config.get("years").ok_or(RuleConfigError::MissingKey("years"))?;
    let years = as_number(raw).ok_or_else(|| RuleConfigError::InvalidValue {
        key: "years",
        message: format!("{raw} is not a number"),
    })?;
    Ok(RuleSpec::Experience {
        years,
        comparator: ordering_comparator(config, "experience")?,
    })
}

fn parse_skill(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    let skills = string_list(config, "skills")?;
    let match_type = match config.get("match_type").and_then(Value::as_str) {
        Some(t) if t.trim().eq_ignore_ascii_case("all") => SkillMatch::All,
        _ => SkillMatch::Any,
    };
    Ok(RuleSpec::Skill { skills, match_type })
}

fn parse_age(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    let age_value = |key: &'static str| -> Result<Option<u32>, RuleConfigError> {
        match config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => as_number(v)
                .filter(|n| *n >= 0.0)
                .map(|n| Some(n as u32))
                .ok_or_else(|| RuleConfigError::InvalidValue {
                    key,
                    message: format!("{v} is not an age"),
                }),
        }
    };

    let range = config
        .get("age_range")
        .and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty());

    let Some(range) = range else {
        let (min, max) = (age_value("min_age")?, age_value("max_age")?);
        if min.is_none() && max.is_none() {
            return Err(RuleConfigError::MissingKey("age_range"));
        }
        return Ok(RuleSpec::Age(AgeTarget::Range { min, max }));
    };

    let invalid = || RuleConfigError::InvalidValue {
        key: "age_range",
        message: format!("'{range}' is neither 'min-max' nor a single age"),
    };
    let comparator = comparator_or(config, Comparator::InRange)?;
    if let Some((lo, hi)) = range.split_once('-') {
        let min = lo.trim().parse().map_err(|_| invalid())?;
        let max = hi.trim().parse().map_err(|_| invalid())?;
        return Ok(RuleSpec::Age(AgeTarget::Range {
            min: Some(min),
            max: Some(max),
        }));
    }
    let age: u32 = range.parse().map_err(|_| invalid())?;
    Ok(RuleSpec::Age(match comparator {
        Comparator::InRange => AgeTarget::Around { age },
        c if c.is_ordering() => AgeTarget::Compare { comparator: c, age },
        comparator => {
            return Err(RuleConfigError::UnsupportedComparator {
                rule_type: "age",
                comparator,
            })
        }
    }))
}

fn parse_location(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    Ok(RuleSpec::Location {
        locations: string_list(config, "locations")?,
    })
}

fn parse_custom(config: &Value) -> Result<RuleSpec, RuleConfigError> {
    let path = config
        .get("field_path")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RuleConfigError::MissingKey("field_path"))?;
    let accessor = Accessor::parse(path).ok_or_else(|| RuleConfigError::InvalidValue {
        key: "field_path",
        message: format!("'{path}' is not a path"),
    })?;
    Ok(RuleSpec::Custom {
        path: path.to_string(),
        accessor,
        comparator: comparator_or(config, Comparator::Eq)?,
        value: config.get("value").cloned().unwrap_or(Value::Null),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Rules and results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FilterRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: String,
    pub logic: LogicOperator,
    pub priority: i32,
    pub is_active: bool,
    pub spec: Result<RuleSpec, RuleConfigError>,
}

impl FilterRule {
    pub fn new(name: &str, rule_type: &str, config: &Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rule_type: rule_type.to_string(),
            logic: LogicOperator::And,
            priority: 0,
            is_active: true,
            spec: RuleSpec::parse(rule_type, config),
        }
    }

    pub fn with_logic(mut self, logic: LogicOperator) -> Self {
        self.logic = logic;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl From<&FilterRuleRow> for FilterRule {
    fn from(row: &FilterRuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            rule_type: row.rule_type.clone(),
            logic: LogicOperator::parse(&row.logic_operator),
            priority: row.priority,
            is_active: row.is_active,
            spec: RuleSpec::parse(&row.rule_type, &row.rule_config),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleOutcome {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub rule_type: String,
    pub logic: LogicOperator,
    pub passed: bool,
    /// Always present: the matched and expected values in words.
    pub reason: String,
    pub matched_value: Value,
    pub expected_value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedRule {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub rule_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub passed: bool,
    pub failed_rules: Vec<FailedRule>,
    pub details: Vec<RuleOutcome>,
    pub summary: String,
    pub total_rules: usize,
    pub passed_rules: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comparator_parsing() {
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::Ge);
        assert_eq!("NOT_IN".parse::<Comparator>().unwrap(), Comparator::NotIn);
        assert_eq!(
            "~=".parse::<Comparator>().unwrap_err(),
            RuleConfigError::UnknownComparator("~=".into())
        );
    }

    #[test]
    fn test_compare_values() {
        assert!(Comparator::Eq.compare_values(&json!("Beijing"), &json!("beijing")));
        assert!(Comparator::Ge.compare_values(&json!("5"), &json!(3)));
        assert!(Comparator::In.compare_values(&json!("Go"), &json!(["rust", "go"])));
        assert!(Comparator::NotIn.compare_values(&json!("Go"), &json!("not a list")));
        assert!(Comparator::InRange.compare_values(&json!(30), &json!("25-35")));
        assert!(!Comparator::InRange.compare_values(&json!(36), &json!([25, 35])));
        assert!(!Comparator::Gt.compare_values(&json!({"a": 1}), &json!(1)));
    }

    #[test]
    fn test_missing_required_keys() {
        let err = RuleSpec::parse("experience", &json!({"operator": ">="})).unwrap_err();
        assert_eq!(err, RuleConfigError::MissingKey("years"));
        assert!(matches!(
            RuleSpec::parse("education", &json!({})),
            Err(RuleConfigError::MissingKey("degree"))
        ));
        assert!(matches!(
            RuleSpec::parse("custom", &json!({"value": 1})),
            Err(RuleConfigError::MissingKey("field_path"))
        ));
        assert!(matches!(
            RuleSpec::parse("nationality", &json!({})),
            Err(RuleConfigError::UnknownType(_))
        ));
    }

    #[test]
    fn test_age_config_shapes() {
        match RuleSpec::parse("age", &json!({"age_range": "25-35"})).unwrap() {
            RuleSpec::Age(AgeTarget::Range { min, max }) => assert_eq!((min, max), (Some(25), Some(35))),
            other => panic!("unexpected spec: {other:?}"),
        }
        match RuleSpec::parse("age", &json!({"age_range": "30"})).unwrap() {
            RuleSpec::Age(AgeTarget::Around { age }) => assert_eq!(age, 30),
            other => panic!("unexpected spec: {other:?}"),
        }
        match RuleSpec::parse("age", &json!({"age_range": "40", "operator": "<="})).unwrap() {
            RuleSpec::Age(AgeTarget::Compare { comparator, age }) => {
                assert_eq!((comparator, age), (Comparator::Le, 40))
            }
            other => panic!("unexpected spec: {other:?}"),
        }
        match RuleSpec::parse("age", &json!({"max_age": 45})).unwrap() {
            RuleSpec::Age(AgeTarget::Range { min, max }) => assert_eq!((min, max), (None, Some(45))),
            other => panic!("unexpected spec: {other:?}"),
        }
        assert!(RuleSpec::parse("age", &json!({"age_range": "young"})).is_err());
    }

    #[test]
    fn test_education_rejects_set_comparators() {
        let err = RuleSpec::parse("education", &json!({"degree": "本科", "operator": "in"})).unwrap_err();
        assert!(matches!(err, RuleConfigError::UnsupportedComparator { .. }));
    }

    #[test]
    fn test_row_conversion_reads_logic() {
        let row = FilterRuleRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Skills".into(),
            description: None,
            rule_type: "skill".into(),
            rule_config: json!({"skills": "Rust, Go", "match_type": "all"}),
            logic_operator: "or".into(),
            priority: 3,
            is_active: true,
            created_at: chrono::Utc::now(),
        };
        let rule = FilterRule::from(&row);
        assert_eq!(rule.logic, LogicOperator::Or);
        match rule.spec.unwrap() {
            RuleSpec::Skill { skills, match_type } => {
                assert_eq!(skills, vec!["Rust", "Go"]);
                assert_eq!(match_type, SkillMatch::All);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }
}
