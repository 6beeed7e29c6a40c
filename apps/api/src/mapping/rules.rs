//! Tier A: resolve fields through a cached [`FieldMappingRuleSet`].
//!
//! The stored rule set is compiled once when a template is loaded; every
//! `data_source` path becomes an [`AccessorChain`].

use std::collections::HashMap;

use serde_json::Value;

use crate::mapping::accessor::AccessorChain;
use crate::mapping::heuristic::format_period;
use crate::mapping::models::{FieldMappingRuleSet, FieldRule, ResolutionKind, SectionKind};
use crate::mapping::text::{display_value, is_blank, join_items};

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub chain: AccessorChain,
    pub kind: ResolutionKind,
    pub needs_external_fill: bool,
    pub source: FieldRule,
}

impl CompiledRule {
    pub fn compile(rule: &FieldRule) -> Self {
        Self {
            chain: AccessorChain::parse(&rule.data_source),
            kind: rule.kind,
            needs_external_fill: rule.needs_ai_extraction,
            source: rule.clone(),
        }
    }

    /// A `combine` rule over a start/end date pair.
    fn is_period(&self, field_id: &str) -> bool {
        if self.kind != ResolutionKind::Combine {
            return false;
        }
        let transform = self.source.transform.as_deref().unwrap_or_default().to_lowercase();
        transform.contains("date")
            || matches!(field_id, "period" | "duration" | "date_range" | "时间")
    }

    /// Resolves against an object-section root (the whole resume).
    pub fn resolve(&self, root: &Value) -> Option<Value> {
        match self.kind {
            ResolutionKind::Combine => combine(&self.chain, |c| {
                c.accessors().iter().filter_map(|a| a.resolve(root)).collect()
            }),
            _ => self.chain.resolve(root).cloned(),
        }
    }

    /// Resolves against one collection row.
    pub fn resolve_in_row(&self, field_id: &str, row: &Value) -> Option<Value> {
        if self.is_period(field_id) {
            let start = row.get("start_date").and_then(Value::as_str);
            let end = row
                .get("end_date")
                .and_then(Value::as_str)
                .or_else(|| row.get("graduation_date").and_then(Value::as_str));
            let is_current = row.get("is_current").and_then(Value::as_bool).unwrap_or(false);
            let period = format_period(start, end, is_current);
            return (!period.is_empty()).then_some(Value::String(period));
        }
        match self.kind {
            ResolutionKind::Combine => combine(&self.chain, |c| {
                c.accessors()
                    .iter()
                    .filter_map(|a| a.resolve_in_row(row))
                    .collect()
            }),
            _ => self.chain.resolve_in_row(row).cloned(),
        }
    }
}

fn combine<'a>(chain: &AccessorChain, pick: impl FnOnce(&AccessorChain) -> Vec<&'a Value>) -> Option<Value> {
    let joined = join_items(pick(chain).into_iter().filter(|v| !is_blank(v)).map(display_value));
    (!joined.is_empty()).then_some(Value::String(joined))
}

/// A rule set ready for evaluation. Holds section → field id → rule.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    sections: HashMap<String, HashMap<String, CompiledRule>>,
}

impl CompiledRuleSet {
    /// `None` for an invalid (empty) rule set, which means heuristic resolution.
    pub fn compile(rules: &FieldMappingRuleSet) -> Option<Self> {
        if !rules.is_valid() {
            return None;
        }
        let sections = rules
            .field_mapping
            .iter()
            .map(|(section, fields)| {
                let compiled = fields
                    .iter()
                    .map(|(field_id, rule)| (field_id.clone(), CompiledRule::compile(rule)))
                    .collect();
                (section.clone(), compiled)
            })
            .collect();
        Some(Self { sections })
    }

    /// Rules for a section, looked up by its declared tag and then its kind.
    pub fn section(&self, tag: &str, kind: &SectionKind) -> Option<&HashMap<String, CompiledRule>> {
        self.sections
            .get(tag)
            .or_else(|| self.sections.get(kind.as_key()))
            .filter(|rules| !rules.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(source: &str, kind: ResolutionKind, transform: Option<&str>) -> CompiledRule {
        CompiledRule::compile(&FieldRule {
            data_source: source.into(),
            kind,
            transform: transform.map(String::from),
            needs_ai_extraction: false,
        })
    }

    #[test]
    fn test_period_combine_in_row() {
        let r = rule(
            "parsed_data.work_experiences[]",
            ResolutionKind::Combine,
            Some("combine(start_date, end_date, format='YYYY-MM - YYYY-MM')"),
        );
        let current = json!({"start_date": "2020-01", "end_date": "", "is_current": true});
        assert_eq!(r.resolve_in_row("period", &current), Some(json!("2020-01 - present")));
        let closed = json!({"start_date": "2018-03", "end_date": "2019-11", "is_current": false});
        assert_eq!(r.resolve_in_row("period", &closed), Some(json!("2018-03 - 2019-11")));
        let edu = json!({"start_date": "2012-09", "graduation_date": "2016-07"});
        assert_eq!(r.resolve_in_row("period", &edu), Some(json!("2012-09 - 2016-07")));
    }

    #[test]
    fn test_combine_non_date_joins_with_space() {
        let r = rule(
            "parsed_data.basic_info.name || parsed_data.basic_info.gender",
            ResolutionKind::Combine,
            None,
        );
        let doc = json!({"basic_info": {"name": "Li Lei", "gender": "M"}});
        assert_eq!(r.resolve(&doc), Some(json!("Li Lei M")));
    }

    #[test]
    fn test_fallback_rule() {
        let r = rule(
            "parsed_data.education[].education_level || parsed_data.education[].degree_level",
            ResolutionKind::Fallback,
            None,
        );
        let row = json!({"education_level": "", "degree_level": "本科"});
        assert_eq!(r.resolve_in_row("education_level", &row), Some(json!("本科")));
    }

    #[test]
    fn test_compile_rejects_empty_set() {
        assert!(CompiledRuleSet::compile(&FieldMappingRuleSet::default()).is_none());
    }

    #[test]
    fn test_section_lookup_by_kind() {
        let set: FieldMappingRuleSet = serde_json::from_value(json!({
            "field_mapping": {"work_experience": {"company": {"data_source": "parsed_data.work_experiences[].company"}}}
        }))
        .unwrap();
        let compiled = CompiledRuleSet::compile(&set).unwrap();
        assert!(compiled.section("experience", &SectionKind::WorkExperience).is_some());
        assert!(compiled.section("skills", &SectionKind::Skills).is_none());
    }
}
