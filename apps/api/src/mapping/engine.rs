//! Template fill: Tier A (cached rules) → Tier B (heuristics) → Tier C (external).
//!
//! Tiers A and B are synchronous and never fail; an unresolved field becomes an
//! empty string or list. Only fields a rule flags for external fill, or a
//! template with no sections at all, reach Tier C.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::extraction::models::CanonicalResume;
use crate::mapping::external_fill::{run_tasks, FieldFiller, FillTask};
use crate::mapping::heuristic;
use crate::mapping::models::{
    FieldShape, FieldSpec, FilledTemplate, ResolutionTier, SectionKind, SectionReport, TemplateDefinition,
    TemplateSection,
};
use crate::mapping::rules::{CompiledRule, CompiledRuleSet};
use crate::mapping::text::{clean_text, display_list, display_value, is_blank};

#[derive(Debug, Clone)]
pub struct FillOptions {
    /// Per-field external fill timeout.
    pub field_timeout: Duration,
    /// Timeout for laying out a template without sections.
    pub template_timeout: Duration,
    pub concurrency: usize,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            field_timeout: Duration::from_secs(30),
            template_timeout: Duration::from_secs(180),
            concurrency: 4,
        }
    }
}

const WORK_COLUMNS: &[&str] = &["company", "position", "period", "responsibilities", "achievements"];
const EDUCATION_COLUMNS: &[&str] = &["school", "major", "degree", "education_level", "period"];
const PROJECT_COLUMNS: &[&str] = &["project_name", "role", "description", "achievements"];
const SKILL_FIELDS: &[&str] = &["technical", "soft", "languages"];

enum SectionData {
    Object(Map<String, Value>),
    Rows(Vec<Map<String, Value>>),
}

impl SectionData {
    fn into_value(self) -> Value {
        match self {
            SectionData::Object(map) => Value::Object(map),
            SectionData::Rows(rows) => {
                let rows = rows.into_iter().map(Value::Object).collect();
                let mut map = Map::new();
                map.insert("rows".to_string(), Value::Array(rows));
                Value::Object(map)
            }
        }
    }
}

/// Fills every section of `template` from `resume`.
pub async fn fill(
    template: &TemplateDefinition,
    resume: &CanonicalResume,
    rules: Option<&CompiledRuleSet>,
    filler: &dyn FieldFiller,
    options: &FillOptions,
) -> FilledTemplate {
    if template.is_unstructured() {
        return fill_unstructured(template, resume, filler, options).await;
    }

    let root = serde_json::to_value(resume).unwrap_or_default();
    let mut data = Vec::with_capacity(template.components.len());
    let mut reports = Vec::with_capacity(template.components.len());
    let mut tasks = Vec::new();

    for (index, section) in template.components.iter().enumerate() {
        let kind = section.kind();
        let section_rules = rules.and_then(|r| r.section(&section.section_type, &kind));
        let tier = if section_rules.is_some() {
            ResolutionTier::Rule
        } else {
            if !matches!(kind, SectionKind::Other(_)) {
                info!(
                    section = %section.section_type,
                    index,
                    "MappingFallback: no cached rule for section, using heuristic resolution"
                );
            }
            ResolutionTier::Heuristic
        };

        let ctx = SectionContext {
            index,
            section,
            kind: &kind,
            rules: section_rules,
            resume,
            root: &root,
        };
        let (section_data, section_tasks) = ctx.fill();
        reports.push(SectionReport {
            section_index: index,
            section_type: section.section_type.clone(),
            tier,
            external_requested: section_tasks.len(),
            external_filled: 0,
        });
        data.push(section_data);
        tasks.extend(section_tasks);
    }

    let outcomes = run_tasks(filler, tasks, options.concurrency, options.field_timeout).await;
    for outcome in outcomes {
        let Some(value) = outcome.value else { continue };
        let task = outcome.task;
        let Some(section) = template.components.get(task.section_index) else { continue };
        let value = finalize(&section.kind(), &task.field, Some(value));
        if is_blank(&value) {
            continue;
        }
        let target = match (data.get_mut(task.section_index), task.row_index) {
            (Some(SectionData::Object(map)), None) => Some(map),
            (Some(SectionData::Rows(rows)), Some(row)) => rows.get_mut(row),
            _ => None,
        };
        if let Some(map) = target {
            map.insert(task.field_id.clone(), value);
            if let Some(report) = reports.get_mut(task.section_index) {
                report.external_filled += 1;
            }
        }
    }

    let mut filled = template.clone();
    for (section, section_data) in filled.components.iter_mut().zip(data) {
        section.data = Some(section_data.into_value());
    }

    FilledTemplate {
        template: filled,
        sections: reports,
        partial: resume.partial.clone(),
    }
}

async fn fill_unstructured(
    template: &TemplateDefinition,
    resume: &CanonicalResume,
    filler: &dyn FieldFiller,
    options: &FillOptions,
) -> FilledTemplate {
    let result = tokio::time::timeout(options.template_timeout, filler.fill_template(template, resume)).await;
    match result {
        Ok(Ok(mut filled)) if !filled.components.is_empty() => {
            for section in &mut filled.components {
                finalize_section_data(section);
            }
            let sections = filled
                .components
                .iter()
                .enumerate()
                .map(|(index, s)| SectionReport {
                    section_index: index,
                    section_type: s.section_type.clone(),
                    tier: ResolutionTier::External,
                    external_requested: 1,
                    external_filled: 1,
                })
                .collect();
            FilledTemplate {
                template: filled,
                sections,
                partial: resume.partial.clone(),
            }
        }
        other => {
            match other {
                Ok(Ok(_)) => warn!("external template fill returned no sections"),
                Ok(Err(e)) => warn!(error = %e, "external template fill failed"),
                Err(_) => warn!(timeout = ?options.template_timeout, "external template fill timed out"),
            }
            FilledTemplate {
                template: template.clone(),
                sections: Vec::new(),
                partial: resume.partial.clone(),
            }
        }
    }
}

struct SectionContext<'a> {
    index: usize,
    section: &'a TemplateSection,
    kind: &'a SectionKind,
    rules: Option<&'a HashMap<String, CompiledRule>>,
    resume: &'a CanonicalResume,
    root: &'a Value,
}

impl<'a> SectionContext<'a> {
    fn fill(&self) -> (SectionData, Vec<FillTask>) {
        let mut tasks = Vec::new();
        let data = match self.kind {
            SectionKind::BasicInfo => {
                let fields = self.fields(&[]);
                let context = self.root.get("basic_info").cloned().unwrap_or_default();
                SectionData::Object(self.fill_object(&fields, &context, &mut tasks, |field, key| {
                    heuristic::basic_field(self.resume, field, key)
                }))
            }
            SectionKind::Skills => {
                let fields = self.fields(SKILL_FIELDS);
                let context = self.root.get("skills").cloned().unwrap_or_default();
                SectionData::Object(self.fill_object(&fields, &context, &mut tasks, |_, key| {
                    heuristic::skills_field(&self.resume.skills, key)
                }))
            }
            SectionKind::WorkExperience => {
                let fields = self.fields(WORK_COLUMNS);
                let rows = self
                    .resume
                    .work_experiences
                    .iter()
                    .enumerate()
                    .map(|(i, exp)| {
                        let row = self.row_json("work_experiences", i);
                        self.fill_row(&fields, i, &row, &mut tasks, |field, key| {
                            heuristic::work_field(exp, field, key)
                        })
                    })
                    .collect();
                SectionData::Rows(rows)
            }
            SectionKind::Education => {
                let fields = self.fields(EDUCATION_COLUMNS);
                let rows = self
                    .resume
                    .education
                    .iter()
                    .enumerate()
                    .map(|(i, edu)| {
                        let row = self.row_json("education", i);
                        self.fill_row(&fields, i, &row, &mut tasks, |field, key| {
                            heuristic::education_field(edu, field, key)
                        })
                    })
                    .collect();
                SectionData::Rows(rows)
            }
            SectionKind::Projects => {
                let fields = self.fields(PROJECT_COLUMNS);
                let rows = self
                    .resume
                    .projects
                    .iter()
                    .enumerate()
                    .map(|(i, project)| {
                        let row = self.row_json("projects", i);
                        self.fill_row(&fields, i, &row, &mut tasks, |field, key| {
                            heuristic::project_field(project, field, key)
                        })
                    })
                    .collect();
                SectionData::Rows(rows)
            }
            SectionKind::Other(_) => SectionData::Object(Map::new()),
        };
        (data, tasks)
    }

    /// Declared fields, then table columns, then the defaults for the kind.
    fn fields(&self, defaults: &[&str]) -> Vec<FieldSpec> {
        let declared = self.section.effective_fields();
        if declared.is_empty() {
            defaults.iter().map(|id| FieldSpec::simple(id)).collect()
        } else {
            declared.to_vec()
        }
    }

    fn row_json(&self, collection: &str, index: usize) -> Value {
        self.root
            .get(collection)
            .and_then(|rows| rows.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn fill_object(
        &self,
        fields: &[FieldSpec],
        context: &Value,
        tasks: &mut Vec<FillTask>,
        heuristic: impl Fn(&FieldSpec, &str) -> Option<Value>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for field in fields {
            let Some(key) = field.key() else { continue };
            let rule = self.rules.and_then(|r| r.get(key));
            let value = rule
                .and_then(|r| r.resolve(self.root))
                .filter(|v| !is_blank(v))
                .or_else(|| heuristic(field, key).filter(|v| !is_blank(v)));

            if value.is_none() {
                self.queue(tasks, field, key, rule, None, context);
            }
            out.insert(key.to_string(), finalize(self.kind, field, value));
        }
        out
    }

    fn fill_row(
        &self,
        fields: &[FieldSpec],
        row_index: usize,
        row: &Value,
        tasks: &mut Vec<FillTask>,
        heuristic: impl Fn(&FieldSpec, &str) -> Option<Value>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for field in fields {
            let Some(key) = field.key() else { continue };
            let rule = self.rules.and_then(|r| r.get(key));
            let value = rule
                .and_then(|r| r.resolve_in_row(key, row))
                .filter(|v| !is_blank(v))
                .or_else(|| heuristic(field, key).filter(|v| !is_blank(v)));

            if value.is_none() {
                self.queue(tasks, field, key, rule, Some(row_index), row);
            }
            out.insert(key.to_string(), finalize(self.kind, field, value));
        }
        out
    }

    fn queue(
        &self,
        tasks: &mut Vec<FillTask>,
        field: &FieldSpec,
        key: &str,
        rule: Option<&CompiledRule>,
        row_index: Option<usize>,
        context: &Value,
    ) {
        let Some(rule) = rule.filter(|r| r.needs_external_fill) else {
            return;
        };
        tasks.push(FillTask {
            section_type: self.section.section_type.clone(),
            section_index: self.index,
            field_id: key.to_string(),
            row_index,
            field: field.clone(),
            rule: Some(rule.source.clone()),
            context: context.clone(),
        });
    }
}

/// Post-processing shared by every tier.
fn finalize(kind: &SectionKind, field: &FieldSpec, value: Option<Value>) -> Value {
    let as_list = field.shape() == FieldShape::List || (*kind == SectionKind::Skills && field.field_type.is_none());
    match (value, as_list) {
        (Some(v), true) => Value::Array(display_list(&v).into_iter().map(Value::String).collect()),
        (None, true) => Value::Array(Vec::new()),
        (Some(v), false) => Value::String(display_value(&v)),
        (None, false) => Value::String(String::new()),
    }
}

/// Runs externally laid-out section data through `finalize`, keyed by the
/// section's declared fields where they exist.
fn finalize_section_data(section: &mut TemplateSection) {
    let kind = section.kind();
    let fields = section.effective_fields().to_vec();
    let Some(Value::Object(map)) = section.data.as_mut() else { return };

    let finalize_map = |map: &mut Map<String, Value>| {
        for (key, value) in map.iter_mut() {
            let field = fields
                .iter()
                .find(|f| f.key() == Some(key.as_str()))
                .cloned()
                .unwrap_or_else(|| FieldSpec::simple(key));
            *value = finalize_entry(&kind, &field, value.take());
        }
    };

    if let Some(Value::Array(rows)) = map.get_mut("rows") {
        for row in rows.iter_mut() {
            if let Value::Object(row) = row {
                finalize_map(row);
            }
        }
        return;
    }
    finalize_map(map);
}

/// Nested objects that are not raw/optimized pairs keep their structure and
/// only have their text cleaned.
fn finalize_entry(kind: &SectionKind, field: &FieldSpec, value: Value) -> Value {
    match value {
        Value::Object(map) if !map.contains_key("raw") && !map.contains_key("optimized") => {
            Value::Object(map.into_iter().map(|(k, v)| (k, clean_nested(v))).collect())
        }
        other => finalize(kind, field, Some(other)),
    }
}

fn clean_nested(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_nested).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, clean_nested(v))).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::extraction::models::{Descriptive, Education, Project, Skills, TechnicalSkills, WorkExperience};
    use crate::extraction::recovery::PartialParse;
    use crate::mapping::external_fill::FillError;
    use crate::mapping::models::FieldMappingRuleSet;

    struct StubFiller {
        reply: Option<Value>,
        template: Option<TemplateDefinition>,
        seen: Mutex<Vec<FillTask>>,
    }

    impl StubFiller {
        fn failing() -> Self {
            Self {
                reply: None,
                template: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn replying(value: Value) -> Self {
            Self {
                reply: Some(value),
                ..Self::failing()
            }
        }
    }

    #[async_trait]
    impl FieldFiller for StubFiller {
        async fn fill_field(&self, task: &FillTask) -> Result<Value, FillError> {
            self.seen.lock().unwrap().push(task.clone());
            self.reply
                .clone()
                .ok_or_else(|| FillError::MissingField(task.field_id.clone()))
        }

        async fn fill_template(
            &self,
            _template: &TemplateDefinition,
            _resume: &CanonicalResume,
        ) -> Result<TemplateDefinition, FillError> {
            self.template
                .clone()
                .ok_or_else(|| FillError::MissingField("components".into()))
        }
    }

    fn sample_resume() -> CanonicalResume {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("name".into(), "王五".into());
        resume.basic_info.insert("work_location".into(), "Shenzhen".into());
        resume.work_experiences = vec![
            WorkExperience {
                company: "Now Co".into(),
                position: "Lead".into(),
                start_date: Some("2020-01".into()),
                is_current: true,
                responsibilities: Descriptive::enhanced(vec!["raw".into()], vec!["Led ↓ platform\nteam".into()]),
                ..Default::default()
            },
            WorkExperience {
                company: "Old Co".into(),
                start_date: Some("2016-05".into()),
                end_date: Some("2019-12".into()),
                ..Default::default()
            },
        ];
        resume.education = vec![Education {
            school: "ZJU".into(),
            degree: Some("硕士".into()),
            education_level: Some("研究生".into()),
            ..Default::default()
        }];
        resume.projects = vec![Project {
            name: "Search".into(),
            role: Some("Owner".into()),
            ..Default::default()
        }];
        resume.skills = Skills {
            technical: TechnicalSkills {
                explicit: vec!["Rust".into()],
                inferred: vec!["Kafka".into()],
            },
            soft: vec!["沟通".into()],
            languages: vec![],
        };
        resume
    }

    fn template(value: Value) -> TemplateDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_heuristic_fill_all_sections() {
        let t = template(json!({"components": [
            {"type": "basic_info", "fields": [{"id": "name"}, {"id": "current_location"}, {"id": "nickname"}]},
            {"type": "work_experience", "fields": [{"id": "company"}, {"id": "period"}, {"id": "responsibilities"}]},
            {"type": "education", "fields": [{"id": "school"}, {"id": "education_level"}]},
            {"type": "skills"},
            {"type": "projects", "config": {"tableColumns": [{"name": "project_name"}, {"id": "role"}]}},
            {"type": "cover_letter", "fields": [{"id": "body"}]}
        ]}));
        let filler = StubFiller::failing();
        let out = fill(&t, &sample_resume(), None, &filler, &FillOptions::default()).await;
        let c = &out.template.components;

        assert_eq!(c[0].data.as_ref().unwrap()["name"], "王五");
        assert_eq!(c[0].data.as_ref().unwrap()["current_location"], "Shenzhen");
        assert_eq!(c[0].data.as_ref().unwrap()["nickname"], "");

        let rows = &c[1].data.as_ref().unwrap()["rows"];
        assert_eq!(rows[0]["company"], "Now Co");
        assert_eq!(rows[0]["period"], "2020-01 - present");
        assert_eq!(rows[0]["responsibilities"], "Led platform team");
        assert_eq!(rows[1]["period"], "2016-05 - 2019-12");

        assert_eq!(c[2].data.as_ref().unwrap()["rows"][0]["education_level"], "研究生");
        assert_eq!(c[3].data.as_ref().unwrap()["technical"], json!(["Rust", "Kafka"]));
        assert_eq!(c[3].data.as_ref().unwrap()["languages"], json!([]));
        assert_eq!(c[4].data.as_ref().unwrap()["rows"][0]["project_name"], "Search");
        assert_eq!(c[5].data, Some(json!({})));

        assert!(out.sections.iter().all(|s| s.tier == ResolutionTier::Heuristic));
        // heuristic misses are not sent out without a flag
        assert!(filler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_heuristic_never_fails_on_empty_resume() {
        let t = template(json!({"components": [
            {"type": "basic_info", "fields": [{"id": "name"}, {"field": "phone"}, {"name": "birthday"}, {}]},
            {"type": "work_experience"},
            {"type": "education", "fields": [{"id": "period"}]},
            {"type": "skills", "fields": [{"id": "technical", "type": "list"}, {"id": "soft", "type": "text"}]},
            {"type": "projects"}
        ]}));
        let out = fill(&t, &CanonicalResume::default(), None, &StubFiller::failing(), &FillOptions::default()).await;
        let c = &out.template.components;
        assert_eq!(c[0].data.as_ref().unwrap()["phone"], "");
        assert_eq!(c[1].data.as_ref().unwrap()["rows"], json!([]));
        assert_eq!(c[3].data.as_ref().unwrap()["technical"], json!([]));
        assert_eq!(c[3].data.as_ref().unwrap()["soft"], "");
    }

    #[tokio::test]
    async fn test_rule_tier_with_external_fill_for_flagged_field() {
        let t = template(json!({"components": [
            {"type": "work_experience", "fields": [{"id": "company"}, {"id": "period"}, {"id": "highlight"}]}
        ]}));
        let rules: FieldMappingRuleSet = serde_json::from_value(json!({"field_mapping": {"work_experience": {
            "company": {"data_source": "parsed_data.work_experiences[].company", "type": "direct"},
            "period": {"data_source": "parsed_data.work_experiences[]", "type": "combine",
                       "transform": "combine(start_date, end_date)"},
            "highlight": {"data_source": "", "type": "direct", "needs_ai_extraction": true}
        }}}))
        .unwrap();
        let compiled = CompiledRuleSet::compile(&rules).unwrap();
        let filler = StubFiller::replying(json!("Shipped v2"));

        let out = fill(&t, &sample_resume(), Some(&compiled), &filler, &FillOptions::default()).await;
        let rows = &out.template.components[0].data.as_ref().unwrap()["rows"];
        assert_eq!(rows[0]["period"], "2020-01 - present");
        assert_eq!(rows[1]["highlight"], "Shipped v2");
        assert_eq!(out.sections[0].tier, ResolutionTier::Rule);
        assert_eq!(out.sections[0].external_requested, 2);
        assert_eq!(out.sections[0].external_filled, 2);

        // each task sees only its own row
        let seen = filler.seen.lock().unwrap();
        assert_eq!(seen[1].row_index, Some(1));
        assert_eq!(seen[1].context["company"], "Old Co");
    }

    #[tokio::test]
    async fn test_empty_rule_result_falls_back_to_heuristic() {
        let t = template(json!({"components": [{"type": "basic_info", "fields": [{"id": "current_location"}]}]}));
        let rules: FieldMappingRuleSet = serde_json::from_value(json!({"field_mapping": {"basic_info": {
            "current_location": {"data_source": "parsed_data.basic_info.location", "type": "direct"}
        }}}))
        .unwrap();
        let compiled = CompiledRuleSet::compile(&rules).unwrap();
        let out = fill(&t, &sample_resume(), Some(&compiled), &StubFiller::failing(), &FillOptions::default()).await;
        assert_eq!(out.template.components[0].data.as_ref().unwrap()["current_location"], "Shenzhen");
    }

    #[tokio::test]
    async fn test_failed_external_fill_leaves_blank() {
        let t = template(json!({"components": [{"type": "basic_info", "fields": [{"id": "summary"}]}]}));
        let rules: FieldMappingRuleSet = serde_json::from_value(json!({"field_mapping": {"basic_info": {
            "summary": {"data_source": "", "needs_ai_extraction": true}
        }}}))
        .unwrap();
        let compiled = CompiledRuleSet::compile(&rules).unwrap();
        let out = fill(&t, &sample_resume(), Some(&compiled), &StubFiller::failing(), &FillOptions::default()).await;
        assert_eq!(out.template.components[0].data.as_ref().unwrap()["summary"], "");
        assert_eq!(out.sections[0].external_filled, 0);
    }

    #[tokio::test]
    async fn test_unstructured_template_failure_returns_template_unchanged() {
        let t = template(json!({"name": "Freeform"}));
        let mut resume = sample_resume();
        resume.partial = Some(PartialParse::new(10, 10, 8));
        let out = fill(&t, &resume, None, &StubFiller::failing(), &FillOptions::default()).await;
        assert_eq!(out.template, t);
        assert!(out.sections.is_empty());
        assert!(out.partial.is_some());
    }

    #[tokio::test]
    async fn test_unstructured_template_external_layout() {
        let filled = template(json!({"components": [{"type": "summary", "data": {"text": "hi"}}]}));
        let filler = StubFiller {
            template: Some(filled.clone()),
            ..StubFiller::failing()
        };
        let out = fill(&TemplateDefinition::default(), &sample_resume(), None, &filler, &FillOptions::default()).await;
        assert_eq!(out.template, filled);
        assert_eq!(out.sections[0].tier, ResolutionTier::External);
    }

    fn flagged_rules(section: &str, field: &str) -> CompiledRuleSet {
        let rules: FieldMappingRuleSet = serde_json::from_value(json!({"field_mapping": {section: {
            field: {"data_source": "", "type": "direct", "needs_ai_extraction": true}
        }}}))
        .unwrap();
        CompiledRuleSet::compile(&rules).unwrap()
    }

    #[tokio::test]
    async fn test_textarea_list_matches_across_tiers() {
        let t = template(json!({"components": [{"type": "work_experience", "fields": [
            {"id": "responsibilities", "type": "textarea"},
            {"id": "highlight", "type": "textarea"}
        ]}]}));
        let mut resume = CanonicalResume::default();
        resume.work_experiences = vec![WorkExperience {
            company: "Now Co".into(),
            responsibilities: Descriptive::plain(vec!["Led the team".into(), "Shipped v2".into()]),
            ..Default::default()
        }];
        let filler = StubFiller::replying(json!(["Led the team", "Shipped v2"]));
        let compiled = flagged_rules("work_experience", "highlight");

        let out = fill(&t, &resume, Some(&compiled), &filler, &FillOptions::default()).await;
        let row = &out.template.components[0].data.as_ref().unwrap()["rows"][0];
        assert_eq!(row["responsibilities"], "Led the team Shipped v2");
        assert_eq!(row["highlight"], row["responsibilities"]);
    }

    #[tokio::test]
    async fn test_external_value_is_scrubbed() {
        let t = template(json!({"components": [{"type": "basic_info", "fields": [{"id": "objective"}]}]}));
        let filler = StubFiller::replying(json!("● Build → platforms\nat scale\n\n• Grow ↓ people"));
        let compiled = flagged_rules("basic_info", "objective");

        let out = fill(&t, &sample_resume(), Some(&compiled), &filler, &FillOptions::default()).await;
        assert_eq!(
            out.template.components[0].data.as_ref().unwrap()["objective"],
            "Build platforms at scale\n\nGrow people"
        );
        assert_eq!(out.sections[0].external_filled, 1);
    }

    #[tokio::test]
    async fn test_external_untyped_skills_field_is_list() {
        let t = template(json!({"components": [{"type": "skills", "fields": [{"id": "technical"}, {"id": "certifications"}]}]}));
        let filler = StubFiller::replying(json!("AWS SAA, CKA"));
        let compiled = flagged_rules("skills", "certifications");

        let out = fill(&t, &sample_resume(), Some(&compiled), &filler, &FillOptions::default()).await;
        let data = out.template.components[0].data.as_ref().unwrap();
        assert_eq!(data["technical"], json!(["Rust", "Kafka"]));
        assert_eq!(data["certifications"], json!(["AWS SAA", "CKA"]));
    }

    #[tokio::test]
    async fn test_blank_external_value_is_not_counted() {
        let t = template(json!({"components": [{"type": "basic_info", "fields": [{"id": "objective"}]}]}));
        let filler = StubFiller::replying(json!(" → "));
        let compiled = flagged_rules("basic_info", "objective");

        let out = fill(&t, &sample_resume(), Some(&compiled), &filler, &FillOptions::default()).await;
        assert_eq!(out.template.components[0].data.as_ref().unwrap()["objective"], "");
        assert_eq!(out.sections[0].external_filled, 0);
    }

    #[tokio::test]
    async fn test_unstructured_sections_are_post_processed() {
        let filled = template(json!({"components": [
            {"type": "experience", "data": {"rows": [
                {"duties": ["Led the team", " ", "Shipped v2"], "meta": {"note": "a\nb"}}
            ]}},
            {"type": "skills", "data": {"tools": "Rust, Go"}},
            {"type": "summary", "fields": [{"id": "text", "type": "list"}], "data": {"text": "x, y"}}
        ]}));
        let filler = StubFiller {
            template: Some(filled),
            ..StubFiller::failing()
        };
        let out = fill(&TemplateDefinition::default(), &sample_resume(), None, &filler, &FillOptions::default()).await;
        let c = &out.template.components;
        assert_eq!(c[0].data.as_ref().unwrap()["rows"][0]["duties"], "Led the team Shipped v2");
        assert_eq!(c[0].data.as_ref().unwrap()["rows"][0]["meta"], json!({"note": "a b"}));
        assert_eq!(c[1].data.as_ref().unwrap()["tools"], json!(["Rust", "Go"]));
        assert_eq!(c[2].data.as_ref().unwrap()["text"], json!(["x", "y"]));
    }
}
