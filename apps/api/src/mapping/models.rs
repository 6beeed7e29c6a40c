use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extraction::recovery::PartialParse;

// ────────────────────────────────────────────────────────────────────────────
// Template definition (stored wire shape)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateDefinition {
    #[serde(default, alias = "sections")]
    pub components: Vec<TemplateSection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateDefinition {
    pub fn is_unstructured(&self) -> bool {
        self.components.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateSection {
    #[serde(rename = "type", default)]
    pub section_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub config: SectionConfig,
    /// Filled content: `{field_id: value}` or `{"rows": [...]}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateSection {
    pub fn kind(&self) -> SectionKind {
        SectionKind::from_tag(&self.section_type)
    }

    /// Declared fields, or the table columns when a section declares none.
    pub fn effective_fields(&self) -> &[FieldSpec] {
        if self.fields.is_empty() {
            &self.config.table_columns
        } else {
            &self.fields
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SectionConfig {
    #[serde(rename = "tableColumns", default, skip_serializing_if = "Vec::is_empty")]
    pub table_columns: Vec<FieldSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "dataSource", alias = "data_source", default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl FieldSpec {
    pub fn simple(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    /// The id a filled value is stored under: `id`, then `field`, then `name`.
    pub fn key(&self) -> Option<&str> {
        [&self.id, &self.field, &self.name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    pub fn shape(&self) -> FieldShape {
        match self
            .field_type
            .as_deref()
            .or(self.format.as_deref())
            .map(|t| t.to_lowercase())
            .as_deref()
        {
            Some("textarea" | "richtext" | "multiline") => FieldShape::Textarea,
            Some("list" | "tags" | "array") => FieldShape::List,
            _ => FieldShape::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Text,
    Textarea,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionKind {
    BasicInfo,
    WorkExperience,
    Education,
    Skills,
    Projects,
    Other(String),
}

impl SectionKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "basic_info" | "basic" | "personal_info" | "basicinfo" => Self::BasicInfo,
            "work_experience" | "work_experiences" | "experience" | "work" => Self::WorkExperience,
            "education" | "educations" => Self::Education,
            "skills" | "skill" => Self::Skills,
            "projects" | "project" | "project_experience" | "project_experiences" => Self::Projects,
            other => Self::Other(other.to_string()),
        }
    }

    /// The key rule sets are stored under.
    pub fn as_key(&self) -> &str {
        match self {
            Self::BasicInfo => "basic_info",
            Self::WorkExperience => "work_experience",
            Self::Education => "education",
            Self::Skills => "skills",
            Self::Projects => "projects",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::WorkExperience | Self::Education | Self::Projects)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mapping rule set (persisted next to the template)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldMappingRuleSet {
    /// section type → field id → rule
    #[serde(default)]
    pub field_mapping: BTreeMap<String, BTreeMap<String, FieldRule>>,
    #[serde(default)]
    pub complex_fields: Vec<String>,
}

impl FieldMappingRuleSet {
    /// An empty rule set means heuristic resolution, not "no values".
    pub fn is_valid(&self) -> bool {
        !self.field_mapping.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldRule {
    #[serde(default)]
    pub data_source: String,
    #[serde(rename = "type", default)]
    pub kind: ResolutionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(default, alias = "needs_external_fill")]
    pub needs_ai_extraction: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    #[default]
    Direct,
    Fallback,
    Combine,
    #[serde(other)]
    Unknown,
}

// ────────────────────────────────────────────────────────────────────────────
// Fill output
// ────────────────────────────────────────────────────────────────────────────

/// Which tier produced a section's values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Rule,
    Heuristic,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionReport {
    pub section_index: usize,
    pub section_type: String,
    pub tier: ResolutionTier,
    pub external_requested: usize,
    pub external_filled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilledTemplate {
    pub template: TemplateDefinition,
    pub sections: Vec<SectionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialParse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_wire_shape() {
        let raw = json!({
            "name": "Standard",
            "components": [
                {"type": "basic_info", "title": "Profile", "fields": [
                    {"id": "name", "label": "Name", "dataSource": "parsed_data.basic_info.name"},
                    {"field": "phone", "type": "text"}
                ]},
                {"type": "projects", "config": {"tableColumns": [{"name": "project_name"}, {"id": "role"}]}}
            ]
        });
        let t: TemplateDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(t.extra["name"], "Standard");
        assert_eq!(t.components[0].kind(), SectionKind::BasicInfo);
        assert_eq!(t.components[0].fields[1].key(), Some("phone"));
        let cols = t.components[1].effective_fields();
        assert_eq!(cols[0].key(), Some("project_name"));
        assert!(t.components[1].kind().is_collection());
    }

    #[test]
    fn test_rule_set_validity() {
        assert!(!FieldMappingRuleSet::default().is_valid());
        let rules: FieldMappingRuleSet = serde_json::from_value(json!({
            "field_mapping": {"basic_info": {"name": {"data_source": "parsed_data.basic_info.name", "type": "direct"}}},
            "complex_fields": []
        }))
        .unwrap();
        assert!(rules.is_valid());
        assert_eq!(rules.field_mapping["basic_info"]["name"].kind, ResolutionKind::Direct);
    }

    #[test]
    fn test_unknown_resolution_kind_is_tolerated() {
        let rule: FieldRule = serde_json::from_value(json!({"data_source": "x", "type": "magic"})).unwrap();
        assert_eq!(rule.kind, ResolutionKind::Unknown);
    }

    #[test]
    fn test_field_shape() {
        let f = FieldSpec {
            field_type: Some("Textarea".into()),
            ..FieldSpec::simple("summary")
        };
        assert_eq!(f.shape(), FieldShape::Textarea);
        assert_eq!(FieldSpec::simple("x").shape(), FieldShape::Text);
    }
}
