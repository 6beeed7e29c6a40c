use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::recovery::PartialParse;

/// A descriptive field that may have been polished by the model.
///
/// `optimized` is present only when the field went through enhancement; the
/// display form prefers it and falls back to `raw`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Descriptive {
    #[serde(default)]
    pub raw: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<Vec<String>>,
}

impl Descriptive {
    pub fn plain(items: Vec<String>) -> Self {
        Self {
            raw: items,
            optimized: None,
        }
    }

    pub fn enhanced(raw: Vec<String>, optimized: Vec<String>) -> Self {
        Self {
            raw,
            optimized: Some(optimized),
        }
    }

    pub fn display_items(&self) -> &[String] {
        match &self.optimized {
            Some(items) if items.iter().any(|s| !s.trim().is_empty()) => items,
            _ => &self.raw,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_items().iter().all(|s| s.trim().is_empty())
    }
}

/// A value the model inferred rather than read, with the reason it gave.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inferred<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImplicitAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<Inferred<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_domain: Option<Inferred<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<Inferred<Vec<String>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillsUsed {
    #[serde(default)]
    pub explicit: Vec<String>,
    #[serde(default)]
    pub implicit: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    /// YYYY-MM when recognisable, otherwise the source text.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_current: bool,
    pub location: Option<String>,
    pub responsibilities: Descriptive,
    pub achievements: Descriptive,
    pub skills_used: SkillsUsed,
    pub implicit_info: ImplicitAttributes,
    pub report_to: Option<String>,
    pub reason_for_leaving: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub major: Option<String>,
    /// Academic title: 学士 / 硕士 / 博士, Bachelor / Master / Doctorate.
    pub degree: Option<String>,
    /// Degree tier: 高中 / 专科 / 本科 / 研究生.
    pub education_level: Option<String>,
    pub start_date: Option<String>,
    pub graduation_date: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TechnicalSkills {
    #[serde(default)]
    pub explicit: Vec<String>,
    #[serde(default)]
    pub inferred: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Skills {
    #[serde(default)]
    pub technical: TechnicalSkills,
    #[serde(default)]
    pub soft: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl Skills {
    /// Explicit then inferred technical skills, without case-insensitive duplicates.
    pub fn technical_union(&self) -> Vec<String> {
        dedup_preserving_order(
            self.technical
                .explicit
                .iter()
                .chain(self.technical.inferred.iter())
                .cloned(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub description: Descriptive,
    pub role: Option<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    pub achievements: Descriptive,
    pub outcome: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The normalized resume every downstream consumer reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CanonicalResume {
    #[serde(default)]
    pub basic_info: BTreeMap<String, String>,
    /// Current job first, then by start date, newest first.
    #[serde(default)]
    pub work_experiences: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Set when the source was salvaged from truncated model output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialParse>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CanonicalResume {
    pub fn basic(&self, key: &str) -> Option<&str> {
        self.basic_info
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First non-empty basic-info value among `keys`.
    pub fn basic_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.basic(k))
    }
}

pub fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefers_optimized() {
        let d = Descriptive::enhanced(vec!["raw".into()], vec!["polished".into()]);
        assert_eq!(d.display_items(), ["polished".to_string()]);
    }

    #[test]
    fn test_display_falls_back_to_raw_when_optimized_blank() {
        let d = Descriptive::enhanced(vec!["raw".into()], vec!["  ".into()]);
        assert_eq!(d.display_items(), ["raw".to_string()]);
        assert!(!d.is_empty());
    }

    #[test]
    fn test_technical_union_dedups_case_insensitively() {
        let skills = Skills {
            technical: TechnicalSkills {
                explicit: vec!["Rust".into(), "SQL".into()],
                inferred: vec!["rust".into(), "Linux".into()],
            },
            ..Default::default()
        };
        assert_eq!(skills.technical_union(), vec!["Rust", "SQL", "Linux"]);
    }

    #[test]
    fn test_resume_round_trips_through_serde() {
        let mut resume = CanonicalResume::default();
        resume.basic_info.insert("name".into(), "Li".into());
        resume.work_experiences.push(WorkExperience {
            company: "Acme".into(),
            ..Default::default()
        });
        let v = serde_json::to_value(&resume).unwrap();
        assert_eq!(v["work_experiences"][0]["company"], "Acme");
        let back: CanonicalResume = serde_json::from_value(v).unwrap();
        assert_eq!(back, resume);
    }
}
