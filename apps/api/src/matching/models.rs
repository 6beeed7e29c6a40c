use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::matching::{JobPositionRow, MatchModelRow, MatchResultRow};
use crate::screening::models::Evaluation;

// ────────────────────────────────────────────────────────────────────────────
// Match model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    #[serde(rename = "vector_weight")]
    pub vector: f64,
    #[serde(rename = "rule_weight")]
    pub rule: f64,
    #[serde(rename = "llm_weight")]
    pub llm: f64,
    #[serde(rename = "org_weight")]
    pub org: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.3,
            rule: 0.2,
            llm: 0.5,
            org: 0.0,
        }
    }
}

/// Lower bounds (inclusive) of each label on the 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelThresholds {
    pub strongly_recommended: f64,
    pub recommended: f64,
    pub cautious: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            strongly_recommended: 8.5,
            recommended: 7.0,
            cautious: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLabel {
    StronglyRecommended,
    Recommended,
    Cautious,
    NotRecommended,
}

impl MatchLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchLabel::StronglyRecommended => "strongly_recommended",
            MatchLabel::Recommended => "recommended",
            MatchLabel::Cautious => "cautious",
            MatchLabel::NotRecommended => "not_recommended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "strongly_recommended" => MatchLabel::StronglyRecommended,
            "recommended" => MatchLabel::Recommended,
            "cautious" => MatchLabel::Cautious,
            "not_recommended" => MatchLabel::NotRecommended,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchModel {
    pub id: Uuid,
    pub name: String,
    pub weights: FusionWeights,
    pub thresholds: LabelThresholds,
    pub is_default: bool,
}

impl From<&MatchModelRow> for MatchModel {
    /// Accepts `{"weights": {...}, "thresholds": {...}}` as well as the older
    /// flat `{"vector_weight": ..}` config.
    fn from(row: &MatchModelRow) -> Self {
        let weights = row
            .config
            .get("weights")
            .unwrap_or(&row.config)
            .clone();
        let thresholds = row.config.get("thresholds").cloned().unwrap_or(Value::Null);
        Self {
            id: row.id,
            name: row.name.clone(),
            weights: serde_json::from_value(weights).unwrap_or_default(),
            thresholds: serde_json::from_value(thresholds).unwrap_or_default(),
            is_default: row.is_default,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosition {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
}

impl From<JobPositionRow> for JobPosition {
    fn from(row: JobPositionRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            title: row.title,
            description: row.description,
            requirements: row.requirements,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Qualitative analysis
// ────────────────────────────────────────────────────────────────────────────

pub const ANALYSIS_FAILED: &str = "analysis failed";

/// Scores sometimes come back as strings ("8.5") or null.
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: f64,
    #[serde(default)]
    pub analysis: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmAnalysis {
    #[serde(deserialize_with = "lenient_score")]
    pub score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub risk_points: Vec<String>,
    pub organization_match: Option<SubScore>,
    pub culture_match: Option<SubScore>,
    pub recommendation: String,
    pub detailed_analysis: String,
    /// Set when the analysis could not be produced and the fields are defaults.
    pub failed: bool,
}

impl LlmAnalysis {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            recommendation: ANALYSIS_FAILED.to_string(),
            detailed_analysis: reason.into(),
            failed: true,
            ..Default::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vector_score: f64,
    pub rule_score: f64,
    pub llm_score: f64,
    pub org_score: f64,
    pub final_score: f64,
    pub weights: FusionWeights,
    pub calculation: String,
    pub label: MatchLabel,
    /// Signals that were missing and replaced by a neutral default.
    #[serde(default)]
    pub degraded: Vec<String>,
}

/// Everything a match produces, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub tenant_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub score: f64,
    pub label: MatchLabel,
    pub breakdown: ScoreBreakdown,
    pub analysis: LlmAnalysis,
    pub filter: Evaluation,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: MatchRecord,
    pub status: String,
}

impl TryFrom<MatchResultRow> for MatchResult {
    type Error = serde_json::Error;

    fn try_from(row: MatchResultRow) -> Result<Self, Self::Error> {
        let breakdown: ScoreBreakdown = serde_json::from_value(row.breakdown)?;
        Ok(Self {
            id: row.id,
            record: MatchRecord {
                tenant_id: row.tenant_id,
                resume_id: row.resume_id,
                job_id: row.job_id,
                score: row.match_score,
                label: MatchLabel::parse(&row.label).unwrap_or(breakdown.label),
                breakdown,
                analysis: serde_json::from_value(row.llm_analysis)?,
                filter: serde_json::from_value(row.filter_result)?,
                partial: row.is_partial,
            },
            status: row.status,
        })
    }
}
