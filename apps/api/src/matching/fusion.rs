//! Score fusion: vector similarity, filter pass ratio, qualitative LLM score
//! and organisational fit, each scaled to 0-10 and combined by weight.

use tracing::debug;

use crate::matching::models::{
    FusionWeights, JobPosition, LabelThresholds, LlmAnalysis, MatchLabel, MatchModel, ScoreBreakdown,
};
use crate::screening::models::Evaluation;

/// Org fit assumed when the analysis does not provide one.
pub const ORG_SCORE_NEUTRAL: f64 = 0.5;

const TECHNICAL_KEYWORDS: &[&str] = &[
    "技术", "研发", "开发", "工程师", "程序员", "架构师", "算法",
    "engineer", "developer", "programmer", "architect", "algorithm", "software", "devops",
];
const MANAGERIAL_KEYWORDS: &[&str] = &[
    "管理", "总监", "经理", "主管", "负责人", "leader", "manager", "director", "head of",
];
const SALES_KEYWORDS: &[&str] = &[
    "销售", "市场", "商务", "bd", "sales", "marketing", "business development", "account executive",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFamily {
    Technical,
    Managerial,
    Sales,
    General,
}

impl RoleFamily {
    /// Checked in order technical, managerial, sales: "技术经理" is technical.
    pub fn of_title(title: &str) -> Self {
        let title = title.to_lowercase();
        let hit = |words: &[&str]| words.iter().any(|w| title.contains(w));
        if hit(TECHNICAL_KEYWORDS) {
            RoleFamily::Technical
        } else if hit(MANAGERIAL_KEYWORDS) {
            RoleFamily::Managerial
        } else if hit(SALES_KEYWORDS) {
            RoleFamily::Sales
        } else {
            RoleFamily::General
        }
    }

    pub fn adjust(self, base: FusionWeights) -> FusionWeights {
        let (vector, llm, rule) = match self {
            RoleFamily::Technical => (0.4, 0.4, 0.2),
            RoleFamily::Managerial => (0.2, 0.6, 0.2),
            RoleFamily::Sales => (0.2, 0.3, 0.5),
            RoleFamily::General => return base,
        };
        FusionWeights {
            vector,
            llm,
            rule,
            org: 0.0,
        }
    }
}

/// Inputs to one fusion. `None` marks a signal that could not be obtained.
#[derive(Debug, Clone, Copy)]
pub struct Signals<'a> {
    pub vector_similarity: Option<f64>,
    pub filter: Option<&'a Evaluation>,
    pub analysis: &'a LlmAnalysis,
    pub org_score: Option<f64>,
}

fn clamp(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 1.0 when the set passed or has no rules, otherwise passed/total.
pub fn rule_ratio(filter: Option<&Evaluation>) -> f64 {
    match filter {
        None => 1.0,
        Some(eval) if eval.passed || eval.total_rules == 0 => 1.0,
        Some(eval) => eval.passed_rules as f64 / eval.total_rules as f64,
    }
}

/// `organization_match.score / 10`, capped at 1.
pub fn extract_org_score(analysis: &LlmAnalysis) -> Option<f64> {
    if analysis.failed {
        return None;
    }
    analysis
        .organization_match
        .as_ref()
        .map(|org| clamp(org.score, 10.0) / 10.0)
}

pub fn label_for(score: f64, thresholds: &LabelThresholds) -> MatchLabel {
    if score >= thresholds.strongly_recommended {
        MatchLabel::StronglyRecommended
    } else if score >= thresholds.recommended {
        MatchLabel::Recommended
    } else if score >= thresholds.cautious {
        MatchLabel::Cautious
    } else {
        MatchLabel::NotRecommended
    }
}

/// Weights for a job: the tenant model (or defaults), then the title heuristic.
pub fn weights_for(job: Option<&JobPosition>, model: Option<&MatchModel>) -> FusionWeights {
    let base = model.map(|m| m.weights).unwrap_or_default();
    match job {
        Some(job) => RoleFamily::of_title(&job.title).adjust(base),
        None => base,
    }
}

pub fn fuse(signals: Signals<'_>, job: Option<&JobPosition>, model: Option<&MatchModel>) -> ScoreBreakdown {
    let weights = weights_for(job, model);
    let thresholds = model.map(|m| m.thresholds).unwrap_or_default();
    let mut degraded = Vec::new();

    let vector = match signals.vector_similarity {
        Some(v) => clamp(v, 1.0),
        None => {
            degraded.push("vector similarity unavailable, using 0.0".to_string());
            0.0
        }
    };
    let llm = if signals.analysis.failed {
        degraded.push("qualitative analysis failed, using 0".to_string());
        0.0
    } else {
        clamp(signals.analysis.score, 10.0)
    };
    let org = match signals.org_score {
        Some(o) => clamp(o, 1.0),
        None => {
            degraded.push(format!("organisational fit unavailable, using {ORG_SCORE_NEUTRAL}"));
            ORG_SCORE_NEUTRAL
        }
    };

    let vector_score = vector * 10.0;
    let rule_score = rule_ratio(signals.filter) * 10.0;
    let llm_score = llm;
    let org_score = org * 10.0;

    let final_score = clamp(
        weights.vector * vector_score
            + weights.rule * rule_score
            + weights.llm * llm_score
            + weights.org * org_score,
        10.0,
    );
    let label = label_for(final_score, &thresholds);
    let calculation = format!(
        "{vector_score:.2} * {:.2} + {rule_score:.2} * {:.2} + {llm_score:.2} * {:.2} + {org_score:.2} * {:.2} = {final_score:.2}",
        weights.vector, weights.rule, weights.llm, weights.org
    );
    debug!(%calculation, label = label.as_str(), "scores fused");

    ScoreBreakdown {
        vector_score: round2(vector_score),
        rule_score: round2(rule_score),
        llm_score: round2(llm_score),
        org_score: round2(org_score),
        final_score: round2(final_score),
        weights,
        calculation,
        label,
        degraded,
    }
}
