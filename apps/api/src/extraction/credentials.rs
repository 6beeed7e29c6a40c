//! Education vocabulary shared by the normalizer and the education filter.
//!
//! Two kinds of words show up in education data and must not be confused:
//! a *tier* (本科, 研究生, high school) belongs in `education_level`, a *title*
//! (学士, 硕士, PhD) belongs in `degree`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicLevel {
    MiddleSchool = 0,
    HighSchool = 1,
    Associate = 2,
    Bachelor = 3,
    Master = 4,
    Doctorate = 5,
}

impl AcademicLevel {
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Tier,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential {
    pub level: AcademicLevel,
    pub kind: CredentialKind,
}

use AcademicLevel::*;
use CredentialKind::*;

/// Substring vocabulary, most specific first.
const CONTAINS: &[(&str, AcademicLevel, CredentialKind)] = &[
    ("博士", Doctorate, Title),
    ("doctorate", Doctorate, Title),
    ("doctor", Doctorate, Title),
    ("硕士", Master, Title),
    ("master", Master, Title),
    ("研究生", Master, Tier),
    ("postgraduate", Master, Tier),
    ("undergraduate", Bachelor, Tier),
    ("graduate", Master, Tier),
    ("学士", Bachelor, Title),
    ("bachelor", Bachelor, Title),
    ("本科", Bachelor, Tier),
    ("大专", Associate, Tier),
    ("专科", Associate, Tier),
    ("高职", Associate, Tier),
    ("associate", Associate, Tier),
    ("中专", HighSchool, Tier),
    ("高中", HighSchool, Tier),
    ("high school", HighSchool, Tier),
    ("初中", MiddleSchool, Tier),
    ("middle school", MiddleSchool, Tier),
];

/// Abbreviations that are only trusted as the whole value.
const EXACT: &[(&str, AcademicLevel, CredentialKind)] = &[
    ("phd", Doctorate, Title),
    ("ph.d", Doctorate, Title),
    ("ph.d.", Doctorate, Title),
    ("ms", Master, Title),
    ("m.s.", Master, Title),
    ("msc", Master, Title),
    ("m.sc", Master, Title),
    ("mba", Master, Title),
    ("meng", Master, Title),
    ("ma", Master, Title),
    ("bs", Bachelor, Title),
    ("b.s.", Bachelor, Title),
    ("bsc", Bachelor, Title),
    ("b.sc", Bachelor, Title),
    ("ba", Bachelor, Title),
    ("b.a.", Bachelor, Title),
    ("beng", Bachelor, Title),
];

pub fn classify(value: &str) -> Option<Credential> {
    let lowered = value.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    EXACT
        .iter()
        .find(|(word, _, _)| lowered == *word)
        .or_else(|| CONTAINS.iter().find(|(word, _, _)| lowered.contains(word)))
        .map(|&(_, level, kind)| Credential { level, kind })
}

pub fn level_of(value: &str) -> Option<AcademicLevel> {
    classify(value).map(|c| c.level)
}

/// The `education_level` label for graduate study, in the language of `sample`.
pub fn graduate_tier_label(sample: &str) -> &'static str {
    if sample.chars().any(is_cjk) {
        "研究生"
    } else {
        "graduate"
    }
}

/// The `education_level` label for a tier, in the language of `sample`.
pub fn tier_label(level: AcademicLevel, sample: &str) -> &'static str {
    let cjk = sample.chars().any(is_cjk);
    match (level, cjk) {
        (Doctorate | Master, _) => graduate_tier_label(sample),
        (Bachelor, true) => "本科",
        (Bachelor, false) => "bachelor",
        (Associate, true) => "专科",
        (Associate, false) => "associate",
        (HighSchool, true) => "高中",
        (HighSchool, false) => "high school",
        (MiddleSchool, true) => "初中",
        (MiddleSchool, false) => "middle school",
    }
}

/// Canonical spelling of a degree title, keeping the source language.
pub fn canonical_title(value: &str) -> Option<&'static str> {
    let credential = classify(value)?;
    if credential.kind != Title && value.trim() != "研究生" {
        return None;
    }
    let cjk = value.chars().any(is_cjk);
    Some(match (credential.level, cjk) {
        (Doctorate, true) => "博士",
        (Doctorate, false) => "Doctorate",
        (Master, true) => "硕士",
        (Master, false) => "Master",
        (Bachelor, true) => "学士",
        (Bachelor, false) => "Bachelor",
        _ => return None,
    })
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
