//! JSON recovery for untrusted model output.
//!
//! `recover` is the only way model text becomes a structured value in this
//! service. Stages run in order and stop at the first success:
//!
//! 1. strip markdown fences, strict decode
//! 2. cumulative text repairs (see `repair::REPAIRS`), strict decode after each
//! 3. truncation salvage, accepted only when at least half of the document
//!    survives; the result is then flagged with a [`PartialParse`]

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{error::Category, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::extraction::repair::REPAIRS;
use crate::extraction::truncation;

/// Minimum share of the document a truncation salvage must keep.
pub const MIN_RETAINED_RATIO: f64 = 0.5;

/// Characters of context reported on each side of a failure position.
const CONTEXT_RADIUS: usize = 100;

/// Marks a value that was salvaged from a truncated document.
///
/// `retained_ratio` is measured against the whole document and is what
/// consumers should surface. `acceptance_ratio` leaves out a dangling
/// unterminated string, since a cut inside a string value is a cut of that
/// value, and is the figure the 50% gate is applied to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartialParse {
    /// Length of the document that was salvaged from.
    pub original_len: usize,
    /// `original_len` minus any dangling unterminated string.
    #[serde(default)]
    pub measured_len: usize,
    pub retained_len: usize,
    pub retained_ratio: f64,
    #[serde(default)]
    pub acceptance_ratio: f64,
}

impl PartialParse {
    pub fn new(original_len: usize, measured_len: usize, retained_len: usize) -> Self {
        Self {
            original_len,
            measured_len,
            retained_len,
            retained_ratio: ratio(retained_len, original_len),
            acceptance_ratio: ratio(retained_len, measured_len),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64).min(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Recovered {
    pub value: Value,
    pub partial: Option<PartialParse>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model response is empty")]
    Empty,

    #[error("malformed JSON ({message}) near: {context}")]
    Malformed { message: String, context: String },

    #[error(
        "truncated JSON: only {retained_len} of {original_len} bytes could be salvaged near: {context}"
    )]
    InsufficientData {
        retained_len: usize,
        original_len: usize,
        context: String,
    },

    #[error("recovered JSON does not match the expected shape: {0}")]
    Shape(String),
}

/// Turns raw model text into a JSON value, repairing and salvaging as needed.
pub fn recover(text: &str) -> Result<Recovered, ParseError> {
    let body = strip_json_fences(text);
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let first_error = match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            return Ok(Recovered {
                value,
                partial: None,
            })
        }
        Err(e) => e,
    };
    debug!(error = %first_error, "strict decode failed, applying repairs");

    let mut candidate = body.to_string();
    let mut last_error = first_error;
    for repair in &REPAIRS {
        candidate = (repair.apply)(&candidate);
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => {
                debug!(repair = repair.name, "JSON repaired");
                return Ok(Recovered {
                    value,
                    partial: None,
                });
            }
            Err(e) => last_error = e,
        }
    }

    let limit = match last_error.classify() {
        Category::Eof => candidate.len(),
        Category::Syntax => error_offset(&candidate, &last_error),
        Category::Io | Category::Data => {
            return Err(malformed(&candidate, &last_error));
        }
    };

    let Some(salvage) = truncation::salvage(&candidate, limit) else {
        return Err(malformed(&candidate, &last_error));
    };

    let partial = PartialParse::new(candidate.len(), salvage.effective_len, salvage.retained_len);
    if partial.acceptance_ratio < MIN_RETAINED_RATIO {
        return Err(ParseError::InsufficientData {
            retained_len: partial.retained_len,
            original_len: partial.original_len,
            context: context_around(&candidate, salvage.retained_len),
        });
    }

    warn!(
        retained_len = partial.retained_len,
        original_len = partial.original_len,
        retained_ratio = partial.retained_ratio,
        acceptance_ratio = partial.acceptance_ratio,
        "model output was truncated; using salvaged prefix"
    );

    Ok(Recovered {
        value: salvage.value,
        partial: Some(partial),
    })
}

/// Recovers and then deserializes into `T`.
pub fn recover_as<T: DeserializeOwned>(text: &str) -> Result<(T, Option<PartialParse>), ParseError> {
    let recovered = recover(text)?;
    let typed = serde_json::from_value(recovered.value)
        .map_err(|e| ParseError::Shape(e.to_string()))?;
    Ok((typed, recovered.partial))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(|s| s.trim())
                .unwrap_or(stripped)
        }
        None => text,
    }
}

fn malformed(text: &str, err: &serde_json::Error) -> ParseError {
    ParseError::Malformed {
        message: err.to_string(),
        context: context_around(text, error_offset(text, err)),
    }
}

/// Byte offset of the character a serde_json error points at.
fn error_offset(text: &str, err: &serde_json::Error) -> usize {
    if err.line() == 0 {
        return 0;
    }
    let line_start: usize = text
        .split_inclusive('\n')
        .take(err.line() - 1)
        .map(str::len)
        .sum();
    (line_start + err.column().saturating_sub(1)).min(text.len())
}

fn context_around(text: &str, offset: usize) -> String {
    let mut start = offset.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (offset + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    text[start..end].to_string()
}
