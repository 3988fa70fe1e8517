//! Two-stage rule matching
//!
//! Per chunk: the coarse selector picks sentence ids per rule, hits are
//! grouped into runs of adjacent sentences, and the boundary refiner narrows
//! each run to an exact token span. The mapper turns spans into page
//! rectangles and drops duplicates rediscovered in overlapping chunks.

mod coarse;
mod mapper;
mod refine;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::Rect;
use crate::oracle::OracleError;
use crate::prompts::PromptError;

pub use coarse::{coarse_schema, CoarseSelector};
pub use mapper::{SpanKey, SpanMapper};
pub use refine::{boundary_schema, sentence_runs, BoundaryRefiner, SentenceRun};

/// A caller-defined concept to locate. Opaque to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(alias = "termsRaw")]
    pub definition: String,
}

impl Rule {
    pub fn new(id: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition: definition.into(),
        }
    }
}

/// Reject empty rule sets and duplicate ids
pub fn validate_rules(rules: &[Rule]) -> Result<(), String> {
    if rules.is_empty() {
        return Err("at least one rule is required".to_string());
    }
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(format!("duplicate rule id '{}'", rule.id));
        }
    }
    Ok(())
}

/// Sentences of one chunk selected for a rule, in sentence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoarseMatch {
    pub rule_id: String,
    pub sentence_ids: Vec<String>,
}

/// Inclusive chunk-local token span evidencing a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExactSpanMatch {
    pub rule_id: String,
    pub start: usize,
    pub end: usize,
    /// False when the span is the unrefined coarse candidate
    pub refined: bool,
}

/// Highlight rectangles for one rule on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMatch {
    pub rule_id: String,
    /// Page number (0-indexed)
    pub page_index: usize,
    pub rectangles: Vec<Rect>,
}

/// Per-stage matching failure. Never aborts a request.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Span {start}..={end} outside candidate of {len} tokens")]
    OutOfRange { start: i64, end: i64, len: usize },
}
