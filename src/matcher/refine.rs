//! Boundary refinement
//!
//! Coarse hits are grouped into runs of adjacent sentences. Each run spans a
//! candidate token range, which the oracle narrows to the smallest range
//! still evidencing the rule. Any failure keeps the whole candidate.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::oracle::{parse_lenient, Oracle};
use crate::prompts::{PromptStore, BOUNDARY_PROMPT};
use crate::segment::Chunk;

use super::{CoarseMatch, ExactSpanMatch, MatchError, Rule};

/// Maximal group of adjacent hit sentences, as inclusive chunk-local token
/// bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceRun {
    pub first_sentence: usize,
    pub last_sentence: usize,
    pub token_start: usize,
    pub token_end: usize,
}

impl SentenceRun {
    pub fn token_count(&self) -> usize {
        self.token_end - self.token_start + 1
    }
}

/// Group a coarse hit's sentences into runs of consecutive positions.
///
/// Unknown sentence ids are ignored.
pub fn sentence_runs(chunk: &Chunk, hit: &CoarseMatch) -> Vec<SentenceRun> {
    let mut positions: Vec<usize> = hit
        .sentence_ids
        .iter()
        .filter_map(|id| chunk.sentence_position(id))
        .collect();
    positions.sort_unstable();
    positions.dedup();

    let mut groups: Vec<(usize, usize)> = Vec::new();
    for pos in positions {
        match groups.last_mut() {
            Some((_, last)) if *last + 1 == pos => *last = pos,
            _ => groups.push((pos, pos)),
        }
    }

    groups
        .into_iter()
        .map(|(first, last)| SentenceRun {
            first_sentence: first,
            last_sentence: last,
            token_start: chunk.sentences[first].token_start,
            token_end: chunk.sentences[last].token_end,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct BoundaryResponse {
    start: i64,
    end: i64,
}

/// Structured-output schema for the boundary answer
pub fn boundary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "start": { "type": "integer" },
            "end": { "type": "integer" }
        },
        "required": ["start", "end"]
    })
}

/// Narrows candidate spans to exact token ranges
#[derive(Clone)]
pub struct BoundaryRefiner {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptStore>,
}

impl BoundaryRefiner {
    pub fn new(oracle: Arc<dyn Oracle>, prompts: Arc<PromptStore>) -> Self {
        Self { oracle, prompts }
    }

    pub fn build_prompt(&self, chunk: &Chunk, rule: &Rule, run: &SentenceRun) -> Result<String, MatchError> {
        let tokens = &chunk.tokens()[run.token_start..=run.token_end];
        let plain_text = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let token_lines = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}: {}", i, t.text))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(self.prompts.render(
            BOUNDARY_PROMPT,
            &[
                ("rule_id", &rule.id),
                ("rule_terms", &rule.definition),
                ("plain_text", &plain_text),
                ("token_lines", &token_lines),
            ],
        )?)
    }

    /// Candidate-relative inclusive bounds chosen by the oracle
    pub async fn try_refine(&self, chunk: &Chunk, rule: &Rule, run: &SentenceRun) -> Result<(usize, usize), MatchError> {
        let prompt = self.build_prompt(chunk, rule, run)?;
        let raw = self.oracle.complete(&prompt, &boundary_schema()).await?;
        let BoundaryResponse { start, end } = parse_lenient(&raw)?;

        let len = run.token_count();
        if start < 0 || start > end || end >= len as i64 {
            return Err(MatchError::OutOfRange { start, end, len });
        }
        Ok((start as usize, end as usize))
    }

    /// Exact span for one run, falling back to the full candidate
    pub async fn refine(&self, chunk: &Chunk, rule: &Rule, run: &SentenceRun) -> ExactSpanMatch {
        match self.try_refine(chunk, rule, run).await {
            Ok((start, end)) => ExactSpanMatch {
                rule_id: rule.id.clone(),
                start: run.token_start + start,
                end: run.token_start + end,
                refined: true,
            },
            Err(e) => {
                tracing::debug!(
                    chunk = chunk.index,
                    rule = %rule.id,
                    "Keeping coarse span {}..={}: {}",
                    run.token_start,
                    run.token_end,
                    e
                );
                ExactSpanMatch {
                    rule_id: rule.id.clone(),
                    start: run.token_start,
                    end: run.token_end,
                    refined: false,
                }
            }
        }
    }
}
