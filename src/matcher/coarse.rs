//! Coarse relevance selection
//!
//! One oracle call per chunk listing every rule and every sentence. The
//! answer maps rule ids to sentence ids; ids the chunk does not contain are
//! discarded silently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::oracle::{parse_lenient, Oracle};
use crate::prompts::{PromptStore, COARSE_PROMPT};
use crate::segment::Chunk;

use super::{CoarseMatch, MatchError, Rule};

#[derive(Debug, Deserialize)]
struct CoarseResponse {
    #[serde(default)]
    matches: Vec<CoarseResponseItem>,
}

#[derive(Debug, Deserialize)]
struct CoarseResponseItem {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    sentence_ids: Vec<String>,
}

/// Structured-output schema for the coarse answer
pub fn coarse_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "matches": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "rule_id": { "type": "string" },
                        "sentence_ids": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["rule_id", "sentence_ids"]
                }
            }
        },
        "required": ["matches"]
    })
}

/// Selects candidate sentences per rule
#[derive(Clone)]
pub struct CoarseSelector {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptStore>,
}

impl CoarseSelector {
    pub fn new(oracle: Arc<dyn Oracle>, prompts: Arc<PromptStore>) -> Self {
        Self { oracle, prompts }
    }

    pub fn build_prompt(&self, chunk: &Chunk, rules: &[Rule]) -> Result<String, MatchError> {
        let rule_descriptions = rules
            .iter()
            .map(|r| format!("- ID \"{}\": {}", r.id, r.definition))
            .collect::<Vec<_>>()
            .join("\n");
        let sentence_block = chunk
            .sentences
            .iter()
            .map(|s| format!("{}: {}", s.id, s.text))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(self.prompts.render(
            COARSE_PROMPT,
            &[
                ("rule_descriptions", &rule_descriptions),
                ("sentence_block", &sentence_block),
            ],
        )?)
    }

    /// Ask the oracle for this chunk's coarse matches
    pub async fn try_select(&self, chunk: &Chunk, rules: &[Rule]) -> Result<Vec<CoarseMatch>, MatchError> {
        if chunk.sentences.is_empty() || rules.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = self.build_prompt(chunk, rules)?;
        let raw = self.oracle.complete(&prompt, &coarse_schema()).await?;
        let response: CoarseResponse = parse_lenient(&raw)?;

        Ok(resolve_matches(chunk, rules, response))
    }

    /// Coarse matches, or none if the oracle call or its answer failed
    pub async fn select(&self, chunk: &Chunk, rules: &[Rule]) -> Option<Vec<CoarseMatch>> {
        match self.try_select(chunk, rules).await {
            Ok(matches) => {
                tracing::debug!(chunk = chunk.index, hits = matches.len(), "Coarse selection done");
                Some(matches)
            }
            Err(e) => {
                tracing::error!(chunk = chunk.index, "Coarse selection failed, skipping chunk: {}", e);
                None
            }
        }
    }
}

/// Keep known rules and sentences, merge repeated rules, order by request
/// rule order and sentence position
fn resolve_matches(chunk: &Chunk, rules: &[Rule], response: CoarseResponse) -> Vec<CoarseMatch> {
    let mut positions_by_rule: HashMap<&str, Vec<usize>> = HashMap::new();

    for item in response.matches {
        let Some(rule) = item
            .rule_id
            .as_deref()
            .and_then(|id| rules.iter().find(|r| r.id == id.trim()))
        else {
            tracing::debug!(chunk = chunk.index, rule = ?item.rule_id, "Discarding unknown rule id");
            continue;
        };

        let positions = positions_by_rule.entry(rule.id.as_str()).or_default();
        for sid in &item.sentence_ids {
            match chunk.sentence_position(sid.trim()) {
                Some(pos) => positions.push(pos),
                None => {
                    tracing::debug!(chunk = chunk.index, sentence = %sid, "Discarding unknown sentence id");
                }
            }
        }
    }

    rules
        .iter()
        .filter_map(|rule| {
            let mut positions = positions_by_rule.remove(rule.id.as_str())?;
            positions.sort_unstable();
            positions.dedup();
            if positions.is_empty() {
                return None;
            }
            Some(CoarseMatch {
                rule_id: rule.id.clone(),
                sentence_ids: positions
                    .into_iter()
                    .map(|p| chunk.sentences[p].id.clone())
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FnOracle, OracleError};
    use crate::segment::{Chunker, PunctuationSplitter, Token};

    fn chunk(text: &str) -> Chunk {
        let tokens: Vec<Token> = text
            .split_whitespace()
            .map(|w| Token {
                text: w.to_string(),
                rect: None,
                page: 0,
            })
            .collect();
        Chunker::default()
            .chunk(tokens.into(), &PunctuationSplitter::default())
            .remove(0)
    }

    fn selector(respond: impl Fn(&str, &Value) -> Result<String, OracleError> + Send + Sync + 'static) -> CoarseSelector {
        CoarseSelector::new(Arc::new(FnOracle::new(respond)), Arc::new(PromptStore::builtin()))
    }

    #[test]
    fn test_prompt_lists_rules_and_sentences() {
        let c = chunk("Intro text. We validated the results experimentally.");
        let s = selector(|_, _| Ok(String::new()));
        let prompt = s.build_prompt(&c, &[Rule::new("R1", "tests")]).unwrap();
        assert!(prompt.contains("- ID \"R1\": tests"));
        assert!(prompt.contains("S1: Intro text."));
        assert!(prompt.contains("S2: We validated the results experimentally."));
    }

    #[tokio::test]
    async fn test_discards_hallucinated_ids() {
        let c = chunk("One. Two. Three.");
        let s = selector(|_, _| {
            Ok(r#"{"matches": [
                {"rule_id": "R1", "sentence_ids": ["S3", "S9", "S1"]},
                {"rule_id": "R7", "sentence_ids": ["S2"]},
                {"rule_id": "R2", "sentence_ids": ["S42"]}
            ]}"#
            .to_string())
        });
        let rules = [Rule::new("R1", "a"), Rule::new("R2", "b")];

        let matches = s.try_select(&c, &rules).await.unwrap();
        assert_eq!(
            matches,
            vec![CoarseMatch {
                rule_id: "R1".to_string(),
                sentence_ids: vec!["S1".to_string(), "S3".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_repeated_rule_entries_are_merged() {
        let c = chunk("One. Two. Three.");
        let s = selector(|_, _| {
            Ok(r#"```json
{"matches": [{"rule_id": "R1", "sentence_ids": ["S2"]}, {"rule_id": "R1", "sentence_ids": ["S1", "S2"]}]}
```"#
                .to_string())
        });

        let matches = s.try_select(&c, &[Rule::new("R1", "a")]).await.unwrap();
        assert_eq!(matches[0].sentence_ids, vec!["S1", "S2"]);
    }

    #[tokio::test]
    async fn test_unparsable_answer_skips_chunk() {
        let c = chunk("One. Two.");
        let s = selector(|_, _| Ok("I am unable to help with that.".to_string()));
        assert!(s.select(&c, &[Rule::new("R1", "a")]).await.is_none());

        let s = selector(|_, _| Err(OracleError::Unavailable("down".to_string())));
        assert!(s.select(&c, &[Rule::new("R1", "a")]).await.is_none());
    }
}
