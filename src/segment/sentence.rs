//! Sentence segmentation strategies

use serde::Serialize;

use super::Token;

/// Sentence-like span inside one chunk.
///
/// `id` is chunk-local ("S1", "S2", ...) and only meaningful together with
/// the chunk that produced it. Token bounds are inclusive and chunk-local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceSpan {
    pub id: String,
    pub text: String,
    pub token_start: usize,
    pub token_end: usize,
}

impl SentenceSpan {
    pub fn token_count(&self) -> usize {
        self.token_end - self.token_start + 1
    }
}

/// Splits the tokens of one chunk into sentence spans.
///
/// Implementations must return spans that are contiguous, non-overlapping
/// and together cover every token of the input.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, tokens: &[Token]) -> Vec<SentenceSpan>;
}

/// Closing characters allowed after a sentence terminator
const CLOSERS: &[char] = &['"', '\'', ')', ']', '}', '\u{201D}', '\u{2019}', '\u{00BB}'];

/// Sentence terminators
const TERMINATORS: &[char] = &['.', '!', '?'];

/// Whether a token closes a sentence: it ends with a terminator, optionally
/// followed by closing quotes or brackets.
pub fn ends_sentence(token: &str) -> bool {
    token
        .trim_end_matches(CLOSERS)
        .ends_with(TERMINATORS)
}

/// Punctuation heuristic with a length cap
#[derive(Debug, Clone)]
pub struct PunctuationSplitter {
    /// Sentences are force-closed at this many tokens
    pub max_tokens: usize,
}

impl Default for PunctuationSplitter {
    fn default() -> Self {
        Self { max_tokens: 80 }
    }
}

impl PunctuationSplitter {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }
}

impl SentenceSplitter for PunctuationSplitter {
    fn split(&self, tokens: &[Token]) -> Vec<SentenceSpan> {
        let mut sentences = Vec::new();
        let mut start = 0usize;

        let emit = |start: usize, end: usize, sentences: &mut Vec<SentenceSpan>| {
            let text = tokens[start..=end]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            sentences.push(SentenceSpan {
                id: format!("S{}", sentences.len() + 1),
                text,
                token_start: start,
                token_end: end,
            });
        };

        for (i, token) in tokens.iter().enumerate() {
            let accumulated = i - start + 1;
            if ends_sentence(&token.text) || accumulated >= self.max_tokens {
                emit(start, i, &mut sentences);
                start = i + 1;
            }
        }

        if start < tokens.len() {
            emit(start, tokens.len() - 1, &mut sentences);
        }

        sentences
    }
}
