//! Token spans to page rectangles

use std::collections::{BTreeMap, HashSet};

use crate::extract::Rect;
use crate::segment::Chunk;

use super::{ExactSpanMatch, FinalMatch};

/// Identity of a span across chunks: rule id and inclusive global bounds
pub type SpanKey = (String, usize, usize);

/// Collects spans in chunk order, dropping spans already seen
#[derive(Debug, Default)]
pub struct SpanMapper {
    seen: HashSet<SpanKey>,
    matches: Vec<FinalMatch>,
}

impl SpanMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one span of `chunk`. Returns false if it was a duplicate.
    pub fn add(&mut self, chunk: &Chunk, span: &ExactSpanMatch) -> bool {
        let global_start = chunk.start_index + span.start;
        let global_end = chunk.start_index + span.end;

        let Some(tokens) = chunk.tokens().get(span.start..=span.end) else {
            tracing::warn!(rule = %span.rule_id, start = span.start, end = span.end, "Span outside chunk");
            return false;
        };

        if !self.seen.insert((span.rule_id.clone(), global_start, global_end)) {
            tracing::trace!(rule = %span.rule_id, global_start, global_end, "Dropping duplicate span");
            return false;
        }

        let mut by_page: BTreeMap<usize, Vec<Rect>> = BTreeMap::new();
        for token in tokens {
            if let Some(rect) = token.rect {
                by_page.entry(token.page).or_default().push(rect);
            }
        }

        self.matches.extend(by_page.into_iter().map(|(page_index, rectangles)| FinalMatch {
            rule_id: span.rule_id.clone(),
            page_index,
            rectangles,
        }));
        true
    }

    /// Distinct spans accepted so far
    pub fn span_count(&self) -> usize {
        self.seen.len()
    }

    pub fn finish(self) -> Vec<FinalMatch> {
        self.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Chunker, PunctuationSplitter, Token};

    fn token(text: &str, page: usize, x: f32) -> Token {
        Token {
            text: text.to_string(),
            rect: Some(Rect::new(x, 10.0, x + 5.0, 20.0)),
            page,
        }
    }

    fn span(start: usize, end: usize) -> ExactSpanMatch {
        ExactSpanMatch {
            rule_id: "R1".to_string(),
            start,
            end,
            refined: true,
        }
    }

    #[test]
    fn test_span_across_pages_yields_one_record_per_page() {
        let tokens = vec![token("a", 0, 0.0), token("b", 0, 10.0), token("c", 1, 0.0), token("d.", 1, 10.0)];
        let chunk = Chunker::default()
            .chunk(tokens.into(), &PunctuationSplitter::default())
            .remove(0);

        let mut mapper = SpanMapper::new();
        assert!(mapper.add(&chunk, &span(1, 2)));
        let matches = mapper.finish();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].page_index, 0);
        assert_eq!(matches[0].rectangles, vec![Rect::new(10.0, 10.0, 15.0, 20.0)]);
        assert_eq!(matches[1].page_index, 1);
        assert_eq!(matches[1].rectangles, vec![Rect::new(0.0, 10.0, 5.0, 20.0)]);
    }

    #[test]
    fn test_overlap_duplicate_is_dropped() {
        let tokens: Vec<Token> = (0..10).map(|i| token(&format!("w{}", i), 0, i as f32 * 10.0)).collect();
        let chunks = Chunker::new(6, 3).chunk(tokens.into(), &PunctuationSplitter::default());
        assert_eq!(chunks[1].start_index, 3);

        let mut mapper = SpanMapper::new();
        // Global 4..=5 seen from both chunks
        assert!(mapper.add(&chunks[0], &span(4, 5)));
        assert!(!mapper.add(&chunks[1], &span(1, 2)));
        assert_eq!(mapper.span_count(), 1);
        assert_eq!(mapper.finish().len(), 1);
    }

    #[test]
    fn test_tokens_without_geometry_emit_nothing() {
        let tokens = vec![
            Token {
                text: "scanned".to_string(),
                rect: None,
                page: 0,
            },
            Token {
                text: "page.".to_string(),
                rect: None,
                page: 0,
            },
        ];
        let chunk = Chunker::default()
            .chunk(tokens.into(), &PunctuationSplitter::default())
            .remove(0);

        let mut mapper = SpanMapper::new();
        assert!(mapper.add(&chunk, &span(0, 1)));
        assert!(mapper.finish().is_empty());
    }
}
