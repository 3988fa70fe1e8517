//! Overlapping chunk windows over the document token stream
//!
//! Example with chunk_size=5, overlap=2 (step 3) over 10 tokens:
//!
//! ```text
//!   tokens:  0 1 2 3 4 5 6 7 8 9
//!   chunk 1: 0 1 2 3 4
//!   chunk 2:       3 4 5 6 7
//!   chunk 3:             6 7 8 9
//! ```
//!
//! A window that would fall entirely inside the previous one (tail no
//! longer than the overlap) is not emitted.

use std::ops::Range;
use std::sync::Arc;

use super::sentence::{SentenceSpan, SentenceSplitter};
use super::Token;

/// A window of the document processed independently.
///
/// Shares the document's token buffer; `tokens()` is the window slice.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in chunk order
    pub index: usize,
    /// Global token offset of the first token
    pub start_index: usize,
    pub text: String,
    pub sentences: Vec<SentenceSpan>,
    document: Arc<[Token]>,
    end_index: usize,
}

impl Chunk {
    pub fn tokens(&self) -> &[Token] {
        &self.document[self.start_index..self.end_index]
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index == self.start_index
    }

    /// Global token range covered by this chunk
    pub fn global_range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }

    /// Position of a sentence id in this chunk's sentence list
    pub fn sentence_position(&self, id: &str) -> Option<usize> {
        self.sentences.iter().position(|s| s.id == id)
    }
}

/// Sliding-window chunker
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 1600,
            overlap: 150,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }

    /// Global token ranges of every window for a document of `n` tokens
    pub fn windows(&self, n: usize) -> Vec<Range<usize>> {
        if n == 0 {
            return Vec::new();
        }
        if n <= self.chunk_size {
            return vec![0..n];
        }

        let mut windows: Vec<Range<usize>> = Vec::new();
        for start in (0..n).step_by(self.step()) {
            let end = (start + self.chunk_size).min(n);
            if let Some(prev) = windows.last() {
                if end <= prev.end {
                    break;
                }
            }
            windows.push(start..end);
        }
        windows
    }

    /// Split the document into chunks and segment each into sentences
    pub fn chunk(&self, document: Arc<[Token]>, splitter: &dyn SentenceSplitter) -> Vec<Chunk> {
        self.windows(document.len())
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let tokens = &document[range.clone()];
                let text = tokens
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let sentences = splitter.split(tokens);
                Chunk {
                    index,
                    start_index: range.start,
                    text,
                    sentences,
                    document: Arc::clone(&document),
                    end_index: range.end,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::PunctuationSplitter;

    fn document(n: usize) -> Arc<[Token]> {
        (0..n)
            .map(|i| Token {
                text: if i % 10 == 9 { format!("w{}.", i) } else { format!("w{}", i) },
                rect: None,
                page: 0,
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn expected_count(n: usize, size: usize, overlap: usize) -> usize {
        if n <= size {
            1
        } else {
            (n - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn test_two_thousand_tokens_make_two_chunks() {
        let chunks = Chunker::new(1600, 150).chunk(document(2000), &PunctuationSplitter::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].len(), 1600);
        assert_eq!(chunks[1].start_index, 1450);
        assert_eq!(chunks[1].len(), 550);
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let chunks = Chunker::default().chunk(document(12), &PunctuationSplitter::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].global_range(), 0..12);
        assert_eq!(chunks[0].text.split(' ').count(), 12);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        assert!(Chunker::default().windows(0).is_empty());
    }

    #[test]
    fn test_chunk_count_formula() {
        for &(n, size, overlap) in &[
            (2000, 1600, 150),
            (3050, 1600, 150),
            (3051, 1600, 150),
            (1601, 1600, 150),
            (10, 5, 2),
            (11, 5, 2),
            (100, 7, 0),
        ] {
            let windows = Chunker::new(size, overlap).windows(n);
            assert_eq!(windows.len(), expected_count(n, size, overlap), "n={} size={} overlap={}", n, size, overlap);
        }
    }

    #[test]
    fn test_tail_of_exactly_overlap_tokens_is_dropped() {
        // step 6: the window at 12 would hold 4 tokens, all inside 6..16
        assert_eq!(Chunker::new(10, 4).windows(16), vec![0..10, 6..16]);
        // one more token makes the tail carry something new
        assert_eq!(Chunker::new(10, 4).windows(17), vec![0..10, 6..16, 12..17]);
    }

    #[test]
    fn test_windows_cover_every_token_once_without_overlap() {
        let chunker = Chunker::new(50, 8);
        let n = 437;
        let windows = chunker.windows(n);

        // Stripping the overlap, each window owns [start, next.start)
        let mut covered = vec![0usize; n];
        for (i, w) in windows.iter().enumerate() {
            let own_end = windows.get(i + 1).map(|next| next.start).unwrap_or(w.end);
            for slot in &mut covered[w.start..own_end] {
                *slot += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
        assert_eq!(windows.last().unwrap().end, n);
    }

    #[test]
    fn test_sentences_stay_within_chunk() {
        let chunks = Chunker::new(25, 5).chunk(document(90), &PunctuationSplitter::new(4));
        for chunk in &chunks {
            for s in &chunk.sentences {
                assert!(s.token_start <= s.token_end);
                assert!(s.token_end < chunk.len());
            }
            assert_eq!(chunk.sentence_position("S1"), Some(0));
        }
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_still_terminates() {
        let windows = Chunker::new(4, 10).windows(9);
        assert_eq!(windows.first(), Some(&(0..4)));
        assert_eq!(windows.last().unwrap().end, 9);
    }
}
