//! Chunk and sentence segmentation
//!
//! Flattens extracted pages into one document-order token stream, slices it
//! into overlapping windows and splits each window into sentence spans.

mod chunker;
mod sentence;

use serde::Serialize;

use crate::extract::{PageData, Rect};

pub use chunker::{Chunk, Chunker};
pub use sentence::{ends_sentence, PunctuationSplitter, SentenceSpan, SentenceSplitter};

/// One word of the document in reading order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub text: String,
    pub rect: Option<Rect>,
    /// Page number (0-indexed)
    pub page: usize,
}

/// Flatten pages into the document token stream
pub fn flatten_pages(pages: &[PageData]) -> Vec<Token> {
    pages
        .iter()
        .flat_map(|page| {
            page.words.iter().map(move |word| Token {
                text: word.text.clone(),
                rect: word.rect,
                page: page.page_index,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Word;

    #[test]
    fn test_flatten_keeps_page_order_and_geometry() {
        let pages = vec![
            PageData {
                page_index: 0,
                page_height: 792.0,
                words: vec![Word::new("end", Some(Rect::new(1.0, 2.0, 3.0, 4.0)))],
            },
            PageData {
                page_index: 1,
                page_height: 792.0,
                words: vec![Word::new("of", None), Word::new("page", None)],
            },
        ];

        let tokens = flatten_pages(&pages);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].page, 0);
        assert_eq!(tokens[0].rect, Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(tokens[2].text, "page");
        assert_eq!(tokens[2].page, 1);
    }
}
