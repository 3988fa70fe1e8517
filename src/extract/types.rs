//! Extraction data types

use serde::{Deserialize, Serialize};

/// Rectangle in bottom-left-origin page space, in points.
///
/// Serialized as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Convert a top-left-origin box `(x0, top, x1, bottom)` into
    /// bottom-left-origin page space.
    pub fn from_top_left(x0: f32, top: f32, x1: f32, bottom: f32, page_height: f32) -> Self {
        Self {
            x0,
            y0: page_height - bottom,
            x1,
            y1: page_height - top,
        }
    }

    /// Non-degenerate and inside a page of the given height
    pub fn is_within_page(&self, page_height: f32) -> bool {
        self.x0 < self.x1 && 0.0 <= self.y0 && self.y0 < self.y1 && self.y1 <= page_height
    }
}

impl From<[f32; 4]> for Rect {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f32; 4] {
    fn from(r: Rect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

/// A word on a page. `rect` is `None` when the word was located but has no
/// usable geometry (OCR output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub rect: Option<Rect>,
}

impl Word {
    pub fn new(text: impl Into<String>, rect: Option<Rect>) -> Self {
        Self {
            text: text.into(),
            rect,
        }
    }
}

/// Words of one page in reading order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    /// Page number (0-indexed)
    pub page_index: usize,
    /// Page height in points
    pub page_height: f32,
    pub words: Vec<Word>,
}

/// How the pages of a document were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// PDF text layer with word geometry
    Native,
    /// Rasterized pages read by OCR, no geometry
    Ocr,
}

/// Result of extracting one PDF
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub mode: ExtractionMode,
    pub pages: Vec<PageData>,
}

impl ExtractedDocument {
    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }
}
