//! Text-layer extraction and page rasterization using MuPDF
//!
//! Words are built from MuPDF structured text: characters inside one text
//! line are grouped by whitespace, and a word's box is the union of its
//! character quads. MuPDF reports quads in top-left-origin space relative to
//! the page bounds, so boxes are shifted to the bounds origin, clamped to the
//! page and then flipped into bottom-left-origin space.

use std::io::Cursor;

use mupdf::{Colorspace, Document, Matrix, TextPageOptions};

use super::error::ExtractError;
use super::types::{PageData, Rect, Word};

/// First five bytes of every PDF file
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

/// Check the `%PDF-` magic signature
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

/// A rasterized page ready for OCR
pub struct RasterPage {
    pub page_index: usize,
    pub page_height: f32,
    pub png: Vec<u8>,
}

/// Clamp a top-left-origin box to the page and convert it.
///
/// Returns `None` when the clamped box is degenerate.
pub fn page_rect(left: f32, top: f32, right: f32, bottom: f32, width: f32, height: f32) -> Option<Rect> {
    let clamp = |v: f32, max: f32| v.max(0.0).min(max.max(0.0));

    let rect = Rect::from_top_left(
        clamp(left, width),
        clamp(top, height),
        clamp(right, width),
        clamp(bottom, height),
        height,
    );

    rect.is_within_page(height).then_some(rect)
}

/// Accumulates characters of one word and the union of their boxes
#[derive(Debug, Default)]
struct WordAccumulator {
    text: String,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl WordAccumulator {
    fn push(&mut self, c: char, left: f32, top: f32, right: f32, bottom: f32) {
        if self.text.is_empty() {
            self.left = left;
            self.top = top;
            self.right = right;
            self.bottom = bottom;
        } else {
            self.left = self.left.min(left);
            self.top = self.top.min(top);
            self.right = self.right.max(right);
            self.bottom = self.bottom.max(bottom);
        }
        self.text.push(c);
    }

    fn take(&mut self, width: f32, height: f32) -> Option<Word> {
        if self.text.is_empty() {
            return None;
        }
        let rect = page_rect(self.left, self.top, self.right, self.bottom, width, height);
        if rect.is_none() {
            tracing::trace!(word = %self.text, "Degenerate word box, keeping text without geometry");
        }
        Some(Word::new(std::mem::take(&mut self.text), rect))
    }
}

/// Extract words with geometry from every page of the PDF text layer
pub fn extract_text_layer(bytes: &[u8]) -> Result<Vec<PageData>, ExtractError> {
    let doc = Document::from_bytes(bytes, "application/pdf")?;
    let page_count = doc.page_count()? as usize;

    let mut pages = Vec::with_capacity(page_count);

    for page_index in 0..page_count {
        let page = doc.load_page(page_index as i32)?;
        let bounds = page.bounds()?;
        let width = bounds.x1 - bounds.x0;
        let height = bounds.y1 - bounds.y0;

        let text_page = page.to_text_page(TextPageOptions::empty())?;
        let mut words = Vec::new();

        for block in text_page.blocks() {
            for line in block.lines() {
                let mut current = WordAccumulator::default();

                for ch in line.chars() {
                    let Some(c) = ch.char() else { continue };

                    if c.is_whitespace() {
                        words.extend(current.take(width, height));
                        continue;
                    }

                    // MuPDF quads: ul (upper-left), ur (upper-right), ll (lower-left), lr (lower-right)
                    let quad = ch.quad();
                    let left = quad.ul.x.min(quad.ll.x) - bounds.x0;
                    let right = quad.ur.x.max(quad.lr.x) - bounds.x0;
                    let top = quad.ul.y.min(quad.ur.y) - bounds.y0;
                    let bottom = quad.ll.y.max(quad.lr.y) - bounds.y0;

                    current.push(c, left, top, right, bottom);
                }

                words.extend(current.take(width, height));
            }
        }

        tracing::trace!(page = page_index, words = words.len(), "Extracted page text layer");

        pages.push(PageData {
            page_index,
            page_height: height,
            words,
        });
    }

    Ok(pages)
}

/// Render every page to PNG for OCR
pub fn rasterize_pages(bytes: &[u8], scale: f32) -> Result<Vec<RasterPage>, ExtractError> {
    let doc = Document::from_bytes(bytes, "application/pdf")?;
    let page_count = doc.page_count()? as usize;

    // Clamp scale to keep pixmaps bounded (0.5 to 4.0)
    let scale = scale.clamp(0.5, 4.0);
    let matrix = Matrix::new_scale(scale, scale);
    let colorspace = Colorspace::device_rgb();

    let mut pages = Vec::with_capacity(page_count);
    for page_index in 0..page_count {
        let page = doc.load_page(page_index as i32)?;
        let bounds = page.bounds()?;

        // to_pixmap signature: (ctm, colorspace, alpha, show_extras) -> Pixmap
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, false)?;

        pages.push(RasterPage {
            page_index,
            page_height: bounds.y1 - bounds.y0,
            png: encode_png(&pixmap)?,
        });
    }

    Ok(pages)
}

/// Encode pixmap samples as PNG
fn encode_png(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, ExtractError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize; // components per pixel

    let mut rgb_buffer = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(r);
            let b = samples.get(offset + 2).copied().unwrap_or(r);
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| ExtractError::Image("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| ExtractError::Image(e.to_string()))?;

    Ok(output)
}
