//! Geometry-aware text extraction
//!
//! Turns PDF bytes into per-page word lists with bottom-left-origin
//! rectangles. When the text layer cannot be read (MuPDF error, or no text
//! at all as in scanned documents) pages are rasterized and handed to OCR;
//! OCR words carry no rectangle.
//!
//! ```text
//!   bytes ──► signature gate ──► cache ──► MuPDF stext ──► PageData (rects)
//!                  │                             │
//!                  ▼                             ▼ error / no text
//!           InvalidSignature            rasterize ──► OCR ──► PageData (no rects)
//! ```

mod cache;
mod error;
mod native;
mod types;

use std::sync::Arc;

use tokio::time::{timeout, Duration};

use crate::ocr::OcrService;

pub use cache::{document_key, CacheStats, DocumentCache};
pub use error::ExtractError;
pub use native::{extract_text_layer, has_pdf_signature, page_rect, rasterize_pages, RasterPage, PDF_SIGNATURE};
pub use types::{ExtractedDocument, ExtractionMode, PageData, Rect, Word};

/// Whitespace-tokenize OCR text into geometry-less words
pub fn ocr_words(text: &str) -> Vec<Word> {
    text.split_whitespace().map(|w| Word::new(w, None)).collect()
}

/// PDF extractor with OCR fallback and an optional extraction cache
pub struct PdfExtractor {
    ocr: Option<Arc<OcrService>>,
    render_scale: f32,
    timeout_secs: u64,
    cache: DocumentCache,
}

impl PdfExtractor {
    pub fn new(ocr: Option<Arc<OcrService>>, render_scale: f32, timeout_secs: u64, cache: DocumentCache) -> Self {
        Self {
            ocr,
            render_scale,
            timeout_secs,
            cache,
        }
    }

    /// Extractor without OCR or caching
    pub fn text_layer_only(timeout_secs: u64) -> Self {
        Self::new(None, 2.0, timeout_secs, DocumentCache::disabled())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Extract all pages of a PDF.
    ///
    /// Fails only with `InvalidSignature` for non-PDF input; OCR is never
    /// attempted in that case. Any text-layer failure, timeouts included,
    /// falls back to OCR.
    pub async fn extract(&self, bytes: &[u8]) -> Result<Arc<ExtractedDocument>, ExtractError> {
        if !has_pdf_signature(bytes) {
            tracing::error!("Input is not a valid PDF (missing %PDF- signature)");
            return Err(ExtractError::InvalidSignature);
        }

        let key = document_key(bytes);
        if let Some(document) = self.cache.get(&key) {
            return Ok(document);
        }

        let data = Arc::new(bytes.to_vec());

        let native = {
            let data = Arc::clone(&data);
            self.run_blocking(move || extract_text_layer(&data)).await
        };

        let document = match native {
            Ok(pages) if pages.iter().any(|p| !p.words.is_empty()) => ExtractedDocument {
                mode: ExtractionMode::Native,
                pages,
            },
            Ok(_) => {
                tracing::info!("PDF has no text layer, falling back to OCR");
                self.extract_ocr(data).await
            }
            Err(e) => {
                tracing::warn!("Text layer extraction failed: {}, falling back to OCR", e);
                self.extract_ocr(data).await
            }
        };

        tracing::info!(
            mode = ?document.mode,
            pages = document.pages.len(),
            words = document.word_count(),
            "Extracted document"
        );

        let document = Arc::new(document);
        if document.word_count() > 0 {
            self.cache.insert(key, Arc::clone(&document));
        }
        Ok(document)
    }

    /// Rasterize and OCR every page. Failures degrade to pages without
    /// words, never to an error.
    async fn extract_ocr(&self, data: Arc<Vec<u8>>) -> ExtractedDocument {
        let scale = self.render_scale;
        let rasterized = self.run_blocking(move || rasterize_pages(&data, scale)).await;

        let raster_pages = match rasterized {
            Ok(pages) => pages,
            Err(e) => {
                tracing::error!("OCR extraction failed: {}", e);
                return ExtractedDocument {
                    mode: ExtractionMode::Ocr,
                    pages: Vec::new(),
                };
            }
        };

        let providers = match &self.ocr {
            Some(service) => service.usable_providers().await,
            None => Vec::new(),
        };

        let mut pages = Vec::with_capacity(raster_pages.len());
        for raster in raster_pages {
            let words = match &self.ocr {
                Some(service) if !providers.is_empty() => match service.recognize_with(&providers, &raster.png).await {
                    Ok(result) => ocr_words(&result.text),
                    Err(e) => {
                        tracing::warn!(page = raster.page_index, "OCR failed for page: {}", e);
                        Vec::new()
                    }
                },
                _ => Vec::new(),
            };

            pages.push(PageData {
                page_index: raster.page_index,
                page_height: raster.page_height,
                words,
            });
        }

        if providers.is_empty() {
            tracing::warn!("No OCR provider available; scanned pages yield no text");
        }

        ExtractedDocument {
            mode: ExtractionMode::Ocr,
            pages,
        }
    }

    /// Run CPU-bound MuPDF work on the blocking pool with a deadline
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, ExtractError>
    where
        F: FnOnce() -> Result<T, ExtractError> + Send + 'static,
        T: Send + 'static,
    {
        match timeout(
            Duration::from_secs(self.timeout_secs),
            tokio::task::spawn_blocking(f),
        )
        .await
        {
            Ok(join_result) => join_result.map_err(|e| ExtractError::Task(e.to_string()))?,
            Err(_) => Err(ExtractError::Timeout(self.timeout_secs)),
        }
    }
}
