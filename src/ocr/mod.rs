//! OCR Module
//!
//! Text recovery for PDFs whose text layer cannot be read. Supports:
//! - Tesseract (libtesseract, `ocr-tesseract` feature)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_annotator::ocr::OcrService;
//!
//! let service = OcrService::new(&config.ocr, &config.oracle.base_url);
//! let result = service.recognize(&page_png).await?;
//! ```

mod provider;
mod service;
mod types;

pub use provider::{OcrProvider, OllamaVisionProvider};
pub use service::{OcrService, DEFAULT_PAGE_TIMEOUT};
pub use types::{OcrError, OcrProviderKind, OcrResult};

#[cfg(feature = "ocr-tesseract")]
pub use provider::TesseractProvider;
