//! PDF Annotator
//!
//! Locates caller-defined concepts ("rules") in a PDF and returns page
//! rectangles to highlight. A language-model oracle picks relevant sentences
//! per chunk and then narrows each hit to the exact evidencing tokens.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod ocr;
pub mod oracle;
pub mod prompts;
pub mod segment;

pub use config::Config;
pub use engine::{AnnotationEngine, AnnotationOutcome, AnnotationStats, AnnotationStatus};
pub use error::{AnnotateError, Result};
pub use extract::{ExtractedDocument, ExtractionMode, PageData, PdfExtractor, Rect, Word};
pub use matcher::{FinalMatch, Rule};
pub use oracle::{FnOracle, OllamaOracle, Oracle, OracleError};
