//! Extraction error types

use thiserror::Error;

/// PDF extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Input does not start with the `%PDF-` signature
    #[error("Invalid document: missing PDF signature")]
    InvalidSignature,

    #[error("MuPDF error: {0}")]
    MuPdf(String),

    #[error("Image encoding error: {0}")]
    Image(String),

    #[error("Extraction task failed: {0}")]
    Task(String),

    #[error("Extraction timed out after {0} seconds")]
    Timeout(u64),
}

impl From<mupdf::Error> for ExtractError {
    fn from(e: mupdf::Error) -> Self {
        ExtractError::MuPdf(e.to_string())
    }
}
