//! OCR Types
//!
//! Types for OCR of rasterized PDF pages. OCR output carries text only; the
//! extractor never derives word geometry from it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProviderKind {
    /// Tesseract via libtesseract
    #[default]
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl FromStr for OcrProviderKind {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "ollama" => Ok(Self::Ollama),
            other => Err(OcrError::ProviderNotAvailable(format!(
                "unknown OCR provider '{}'",
                other
            ))),
        }
    }
}

/// Text recognized on one page image
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Provider used
    pub provider: OcrProviderKind,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parses_case_insensitively() {
        assert_eq!("Tesseract".parse::<OcrProviderKind>().unwrap(), OcrProviderKind::Tesseract);
        assert_eq!("OLLAMA".parse::<OcrProviderKind>().unwrap(), OcrProviderKind::Ollama);
        assert!("easyocr".parse::<OcrProviderKind>().is_err());
    }
}
