//! OCR Providers
//!
//! Provider trait and implementations for the OCR backends used when a PDF
//! has no usable text layer.

use async_trait::async_trait;

use super::types::{OcrError, OcrProviderKind, OcrResult};

/// OCR provider trait
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Get the provider type
    fn kind(&self) -> OcrProviderKind;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Recognize the text on a PNG-encoded page image
    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError>;
}

/// Tesseract provider backed by libtesseract
#[cfg(feature = "ocr-tesseract")]
pub struct TesseractProvider {
    default_language: String,
}

#[cfg(feature = "ocr-tesseract")]
impl TesseractProvider {
    pub fn new(default_language: &str) -> Self {
        Self {
            default_language: default_language.to_string(),
        }
    }

    fn read_page(image_data: &[u8], language: &str) -> Result<OcrResult, OcrError> {
        let mut engine = tesseract::Tesseract::new(None, Some(language))
            .map_err(|e| OcrError::ProviderNotAvailable(format!("tesseract ({}): {}", language, e)))?
            .set_image_from_mem(image_data)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to load page image: {}", e)))?
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Recognition failed: {}", e)))?;

        let text = engine
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to read text: {}", e)))?;

        Ok(OcrResult {
            text: text.trim().to_string(),
            confidence: f64::from(engine.mean_text_conf().clamp(0, 100)),
            provider: OcrProviderKind::Tesseract,
        })
    }
}

#[cfg(feature = "ocr-tesseract")]
#[async_trait]
impl OcrProvider for TesseractProvider {
    fn kind(&self) -> OcrProviderKind {
        OcrProviderKind::Tesseract
    }

    async fn is_available(&self) -> bool {
        let language = self.default_language.clone();
        tokio::task::spawn_blocking(move || tesseract::Tesseract::new(None, Some(&language)).is_ok())
            .await
            .unwrap_or(false)
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let language = language.unwrap_or(&self.default_language).to_string();
        let image = image_data.to_vec();

        tokio::task::spawn_blocking(move || Self::read_page(&image, &language))
            .await
            .map_err(|e| OcrError::ProcessingError(format!("OCR task failed: {}", e)))?
    }
}

/// Vision model served by Ollama, prompted to transcribe the page
pub struct OllamaVisionProvider {
    client: reqwest::Client,
    base_url: String,
    /// e.g. "llava", "llama3.2-vision"
    model: String,
}

impl OllamaVisionProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn transcription_prompt(language: Option<&str>) -> String {
        let mut prompt = String::from(
            "Transcribe every word printed on this document page in reading order. \
             Output plain text only, without commentary or formatting.",
        );
        if let Some(language) = language {
            prompt.push_str(&format!(" The page is written in language '{}'.", language));
        }
        prompt
    }
}

#[async_trait]
impl OcrProvider for OllamaVisionProvider {
    fn kind(&self) -> OcrProviderKind {
        OcrProviderKind::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let Ok(response) = self.client.get(&url).send().await else {
            return false;
        };
        let Ok(tags) = response.json::<serde_json::Value>().await else {
            return false;
        };

        tags["models"].as_array().is_some_and(|models| {
            models.iter().any(|m| {
                m["name"]
                    .as_str()
                    .is_some_and(|name| name == self.model || name.split(':').next() == Some(self.model.as_str()))
            })
        })
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        use base64::Engine;

        let request = serde_json::json!({
            "model": self.model,
            "prompt": Self::transcription_prompt(language),
            "images": [base64::engine::general_purpose::STANDARD.encode(image_data)],
            "stream": false,
            "options": { "temperature": 0.0 }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!("Ollama returned {}: {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Invalid Ollama response: {}", e)))?;

        let text = body["response"]
            .as_str()
            .ok_or_else(|| OcrError::ApiError("Ollama response has no text".to_string()))?;

        Ok(OcrResult {
            text: text.trim().to_string(),
            // Vision models report no confidence
            confidence: 0.0,
            provider: OcrProviderKind::Ollama,
        })
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub kind: OcrProviderKind,
    pub text: Option<String>,
    pub available: bool,
}

#[cfg(test)]
#[async_trait]
impl OcrProvider for MockProvider {
    fn kind(&self) -> OcrProviderKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
        match &self.text {
            Some(text) => Ok(OcrResult {
                text: text.clone(),
                confidence: 90.0,
                provider: self.kind,
            }),
            None => Err(OcrError::ProcessingError("mock failure".to_string())),
        }
    }
}
