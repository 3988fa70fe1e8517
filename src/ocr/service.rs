//! OCR Service
//!
//! Tries the configured providers in order until one reads the page.

use std::sync::Arc;
use std::time::Duration;

use crate::config::OcrConfig;

use super::{
    provider::{OcrProvider, OllamaVisionProvider},
    types::{OcrError, OcrProviderKind, OcrResult},
};

/// Default bound on one provider call for one page
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// OCR service for rasterized PDF pages
pub struct OcrService {
    default_language: String,
    providers: Vec<Arc<dyn OcrProvider>>,
    page_timeout: Duration,
}

impl OcrService {
    /// Create a service from config, building providers in configured order
    pub fn new(config: &OcrConfig, ollama_url: &str) -> Self {
        let mut providers: Vec<Arc<dyn OcrProvider>> = Vec::new();

        for kind in &config.providers {
            match kind {
                #[cfg(feature = "ocr-tesseract")]
                OcrProviderKind::Tesseract => {
                    use super::provider::TesseractProvider;
                    providers.push(Arc::new(TesseractProvider::new(&config.default_language)));
                }
                #[cfg(not(feature = "ocr-tesseract"))]
                OcrProviderKind::Tesseract => {
                    tracing::debug!("Tesseract OCR requested but the ocr-tesseract feature is disabled");
                }
                OcrProviderKind::Ollama => {
                    providers.push(Arc::new(OllamaVisionProvider::new(
                        ollama_url,
                        &config.ollama_model,
                    )));
                }
            }
        }

        Self {
            default_language: config.default_language.clone(),
            providers,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
        }
    }

    /// Create a service over explicit providers
    pub fn with_providers(providers: Vec<Arc<dyn OcrProvider>>, default_language: &str) -> Self {
        Self {
            default_language: default_language.to_string(),
            providers,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    /// Providers that currently report themselves available, in order
    pub async fn usable_providers(&self) -> Vec<Arc<dyn OcrProvider>> {
        let mut usable = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                usable.push(Arc::clone(provider));
            }
        }
        usable
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProviderKind> {
        self.usable_providers()
            .await
            .iter()
            .map(|p| p.kind())
            .collect()
    }

    /// Recognize one page image with the first available provider that
    /// succeeds
    pub async fn recognize(&self, image_data: &[u8]) -> Result<OcrResult, OcrError> {
        let usable = self.usable_providers().await;
        self.recognize_with(&usable, image_data).await
    }

    /// Recognize one page with providers already checked for availability.
    ///
    /// Each provider call is bounded by the page timeout.
    pub async fn recognize_with(
        &self,
        providers: &[Arc<dyn OcrProvider>],
        image_data: &[u8],
    ) -> Result<OcrResult, OcrError> {
        for provider in providers {
            let call = provider.recognize(image_data, Some(&self.default_language));
            match tokio::time::timeout(self.page_timeout, call).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(
                        "OCR provider {:?} failed: {}, trying next",
                        provider.kind(),
                        e
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "OCR provider {:?} timed out after {:?}, trying next",
                        provider.kind(),
                        self.page_timeout
                    );
                }
            }
        }

        Err(OcrError::ProviderNotAvailable(
            "No OCR providers available".to_string(),
        ))
    }
}
