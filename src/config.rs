//! Configuration management for the annotation engine

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ocr::OcrProviderKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub oracle: OracleConfig,
    pub ocr: OcrConfig,
    pub prompts: PromptConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tokens per chunk window
    pub chunk_size: usize,
    /// Tokens shared between adjacent windows
    pub overlap: usize,
    /// Sentence length cap in tokens
    pub max_sentence_tokens: usize,
    /// Upper bound on in-flight oracle calls per request
    pub max_concurrent_calls: usize,
    /// Per-call oracle timeout
    pub oracle_timeout_secs: u64,
    /// Deadline for the whole matching phase (None = unbounded)
    pub request_timeout_secs: Option<u64>,
    /// Deadline for text extraction of one document
    pub extraction_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Providers tried in order
    pub providers: Vec<OcrProviderKind>,
    /// Vision model used by the Ollama OCR provider
    pub ollama_model: String,
    pub default_language: String,
    /// Rasterization scale (1.0 = 72 DPI)
    pub render_scale: f32,
    /// Bound on one provider call for one page
    pub page_timeout_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    /// Directory holding `<key>.txt` overrides
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Documents kept in the extraction cache (0 disables it)
    pub capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1600,
            overlap: 150,
            max_sentence_tokens: 80,
            max_concurrent_calls: 4,
            oracle_timeout_secs: 120,
            request_timeout_secs: None,
            extraction_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Reject settings the segmenter cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.max_sentence_tokens == 0 {
            return Err("max_sentence_tokens must be greater than zero".to_string());
        }
        if self.max_concurrent_calls == 0 {
            return Err("max_concurrent_calls must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            temperature: 0.0,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            providers: vec![OcrProviderKind::Tesseract, OcrProviderKind::Ollama],
            ollama_model: "llava".to_string(),
            default_language: "eng".to_string(),
            render_scale: 2.0,
            page_timeout_secs: 120,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            oracle: OracleConfig::default(),
            ocr: OcrConfig::default(),
            prompts: PromptConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Parse an env var, keeping `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let engine_defaults = EngineConfig::default();
        let oracle_defaults = OracleConfig::default();
        let ocr_defaults = OcrConfig::default();

        let providers = env::var("ANNOTATE_OCR_PROVIDERS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|p| p.trim().parse::<OcrProviderKind>().ok())
                    .collect::<Vec<_>>()
            })
            .filter(|p| !p.is_empty())
            .unwrap_or(ocr_defaults.providers);

        Config {
            engine: EngineConfig {
                chunk_size: env_or("ANNOTATE_CHUNK_SIZE", engine_defaults.chunk_size),
                overlap: env_or("ANNOTATE_OVERLAP", engine_defaults.overlap),
                max_sentence_tokens: env_or(
                    "ANNOTATE_MAX_SENTENCE_TOKENS",
                    engine_defaults.max_sentence_tokens,
                ),
                max_concurrent_calls: env_or(
                    "ANNOTATE_MAX_CONCURRENT_CALLS",
                    engine_defaults.max_concurrent_calls,
                ),
                oracle_timeout_secs: env_or(
                    "ANNOTATE_ORACLE_TIMEOUT_SECS",
                    engine_defaults.oracle_timeout_secs,
                ),
                request_timeout_secs: env::var("ANNOTATE_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.trim().parse().ok()),
                extraction_timeout_secs: env_or(
                    "ANNOTATE_EXTRACTION_TIMEOUT_SECS",
                    engine_defaults.extraction_timeout_secs,
                ),
            },
            oracle: OracleConfig {
                base_url: env::var("OLLAMA_API_URL").unwrap_or(oracle_defaults.base_url),
                model: env::var("OLLAMA_MODEL").unwrap_or(oracle_defaults.model),
                temperature: env_or("OLLAMA_TEMPERATURE", oracle_defaults.temperature),
            },
            ocr: OcrConfig {
                providers,
                ollama_model: env::var("OLLAMA_VISION_MODEL").unwrap_or(ocr_defaults.ollama_model),
                default_language: env::var("ANNOTATE_OCR_LANGUAGE")
                    .unwrap_or(ocr_defaults.default_language),
                render_scale: env_or("ANNOTATE_OCR_RENDER_SCALE", ocr_defaults.render_scale),
                page_timeout_secs: env_or("ANNOTATE_OCR_PAGE_TIMEOUT_SECS", ocr_defaults.page_timeout_secs),
            },
            prompts: PromptConfig {
                dir: env::var("PROMPTS_DIR").ok().map(PathBuf::from),
            },
            cache: CacheConfig {
                capacity: env_or("ANNOTATE_CACHE_CAPACITY", CacheConfig::default().capacity),
            },
        }
    }
}
