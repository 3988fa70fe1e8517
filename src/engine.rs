//! Annotation engine
//!
//! Drives one request end to end: extraction, segmentation, per-chunk coarse
//! selection and boundary refinement, then a single ordered pass that maps
//! spans to rectangles and drops duplicates from chunk overlap.
//!
//! Chunk and refinement futures are joined inside the request future, so
//! dropping it (client gone, deadline hit) cancels every outstanding oracle
//! call.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::config::{Config, EngineConfig};
use crate::error::{AnnotateError, Result};
use crate::extract::{DocumentCache, ExtractError, ExtractedDocument, ExtractionMode, PdfExtractor};
use crate::matcher::{
    sentence_runs, validate_rules, BoundaryRefiner, CoarseSelector, ExactSpanMatch, FinalMatch, Rule, SentenceRun,
    SpanMapper,
};
use crate::ocr::OcrService;
use crate::oracle::{OllamaOracle, Oracle, TimeoutOracle};
use crate::prompts::PromptStore;
use crate::segment::{flatten_pages, Chunk, Chunker, PunctuationSplitter, SentenceSplitter};

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    /// Matching ran; `matches` may still be empty
    Ok,
    /// Input is not a PDF
    InvalidDocument,
    /// Extraction produced no tokens
    NoText,
}

/// Counters for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationStats {
    pub tokens: usize,
    pub chunks: usize,
    /// Chunks whose coarse selection failed
    pub failed_chunks: usize,
    /// Distinct spans after dedup
    pub spans: usize,
    /// Spans narrowed by the oracle rather than kept from the coarse pass
    pub refined_spans: usize,
    pub duplicate_spans: usize,
}

/// Result of one annotation request
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationOutcome {
    pub status: AnnotationStatus,
    pub extraction_mode: Option<ExtractionMode>,
    pub matches: Vec<FinalMatch>,
    pub stats: AnnotationStats,
}

impl AnnotationOutcome {
    fn empty(status: AnnotationStatus, extraction_mode: Option<ExtractionMode>) -> Self {
        Self {
            status,
            extraction_mode,
            matches: Vec::new(),
            stats: AnnotationStats::default(),
        }
    }
}

/// Spans found in one chunk, or `None` if its coarse pass failed
type ChunkSpans = Option<Vec<ExactSpanMatch>>;

/// PDF annotation engine
pub struct AnnotationEngine {
    config: EngineConfig,
    extractor: PdfExtractor,
    chunker: Chunker,
    splitter: Arc<dyn SentenceSplitter>,
    oracle: Arc<dyn Oracle>,
    coarse: CoarseSelector,
    refiner: BoundaryRefiner,
}

impl AnnotationEngine {
    pub fn new(
        config: EngineConfig,
        extractor: PdfExtractor,
        oracle: Arc<dyn Oracle>,
        prompts: PromptStore,
    ) -> Result<Self> {
        config.validate().map_err(AnnotateError::InvalidConfig)?;

        let oracle: Arc<dyn Oracle> = Arc::new(TimeoutOracle::new(
            oracle,
            Duration::from_secs(config.oracle_timeout_secs),
        ));
        let prompts = Arc::new(prompts);

        Ok(Self {
            chunker: Chunker::new(config.chunk_size, config.overlap),
            splitter: Arc::new(PunctuationSplitter::new(config.max_sentence_tokens)),
            coarse: CoarseSelector::new(Arc::clone(&oracle), Arc::clone(&prompts)),
            refiner: BoundaryRefiner::new(Arc::clone(&oracle), prompts),
            oracle,
            extractor,
            config,
        })
    }

    /// Engine wired to Ollama, the configured OCR providers and prompt
    /// overrides
    pub fn from_config(config: &Config) -> Result<Self> {
        let ocr = OcrService::new(&config.ocr, &config.oracle.base_url);
        let extractor = PdfExtractor::new(
            Some(Arc::new(ocr)),
            config.ocr.render_scale,
            config.engine.extraction_timeout_secs,
            DocumentCache::new(config.cache.capacity),
        );
        let prompts = PromptStore::load(config.prompts.dir.as_deref())?;
        let oracle = Arc::new(OllamaOracle::new(&config.oracle));

        Self::new(config.engine.clone(), extractor, oracle, prompts)
    }

    /// Replace the sentence segmentation strategy
    pub fn with_splitter(mut self, splitter: Arc<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &PdfExtractor {
        &self.extractor
    }

    pub async fn is_oracle_available(&self) -> bool {
        self.oracle.is_available().await
    }

    /// Annotate a PDF given as bytes.
    ///
    /// The request deadline covers extraction, OCR included, and matching.
    pub async fn annotate(&self, pdf: &[u8], rules: &[Rule]) -> Result<AnnotationOutcome> {
        validate_rules(rules).map_err(AnnotateError::InvalidRules)?;
        self.with_deadline(self.extract_and_match(pdf, rules)).await?
    }

    /// Annotate an already extracted document
    pub async fn annotate_document(&self, document: &ExtractedDocument, rules: &[Rule]) -> Result<AnnotationOutcome> {
        validate_rules(rules).map_err(AnnotateError::InvalidRules)?;
        self.with_deadline(self.match_document(document, rules)).await?
    }

    async fn with_deadline<T>(&self, work: impl Future<Output = T>) -> Result<T> {
        match self.config.request_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
                .await
                .map_err(|_| AnnotateError::Timeout(secs)),
            None => Ok(work.await),
        }
    }

    async fn extract_and_match(&self, pdf: &[u8], rules: &[Rule]) -> Result<AnnotationOutcome> {
        let document = match self.extractor.extract(pdf).await {
            Ok(document) => document,
            Err(ExtractError::InvalidSignature) => {
                return Ok(AnnotationOutcome::empty(AnnotationStatus::InvalidDocument, None));
            }
            Err(e) => {
                tracing::error!("Extraction failed: {}", e);
                return Ok(AnnotationOutcome::empty(AnnotationStatus::NoText, None));
            }
        };

        self.match_document(&document, rules).await
    }

    async fn match_document(&self, document: &ExtractedDocument, rules: &[Rule]) -> Result<AnnotationOutcome> {
        let tokens = flatten_pages(&document.pages);
        if tokens.is_empty() {
            tracing::warn!(mode = ?document.mode, "No text extracted, nothing to annotate");
            return Ok(AnnotationOutcome::empty(AnnotationStatus::NoText, Some(document.mode)));
        }
        let token_count = tokens.len();

        let request_id = uuid::Uuid::new_v4();
        let chunks = self.chunker.chunk(tokens.into(), self.splitter.as_ref());
        tracing::info!(
            request = %request_id,
            tokens = token_count,
            chunks = chunks.len(),
            rules = rules.len(),
            mode = ?document.mode,
            "Annotating document"
        );

        let started = Instant::now();
        let per_chunk = self.match_chunks(&chunks, rules).await;

        let mut stats = AnnotationStats {
            tokens: token_count,
            chunks: chunks.len(),
            ..AnnotationStats::default()
        };
        let mut mapper = SpanMapper::new();

        for (chunk, spans) in chunks.iter().zip(per_chunk) {
            let Some(spans) = spans else {
                stats.failed_chunks += 1;
                continue;
            };
            for span in &spans {
                if mapper.add(chunk, span) {
                    stats.refined_spans += usize::from(span.refined);
                } else {
                    stats.duplicate_spans += 1;
                }
            }
        }
        stats.spans = mapper.span_count();

        let matches = mapper.finish();
        tracing::info!(
            request = %request_id,
            matches = matches.len(),
            spans = stats.spans,
            failed_chunks = stats.failed_chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Annotation complete"
        );

        Ok(AnnotationOutcome {
            status: AnnotationStatus::Ok,
            extraction_mode: Some(document.mode),
            matches,
            stats,
        })
    }

    /// Run every chunk concurrently, results in chunk order
    async fn match_chunks(&self, chunks: &[Chunk], rules: &[Rule]) -> Vec<ChunkSpans> {
        let limit = Semaphore::new(self.config.max_concurrent_calls);
        join_all(chunks.iter().map(|chunk| self.match_chunk(chunk, rules, &limit))).await
    }

    async fn match_chunk(&self, chunk: &Chunk, rules: &[Rule], limit: &Semaphore) -> ChunkSpans {
        let hits = {
            let _permit = limit.acquire().await.ok();
            self.coarse.select(chunk, rules).await?
        };

        let runs: Vec<(&Rule, SentenceRun)> = hits
            .iter()
            .filter_map(|hit| rules.iter().find(|r| r.id == hit.rule_id).map(|rule| (rule, hit)))
            .flat_map(|(rule, hit)| sentence_runs(chunk, hit).into_iter().map(move |run| (rule, run)))
            .collect();

        tracing::debug!(chunk = chunk.index, runs = runs.len(), "Refining coarse hits");

        let spans = join_all(runs.iter().map(|(rule, run)| async move {
            let _permit = limit.acquire().await.ok();
            self.refiner.refine(chunk, rule, run).await
        }))
        .await;

        Some(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{PageData, Rect, Word};
    use crate::oracle::{FnOracle, OracleError};
    use async_trait::async_trait;
    use serde_json::Value;

    fn engine_with(config: EngineConfig, oracle: Arc<dyn Oracle>) -> AnnotationEngine {
        AnnotationEngine::new(config, PdfExtractor::text_layer_only(5), oracle, PromptStore::builtin()).unwrap()
    }

    fn document(text: &str) -> ExtractedDocument {
        ExtractedDocument {
            mode: ExtractionMode::Native,
            pages: vec![PageData {
                page_index: 0,
                page_height: 792.0,
                words: text
                    .split_whitespace()
                    .enumerate()
                    .map(|(i, w)| Word::new(w, Some(Rect::new(i as f32 * 10.0, 700.0, i as f32 * 10.0 + 8.0, 712.0))))
                    .collect(),
            }],
        }
    }

    fn silent_oracle() -> Arc<dyn Oracle> {
        Arc::new(FnOracle::new(|_: &str, _: &Value| Ok(r#"{"matches": []}"#.to_string())))
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EngineConfig {
            max_sentence_tokens: 0,
            ..EngineConfig::default()
        };
        let result = AnnotationEngine::new(config, PdfExtractor::text_layer_only(5), silent_oracle(), PromptStore::builtin());
        assert!(matches!(result, Err(AnnotateError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_non_pdf_is_invalid_document() {
        let engine = engine_with(EngineConfig::default(), silent_oracle());
        let outcome = engine.annotate(b"GIF89a....", &[Rule::new("R1", "tests")]).await.unwrap();
        assert_eq!(outcome.status, AnnotationStatus::InvalidDocument);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.extraction_mode, None);
    }

    #[tokio::test]
    async fn test_rules_checked_before_extraction() {
        let engine = engine_with(EngineConfig::default(), silent_oracle());
        let result = engine.annotate(b"not a pdf", &[]).await;
        assert!(matches!(result, Err(AnnotateError::InvalidRules(_))));
    }

    #[tokio::test]
    async fn test_empty_document_is_no_text() {
        let engine = engine_with(EngineConfig::default(), silent_oracle());
        let doc = ExtractedDocument {
            mode: ExtractionMode::Ocr,
            pages: Vec::new(),
        };
        let outcome = engine.annotate_document(&doc, &[Rule::new("R1", "tests")]).await.unwrap();
        assert_eq!(outcome.status, AnnotationStatus::NoText);
        assert_eq!(outcome.extraction_mode, Some(ExtractionMode::Ocr));
    }

    #[tokio::test]
    async fn test_coarse_failure_counts_failed_chunks() {
        let oracle: Arc<dyn Oracle> = Arc::new(FnOracle::new(|_: &str, _: &Value| {
            Err(OracleError::Unavailable("offline".to_string()))
        }));
        let config = EngineConfig {
            chunk_size: 6,
            overlap: 2,
            ..EngineConfig::default()
        };
        let engine = engine_with(config, oracle);

        let outcome = engine
            .annotate_document(&document("a b c. d e f. g h i. j k"), &[Rule::new("R1", "x")])
            .await
            .unwrap();
        assert_eq!(outcome.status, AnnotationStatus::Ok);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.stats.chunks, 3);
        assert_eq!(outcome.stats.failed_chunks, 3);
    }

    struct HangingOracle;

    #[async_trait]
    impl Oracle for HangingOracle {
        async fn complete(&self, _prompt: &str, _schema: &Value) -> std::result::Result<String, OracleError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_request_deadline() {
        let config = EngineConfig {
            request_timeout_secs: Some(1),
            ..EngineConfig::default()
        };
        let engine = engine_with(config, Arc::new(HangingOracle));

        let result = engine
            .annotate_document(&document("We validated the results experimentally."), &[Rule::new("R1", "tests")])
            .await;
        assert!(matches!(result, Err(AnnotateError::Timeout(1))));
    }
}
