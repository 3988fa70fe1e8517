//! Extraction cache
//!
//! LRU cache of extracted documents keyed by the SHA-256 of the PDF bytes, so
//! repeated requests for the same file skip MuPDF and OCR. Only extraction
//! output is cached; matching always runs fresh.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::types::ExtractedDocument;

/// Lowercase hex SHA-256 of the document bytes
pub fn document_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe extraction cache. Capacity 0 disables it.
pub struct DocumentCache {
    entries: Option<Mutex<LruCache<String, Arc<ExtractedDocument>>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn get(&self, key: &str) -> Option<Arc<ExtractedDocument>> {
        let entries = self.entries.as_ref()?;
        let found = entries.lock().get(key).cloned();
        match found {
            Some(doc) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(document = %key, "Extraction cache hit");
                Some(doc)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, document: Arc<ExtractedDocument>) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, document);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.as_ref().map(|e| e.lock().len()).unwrap_or(0),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionMode;

    fn doc() -> Arc<ExtractedDocument> {
        Arc::new(ExtractedDocument {
            mode: ExtractionMode::Native,
            pages: Vec::new(),
        })
    }

    #[test]
    fn test_document_key_is_sha256_hex() {
        assert_eq!(
            document_key(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_lru_eviction() {
        let cache = DocumentCache::new(2);
        cache.insert("a".to_string(), doc());
        cache.insert("b".to_string(), doc());
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), doc());

        // "b" was least recently used
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = DocumentCache::disabled();
        cache.insert("a".to_string(), doc());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().entries, 0);
    }
}
