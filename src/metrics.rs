use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    documents_failed: AtomicU64,
    chunks_indexed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rag_queries: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully processed document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a document that ended in the failed state.
    pub fn record_failure(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache lookup outcome.
    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed retrieval-augmented query.
    pub fn record_rag_query(&self) {
        self.rag_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rag_queries: self.rag_queries.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents fully processed since startup.
    pub documents_processed: u64,
    /// Number of documents that ended in the failed state.
    pub documents_failed: u64,
    /// Total chunk count indexed across all processed documents.
    pub chunks_indexed: u64,
    /// Number of cache lookups served without invoking the backing call.
    pub cache_hits: u64,
    /// Number of cache lookups that fell through to the backing call.
    pub cache_misses: u64,
    /// Number of retrieval-augmented queries answered.
    pub rag_queries: u64,
}
