#![deny(missing_docs)]

//! Core library for the Ragmill document ingestion and retrieval server.

/// HTTP routing and REST handlers.
pub mod api;
/// Application assembly and the service trait behind the HTTP surface.
pub mod app;
/// TTL caching for provider results.
pub mod cache;
/// Environment-driven configuration management.
pub mod config;
/// Document records and the in-memory registry.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Plain-text extraction for uploaded files.
pub mod extract;
/// Chat-completion client for answers, summaries, and tags.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Document ingestion pipeline.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Retrieval-augmented answering.
pub mod rag;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{CONFIG, Config, EmbeddingProvider};
    use std::sync::Once;

    pub(crate) fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                qdrant_url: "http://127.0.0.1:6333".into(),
                qdrant_api_key: None,
                embedding_provider: EmbeddingProvider::Deterministic,
                embedding_model: "test-model".into(),
                embedding_dimension: 8,
                openai_base_url: None,
                openai_api_key: None,
                chat_model: "test-chat-model".into(),
                chunk_size: 1000,
                chunk_overlap: 200,
                search_default_limit: 5,
                search_max_limit: 50,
                search_default_score_threshold: 0.25,
                queue_capacity: 8,
                server_port: None,
            });
        });
    }
}
