//! Shared types for the ingestion pipeline.

use crate::embedding::EmbeddingClientError;
use crate::extract::ExtractError;
use crate::qdrant::VectorStoreError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors from text chunking.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Chunk size must be at least one character.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors raised while processing an uploaded document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Text extraction failed for the uploaded bytes.
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    /// The extracted text could not be chunked.
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    /// Every chunk failed to embed, leaving nothing to index.
    #[error("embedding failed for all {0} chunks")]
    AllEmbeddingsFailed(usize),
    /// The embedding provider rejected the request outright.
    #[error("embedding request failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The vector store rejected an operation.
    #[error("vector store operation failed: {0}")]
    VectorStore(#[from] VectorStoreError),
    /// The referenced document does not exist.
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),
    /// Extraction produced no usable text.
    #[error("document contains no extractable text")]
    EmptyDocument,
    /// The processing queue is at capacity.
    #[error("processing queue is full")]
    QueueFull,
    /// The processing worker is no longer running.
    #[error("processing worker is unavailable")]
    WorkerUnavailable,
}

/// Summary of a completed processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    /// Document that was processed.
    pub document_id: Uuid,
    /// Number of chunks produced by the chunker.
    pub chunk_count: usize,
    /// Number of chunks whose vectors were stored.
    pub embedded_count: usize,
    /// Number of chunks skipped because their embedding failed.
    pub skipped_count: usize,
    /// Collection the vectors were written to.
    pub collection: String,
}

/// A single retrieval hit surfaced to search and answering.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Chunk identifier backing the hit.
    pub chunk_id: String,
    /// Parent document, when the payload carries one.
    pub document_id: Option<Uuid>,
    /// Parent document title, when the payload carries one.
    pub document_title: Option<String>,
    /// Chunk text returned from the store payload.
    pub content: String,
    /// Similarity score assigned by the store.
    pub score: f32,
    /// Language tag, when the payload carries one.
    pub language: Option<String>,
}
