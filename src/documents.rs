//! Document and chunk records plus the in-memory registry backing the API.

use crate::extract::FileType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Stored but not yet picked up by the pipeline.
    Uploaded,
    /// Currently being extracted, chunked, and indexed.
    Processing,
    /// Fully indexed and searchable.
    Processed,
    /// Processing failed; the document is not searchable.
    Failed,
    /// Retained but excluded from retrieval.
    Archived,
}

/// An uploaded document and its indexing state.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Human-readable title, defaulting to the filename stem.
    pub title: String,
    /// Filename as supplied at upload time.
    pub original_filename: String,
    /// Detected file type. `None` when the extension was not recognized at upload
    /// time; the pipeline fails such documents with a reason callers can poll.
    pub file_type: Option<FileType>,
    /// Upload size in bytes.
    pub size_bytes: usize,
    /// Where the original bytes live, when a blob store is attached.
    pub storage_path: Option<String>,
    /// Current lifecycle state.
    pub status: DocumentStatus,
    /// Generated summary, present once processing succeeds.
    pub summary: Option<String>,
    /// Generated topic tags.
    pub tags: Vec<String>,
    /// Language tag applied to every chunk.
    pub language: String,
    /// Caller-supplied metadata propagated into chunk payloads.
    pub metadata: Map<String, Value>,
    /// Number of chunks produced by the last successful run.
    pub chunk_count: usize,
    /// Whether chunk vectors are present in the store.
    pub is_embedded: bool,
    /// Collection holding this document's vectors, once indexed.
    pub vector_collection: Option<String>,
    /// Failure detail for the `Failed` state.
    pub error: Option<String>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Document {
    /// Create a freshly uploaded document record.
    pub fn new(
        tenant_id: Uuid,
        original_filename: String,
        file_type: Option<FileType>,
        size_bytes: usize,
        language: String,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let title = original_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| original_filename.clone());

        Self {
            id: Uuid::new_v4(),
            tenant_id,
            title,
            original_filename,
            file_type,
            size_bytes,
            storage_path: None,
            status: DocumentStatus::Uploaded,
            summary: None,
            tags: Vec::new(),
            language,
            metadata,
            chunk_count: 0,
            is_embedded: false,
            vector_collection: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chunk of extracted text belonging to a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentChunk {
    /// Chunk identifier, reused as the vector point id.
    pub id: Uuid,
    /// Parent document.
    pub document_id: Uuid,
    /// Owning tenant, denormalized for filtering.
    pub tenant_id: Uuid,
    /// 0-based position within the document.
    pub index: usize,
    /// Chunk text, including any overlap seed from the previous chunk.
    pub content: String,
    /// Byte offset of the chunk start in the extracted text.
    pub start: usize,
    /// Byte offset of the chunk end in the extracted text.
    pub end: usize,
    /// Whether a vector for this chunk was stored.
    pub is_embedded: bool,
}

/// Outcome of a successful processing run, applied to the document record.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    /// Number of chunks produced.
    pub chunk_count: usize,
    /// Number of chunks with stored vectors.
    pub embedded_count: usize,
    /// Collection the vectors were written to.
    pub vector_collection: String,
    /// Generated summary, if the provider produced one.
    pub summary: Option<String>,
    /// Generated tags, if the provider produced them.
    pub tags: Vec<String>,
}

/// Async in-memory registry of documents and their chunks.
///
/// Durable storage is out of scope; every consumer goes through this registry so a
/// persistent backend can replace it behind the same methods.
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    chunks: RwLock<HashMap<Uuid, Vec<DocumentChunk>>>,
}

impl DocumentStore {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new document.
    pub async fn insert(&self, document: Document) {
        self.documents.write().await.insert(document.id, document);
    }

    /// Fetch a document by id.
    pub async fn get(&self, id: Uuid) -> Option<Document> {
        self.documents.read().await.get(&id).cloned()
    }

    /// List a tenant's documents, newest first.
    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|document| document.tenant_id == tenant_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents
    }

    /// Transition a document to a new lifecycle state.
    pub async fn set_status(&self, id: Uuid, status: DocumentStatus) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.get_mut(&id)?;
        document.status = status;
        document.updated_at = OffsetDateTime::now_utc();
        Some(document.clone())
    }

    /// Mark a document failed with a reason.
    pub async fn set_failed(&self, id: Uuid, reason: String) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.get_mut(&id)?;
        document.status = DocumentStatus::Failed;
        document.error = Some(reason);
        document.updated_at = OffsetDateTime::now_utc();
        Some(document.clone())
    }

    /// Apply the results of a successful processing run and mark the document processed.
    pub async fn apply_outcome(
        &self,
        id: Uuid,
        outcome: ProcessingOutcome,
        chunks: Vec<DocumentChunk>,
    ) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.get_mut(&id)?;
        document.status = DocumentStatus::Processed;
        document.chunk_count = outcome.chunk_count;
        // Only a fully embedded document counts as embedded; partial coverage leaves
        // the flag cleared so callers can spot degraded indexing.
        document.is_embedded =
            outcome.chunk_count > 0 && outcome.embedded_count == outcome.chunk_count;
        document.vector_collection = Some(outcome.vector_collection);
        if outcome.summary.is_some() {
            document.summary = outcome.summary;
        }
        if !outcome.tags.is_empty() {
            document.tags = outcome.tags;
        }
        document.error = None;
        document.updated_at = OffsetDateTime::now_utc();
        let updated = document.clone();
        drop(documents);

        self.chunks.write().await.insert(id, chunks);
        Some(updated)
    }

    /// Fetch the stored chunks for a document.
    pub async fn chunks_for(&self, id: Uuid) -> Vec<DocumentChunk> {
        self.chunks.read().await.get(&id).cloned().unwrap_or_default()
    }

    /// Remove a document and cascade to its chunks.
    pub async fn remove(&self, id: Uuid) -> Option<Document> {
        let removed = self.documents.write().await.remove(&id);
        if removed.is_some() {
            self.chunks.write().await.remove(&id);
        }
        removed
    }

    /// Number of registered documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the registry holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}
