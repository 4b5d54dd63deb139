//! Application assembly: wires the stores, pipeline, queue, and orchestrator together
//! behind the trait the HTTP layer is generic over.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use uuid::Uuid;

use crate::config::get_config;
use crate::documents::{Document, DocumentStatus, DocumentStore};
use crate::embedding::get_embedding_client;
use crate::extract::FileType;
use crate::generation::{ChatClient, get_chat_client};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::{
    IngestJob, JobQueue, ProcessingError, ProcessingService, SearchHit, TracingEventPublisher,
};
use crate::qdrant::{QdrantStore, SearchFilterArgs, VectorStoreError};
use crate::rag::{AskParams, RagAnswer, RagOrchestrator};

/// An upload ready to be registered and queued.
#[derive(Debug)]
pub struct DocumentUpload {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Original filename, used for type detection and the default title.
    pub filename: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Language tag applied to every chunk, defaulting to `en`.
    pub language: Option<String>,
    /// Caller metadata propagated into chunk payloads.
    pub metadata: Option<Map<String, serde_json::Value>>,
}

/// Operations the HTTP surface depends on.
#[async_trait]
pub trait RagmillApi: Send + Sync {
    /// Register an upload and enqueue it for background processing.
    async fn upload_document(&self, upload: DocumentUpload) -> Result<Document, ProcessingError>;
    /// Fetch a document record by id.
    async fn get_document(&self, id: Uuid) -> Option<Document>;
    /// List a tenant's documents, newest first.
    async fn list_documents(&self, tenant_id: Uuid) -> Vec<Document>;
    /// Delete a document, its chunks, and its vectors.
    async fn delete_document(&self, id: Uuid) -> Result<(), ProcessingError>;
    /// Similarity search over a tenant's documents.
    ///
    /// With `all_collections` set, the search fans out over every collection the
    /// tenant owns and merges the results by score; `filters` only apply to the
    /// single-collection form.
    async fn search(
        &self,
        tenant_id: Uuid,
        query: String,
        filters: SearchFilterArgs,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        all_collections: bool,
    ) -> Result<Vec<SearchHit>, ProcessingError>;
    /// Answer a question with retrieval-augmented generation.
    async fn ask(&self, params: AskParams) -> RagAnswer;
    /// Snapshot of pipeline counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Concrete application service backing the HTTP surface.
pub struct AppService {
    documents: Arc<DocumentStore>,
    processing: Arc<ProcessingService>,
    queue: JobQueue,
    rag: RagOrchestrator,
    metrics: Arc<PipelineMetrics>,
}

impl AppService {
    /// Build the full application from configuration.
    pub fn from_config() -> Result<Self, VectorStoreError> {
        let store = Arc::new(QdrantStore::new()?);
        let chat: Arc<dyn ChatClient + Send + Sync> = Arc::from(get_chat_client());
        Ok(Self::assemble(store, chat))
    }

    /// Assemble the service around externally constructed adapters.
    pub fn assemble(store: Arc<QdrantStore>, chat: Arc<dyn ChatClient + Send + Sync>) -> Self {
        let config = get_config();
        let documents = Arc::new(DocumentStore::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let processing = Arc::new(ProcessingService::new(
            store,
            Arc::clone(&documents),
            Arc::from(get_embedding_client()),
            Arc::clone(&chat),
            Arc::new(TracingEventPublisher),
            Arc::clone(&metrics),
        ));
        let queue = JobQueue::start(Arc::clone(&processing), config.queue_capacity);
        let rag = RagOrchestrator::new(
            Arc::clone(&processing) as Arc<dyn crate::rag::Retriever>,
            chat,
            Arc::clone(&metrics),
        );

        Self {
            documents,
            processing,
            queue,
            rag,
            metrics,
        }
    }
}

#[async_trait]
impl RagmillApi for AppService {
    async fn upload_document(&self, upload: DocumentUpload) -> Result<Document, ProcessingError> {
        // Unrecognized extensions are admitted too: the pipeline fails them with an
        // unsupported-format reason, so callers polling the record see `failed`
        // rather than the upload silently vanishing.
        let file_type = FileType::from_filename(&upload.filename).ok();

        let mut document = Document::new(
            upload.tenant_id,
            upload.filename,
            file_type,
            upload.bytes.len(),
            upload.language.unwrap_or_else(|| "en".to_string()),
            upload.metadata.unwrap_or_default(),
        );
        // Admission and processing are decoupled; callers see `processing` from the start.
        document.status = DocumentStatus::Processing;
        let document_id = document.id;
        self.documents.insert(document.clone()).await;

        if let Err(error) = self.queue.enqueue(IngestJob {
            document_id,
            bytes: upload.bytes,
        }) {
            // Admission failed: the record must not linger in `Uploaded`.
            self.documents.remove(document_id).await;
            return Err(error);
        }

        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Option<Document> {
        self.documents.get(id).await
    }

    async fn list_documents(&self, tenant_id: Uuid) -> Vec<Document> {
        self.documents.list_for_tenant(tenant_id).await
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), ProcessingError> {
        self.processing.delete_document(id).await
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        query: String,
        filters: SearchFilterArgs,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        all_collections: bool,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        if all_collections {
            self.processing
                .search_all_collections(tenant_id, &query, limit, score_threshold)
                .await
        } else {
            self.processing
                .search(tenant_id, &query, filters, limit, score_threshold)
                .await
        }
    }

    async fn ask(&self, params: AskParams) -> RagAnswer {
        self.rag.ask(params).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
