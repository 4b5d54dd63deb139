//! Document processing pipeline: extract, chunk, embed, index, enrich.

use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use crate::cache::{KEY_LEN, SUMMARY_TTL, TtlCache, cache_key};
use crate::config::get_config;
use crate::documents::{DocumentChunk, DocumentStatus, DocumentStore, ProcessingOutcome};
use crate::embedding::EmbeddingClient;
use crate::extract::{FileType, extract_text};
use crate::generation::{ChatClient, ChatMessage, ChatRequest};
use crate::metrics::PipelineMetrics;
use crate::pipeline::chunking::{TextChunk, chunk_text};
use crate::pipeline::events::{EventPublisher, PipelineEvent};
use crate::pipeline::types::{ProcessingError, ProcessingReport, SearchHit};
use crate::qdrant::{
    ChunkPoint, DOCUMENTS_PURPOSE, QdrantStore, SearchFilterArgs, ScoredPoint,
    build_search_filter, collection_name,
};

const SUMMARY_PROMPT: &str = "Summarize the following document in 2-3 sentences. \
Respond with the summary only, no preamble.";
const TAGS_PROMPT: &str = "List up to 5 short topic tags for the following document. \
Respond with a single comma-separated line, no other text.";
const SUMMARY_INPUT_LIMIT: usize = 6000;

/// Cached document enrichment produced by the chat provider.
#[derive(Debug, Clone)]
struct Enrichment {
    summary: Option<String>,
    tags: Vec<String>,
}

/// Coordinates extraction, chunking, embedding, and indexing for uploads.
pub struct ProcessingService {
    pub(crate) store: Arc<QdrantStore>,
    pub(crate) documents: Arc<DocumentStore>,
    pub(crate) embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
    pub(crate) chat: Arc<dyn ChatClient + Send + Sync>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) metrics: Arc<PipelineMetrics>,
    enrichment_cache: TtlCache<Enrichment>,
}

impl ProcessingService {
    /// Assemble the service from its collaborators.
    pub fn new(
        store: Arc<QdrantStore>,
        documents: Arc<DocumentStore>,
        embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
        chat: Arc<dyn ChatClient + Send + Sync>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            store,
            documents,
            embeddings,
            chat,
            events,
            metrics,
            enrichment_cache: TtlCache::new(),
        }
    }

    /// Run the full pipeline for an uploaded document.
    ///
    /// This is the single recovery boundary: any error marks the document `Failed`
    /// with a reason, records the failure, and propagates the typed error to the
    /// caller. The document never silently stays in `Processing`.
    pub async fn process_document(
        &self,
        document_id: Uuid,
        bytes: Vec<u8>,
    ) -> Result<ProcessingReport, ProcessingError> {
        match self.run_pipeline(document_id, bytes).await {
            Ok(report) => Ok(report),
            Err(error) => {
                let reason = error.to_string();
                self.documents.set_failed(document_id, reason.clone()).await;
                self.metrics.record_failure();
                self.events.publish(PipelineEvent::ProcessingFailed {
                    document_id,
                    reason,
                });
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        document_id: Uuid,
        bytes: Vec<u8>,
    ) -> Result<ProcessingReport, ProcessingError> {
        let config = get_config();
        let document = self
            .documents
            .get(document_id)
            .await
            .ok_or(ProcessingError::DocumentNotFound(document_id))?;

        self.documents
            .set_status(document_id, DocumentStatus::Processing)
            .await;
        self.events
            .publish(PipelineEvent::ProcessingStarted { document_id });

        // Resolved here rather than at admission so an unsupported upload lands in
        // `Failed` with a reason instead of being bounced before a record exists.
        let file_type = match document.file_type {
            Some(file_type) => file_type,
            None => FileType::from_filename(&document.original_filename)?,
        };
        let text = extract_text(&bytes, file_type)?;
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyDocument);
        }

        let chunks = chunk_text(&text, config.chunk_size, config.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(ProcessingError::EmptyDocument);
        }

        let vectors = self.embed_chunks(&chunks).await;
        let embedded_count = vectors.iter().filter(|vector| vector.is_some()).count();
        if embedded_count == 0 {
            return Err(ProcessingError::AllEmbeddingsFailed(chunks.len()));
        }
        let skipped_count = chunks.len() - embedded_count;
        if skipped_count > 0 {
            tracing::warn!(
                document_id = %document_id,
                skipped = skipped_count,
                total = chunks.len(),
                "Some chunks failed to embed and were skipped"
            );
        }

        let collection = collection_name(document.tenant_id, DOCUMENTS_PURPOSE);
        self.store
            .create_collection_if_not_exists(&collection, config.embedding_dimension as u64)
            .await?;

        let mut document_chunks = Vec::with_capacity(chunks.len());
        let mut points = Vec::with_capacity(embedded_count);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let chunk_id = Uuid::new_v4();
            if let Some(vector) = vector {
                points.push(ChunkPoint {
                    chunk_id,
                    vector,
                    content: chunk.content.clone(),
                    document_id,
                    document_title: document.title.clone(),
                    chunk_index: chunk.index,
                    language: document.language.clone(),
                    metadata: document.metadata.clone(),
                });
            }
            document_chunks.push(DocumentChunk {
                id: chunk_id,
                document_id,
                tenant_id: document.tenant_id,
                index: chunk.index,
                content: chunk.content.clone(),
                start: chunk.start,
                end: chunk.end,
                is_embedded: points.last().is_some_and(|point| point.chunk_id == chunk_id),
            });
        }

        self.store.upsert_chunks(&collection, points).await?;

        let enrichment = self.enrich(&text).await;

        let chunk_count = document_chunks.len();
        self.documents
            .apply_outcome(
                document_id,
                ProcessingOutcome {
                    chunk_count,
                    embedded_count,
                    vector_collection: collection.clone(),
                    summary: enrichment.summary,
                    tags: enrichment.tags,
                },
                document_chunks,
            )
            .await;

        self.metrics.record_document(embedded_count as u64);
        self.events.publish(PipelineEvent::DocumentProcessed {
            document_id,
            chunk_count,
        });

        Ok(ProcessingReport {
            document_id,
            chunk_count,
            embedded_count,
            skipped_count,
            collection,
        })
    }

    /// Embed chunks fail-open: a chunk whose embedding fails is skipped, not fatal.
    ///
    /// The batch call is tried first; only when it fails does the service retry chunk
    /// by chunk so one poisoned input cannot sink the rest of the document.
    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Vec<Option<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();

        match self.embeddings.generate_embeddings(texts.clone()).await {
            Ok(vectors) if vectors.len() == chunks.len() => {
                return vectors.into_iter().map(Some).collect();
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = chunks.len(),
                    received = vectors.len(),
                    "Batch embedding returned a mismatched count; retrying per chunk"
                );
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Batch embedding failed; retrying per chunk"
                );
            }
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for (chunk, text) in chunks.iter().zip(texts) {
            match self.embeddings.generate_embeddings(vec![text]).await {
                Ok(mut result) if !result.is_empty() => vectors.push(Some(result.remove(0))),
                Ok(_) => vectors.push(None),
                Err(error) => {
                    tracing::warn!(
                        chunk_index = chunk.index,
                        error = %error,
                        "Chunk embedding failed; skipping"
                    );
                    vectors.push(None);
                }
            }
        }
        vectors
    }

    /// Produce summary and tags for the document, caching by content hash.
    ///
    /// Enrichment failures are non-fatal: an indexed document without a summary is
    /// still searchable. Only successful results enter the cache.
    async fn enrich(&self, text: &str) -> Enrichment {
        let config = get_config();
        let input: String = text.chars().take(SUMMARY_INPUT_LIMIT).collect();
        let key = cache_key(&["enrich", &config.chat_model, &input], KEY_LEN);

        if let Some(cached) = self.enrichment_cache.get(&key).await {
            return cached;
        }

        let summary = match self.chat_once(SUMMARY_PROMPT, &input, 256).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(error = %error, "Summary generation failed; continuing without");
                None
            }
        };

        let tags = match self.chat_once(TAGS_PROMPT, &input, 64).await {
            Ok(line) => line
                .split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .take(5)
                .collect(),
            Err(error) => {
                tracing::warn!(error = %error, "Tag extraction failed; continuing without");
                Vec::new()
            }
        };

        let enrichment = Enrichment { summary, tags };
        if enrichment.summary.is_some() || !enrichment.tags.is_empty() {
            self.enrichment_cache
                .insert(key, enrichment.clone(), SUMMARY_TTL)
                .await;
        }
        enrichment
    }

    async fn chat_once(
        &self,
        system_prompt: &str,
        input: &str,
        max_tokens: u32,
    ) -> Result<String, crate::generation::GenerationError> {
        let config = get_config();
        let completion = self
            .chat
            .complete(ChatRequest {
                model: config.chat_model.clone(),
                messages: vec![
                    ChatMessage::system(system_prompt),
                    ChatMessage::user(input),
                ],
                temperature: 0.2,
                max_tokens,
            })
            .await?;
        Ok(completion.text.trim().to_string())
    }

    /// Delete a document, its chunks, and its vectors.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<(), ProcessingError> {
        let document = self
            .documents
            .get(document_id)
            .await
            .ok_or(ProcessingError::DocumentNotFound(document_id))?;

        if let Some(collection) = &document.vector_collection {
            self.store.delete_document(collection, document_id).await?;
        }

        self.documents.remove(document_id).await;
        self.events
            .publish(PipelineEvent::DocumentDeleted { document_id });
        Ok(())
    }

    /// Similarity search over a tenant's document collection.
    pub async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        filters: SearchFilterArgs,
        limit: Option<usize>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        let config = get_config();
        let limit = limit
            .unwrap_or(config.search_default_limit)
            .clamp(1, config.search_max_limit);
        let threshold = score_threshold.unwrap_or(config.search_default_score_threshold);

        let mut vectors = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?;
        if vectors.is_empty() {
            return Err(ProcessingError::Embedding(
                crate::embedding::EmbeddingClientError::InvalidResponse(
                    "provider returned no vector for the query".into(),
                ),
            ));
        }
        let vector = vectors.remove(0);

        let collection = collection_name(tenant_id, DOCUMENTS_PURPOSE);
        let filter = build_search_filter(&filters);
        let points = self
            .store
            .search_points(&collection, vector, limit, Some(threshold), filter)
            .await?;

        Ok(points.into_iter().map(point_to_hit).collect())
    }

    /// Similarity search fanned out over every collection the tenant owns.
    pub async fn search_all_collections(
        &self,
        tenant_id: Uuid,
        query: &str,
        limit: Option<usize>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        let config = get_config();
        let limit = limit
            .unwrap_or(config.search_default_limit)
            .clamp(1, config.search_max_limit);
        let threshold = score_threshold.unwrap_or(config.search_default_score_threshold);

        let mut vectors = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?;
        if vectors.is_empty() {
            return Err(ProcessingError::Embedding(
                crate::embedding::EmbeddingClientError::InvalidResponse(
                    "provider returned no vector for the query".into(),
                ),
            ));
        }
        let vector = vectors.remove(0);

        let points = self
            .store
            .search_across_collections(tenant_id, vector, limit, Some(threshold))
            .await?;

        Ok(points.into_iter().map(point_to_hit).collect())
    }
}

fn point_to_hit(point: ScoredPoint) -> SearchHit {
    let payload = point.payload.unwrap_or_else(Map::new);
    SearchHit {
        chunk_id: point.id,
        document_id: payload
            .get("document_id")
            .and_then(|value| value.as_str())
            .and_then(|value| Uuid::parse_str(value).ok()),
        document_title: payload
            .get("document_title")
            .and_then(|value| value.as_str())
            .map(str::to_string),
        content: payload
            .get("content")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string(),
        score: point.score,
        language: payload
            .get("language")
            .and_then(|value| value.as_str())
            .map(str::to_string),
    }
}
