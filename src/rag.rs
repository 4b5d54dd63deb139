//! Retrieval-augmented answering over indexed documents.
//!
//! A question moves through three stages: retrieve relevant chunks, generate a grounded
//! answer, and assemble the response envelope. Retrieval coming back empty is a terminal
//! success with zero confidence and no generation call; provider failures degrade to an
//! apology instead of an error page. Successful context-grounded answers are memoized
//! for a short window keyed by the question and the retrieved context.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{CONTEXT_RESPONSE_TTL, KEY_LEN, KEY_LEN_SHORT, TtlCache, cache_key};
use crate::config::get_config;
use crate::generation::{ChatClient, ChatMessage, ChatRequest};
use crate::metrics::PipelineMetrics;
use crate::pipeline::types::{ProcessingError, SearchHit};
use crate::pipeline::ProcessingService;
use crate::qdrant::SearchFilterArgs;

const NO_CONTEXT_ANSWER: &str =
    "I could not find relevant information in the knowledge base to answer that question.";
const APOLOGY_ANSWER: &str =
    "I'm sorry, something went wrong while answering your question. Please try again.";
const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a \
document collection. Answer using only the provided context. If the context does not contain \
the answer, say \"I don't know based on the available documents.\" Keep answers concise.";
const MAX_SOURCES: usize = 5;

/// Parameters of a retrieval-augmented question.
#[derive(Debug, Clone)]
pub struct AskParams {
    /// Tenant whose documents are searched.
    pub tenant_id: Uuid,
    /// The question to answer.
    pub query: String,
    /// Optional language restriction on retrieved chunks.
    pub language: Option<String>,
    /// Optional tag restriction on retrieved chunks.
    pub tags: Option<Vec<String>>,
    /// Optional hit limit override.
    pub limit: Option<usize>,
    /// Optional score threshold override.
    pub score_threshold: Option<f32>,
}

/// A document cited by an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    /// Cited document, when the chunk payload carried one.
    pub document_id: Option<Uuid>,
    /// Cited document title.
    pub document_title: Option<String>,
    /// Best similarity score among the document's retrieved chunks.
    pub score: f32,
}

/// Response envelope for a retrieval-augmented question.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    /// Generated (or canned) answer text.
    pub answer: String,
    /// Mean similarity score of the retrieved chunks, 0.0 when nothing was retrieved.
    pub confidence: f32,
    /// Documents that contributed context, ranked by best score.
    pub sources: Vec<SourceRef>,
    /// False when a provider or store failure degraded the answer.
    pub is_successful: bool,
    /// Failure detail accompanying a degraded answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether this envelope was served from the answer cache.
    pub from_cache: bool,
    /// Wall-clock time spent answering, in milliseconds.
    pub elapsed_ms: u64,
}

/// Chunk retrieval seam between the orchestrator and the pipeline.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the most relevant chunks for a query within a tenant's documents.
    async fn retrieve(
        &self,
        tenant_id: Uuid,
        query: &str,
        filters: SearchFilterArgs,
        limit: Option<usize>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, ProcessingError>;
}

#[async_trait]
impl Retriever for ProcessingService {
    async fn retrieve(
        &self,
        tenant_id: Uuid,
        query: &str,
        filters: SearchFilterArgs,
        limit: Option<usize>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        self.search(tenant_id, query, filters, limit, score_threshold)
            .await
    }
}

/// Orchestrates retrieval, generation, and caching for questions.
pub struct RagOrchestrator {
    retriever: Arc<dyn Retriever>,
    chat: Arc<dyn ChatClient + Send + Sync>,
    answers: TtlCache<RagAnswer>,
    metrics: Arc<PipelineMetrics>,
}

impl RagOrchestrator {
    /// Assemble the orchestrator from its collaborators.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        chat: Arc<dyn ChatClient + Send + Sync>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            retriever,
            chat,
            answers: TtlCache::new(),
            metrics,
        }
    }

    /// Answer a question against the tenant's indexed documents.
    pub async fn ask(&self, params: AskParams) -> RagAnswer {
        let started = Instant::now();
        self.metrics.record_rag_query();

        let filters = SearchFilterArgs {
            document_id: None,
            language: params.language.clone(),
            tags: params.tags.clone(),
        };
        let hits = match self
            .retriever
            .retrieve(
                params.tenant_id,
                &params.query,
                filters,
                params.limit,
                params.score_threshold,
            )
            .await
        {
            Ok(hits) => hits,
            Err(error) => {
                tracing::error!(
                    tenant_id = %params.tenant_id,
                    error = %error,
                    "Retrieval failed; returning degraded answer"
                );
                return RagAnswer {
                    answer: APOLOGY_ANSWER.to_string(),
                    confidence: 0.0,
                    sources: Vec::new(),
                    is_successful: false,
                    error: Some(error.to_string()),
                    from_cache: false,
                    elapsed_ms: elapsed_ms(started),
                };
            }
        };

        if hits.is_empty() {
            tracing::debug!(
                tenant_id = %params.tenant_id,
                "No relevant chunks retrieved; skipping generation"
            );
            return RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                confidence: 0.0,
                sources: Vec::new(),
                is_successful: true,
                error: None,
                from_cache: false,
                elapsed_ms: elapsed_ms(started),
            };
        }

        let context = build_context(&hits);
        let config = get_config();
        let context_digest = cache_key(&[&context], KEY_LEN_SHORT);
        let key = cache_key(
            &[
                &params.query,
                params.language.as_deref().unwrap_or(""),
                &config.chat_model,
                &context_digest,
            ],
            KEY_LEN,
        );

        if let Some(cached) = self.answers.get(&key).await {
            self.metrics.record_cache(true);
            return RagAnswer {
                from_cache: true,
                elapsed_ms: elapsed_ms(started),
                ..cached
            };
        }
        self.metrics.record_cache(false);

        let confidence = mean_score(&hits);
        let sources = collect_sources(&hits);

        let prompt = format!("Context:\n{context}\n\nQuestion: {}", params.query);
        let completion = self
            .chat
            .complete(ChatRequest {
                model: config.chat_model.clone(),
                messages: vec![
                    ChatMessage::system(ANSWER_SYSTEM_PROMPT),
                    ChatMessage::user(prompt),
                ],
                temperature: 0.2,
                max_tokens: 512,
            })
            .await;

        match completion {
            Ok(completion) => {
                let answer = RagAnswer {
                    answer: completion.text.trim().to_string(),
                    confidence,
                    sources,
                    is_successful: true,
                    error: None,
                    from_cache: false,
                    elapsed_ms: elapsed_ms(started),
                };
                self.answers
                    .insert(key, answer.clone(), CONTEXT_RESPONSE_TTL)
                    .await;
                answer
            }
            Err(error) => {
                tracing::error!(
                    tenant_id = %params.tenant_id,
                    error = %error,
                    "Generation failed; returning degraded answer"
                );
                RagAnswer {
                    answer: APOLOGY_ANSWER.to_string(),
                    confidence,
                    sources,
                    is_successful: false,
                    error: Some(error.to_string()),
                    from_cache: false,
                    elapsed_ms: elapsed_ms(started),
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let title = hit.document_title.as_deref().unwrap_or("Untitled");
            format!("[{title}]\n{}", hit.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn mean_score(hits: &[SearchHit]) -> f32 {
    if hits.is_empty() {
        return 0.0;
    }
    hits.iter().map(|hit| hit.score).sum::<f32>() / hits.len() as f32
}

/// Deduplicate hits into per-document citations, keeping each document's best score.
fn collect_sources(hits: &[SearchHit]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for hit in hits {
        if let Some(existing) = sources
            .iter_mut()
            .find(|source| source.document_id.is_some() && source.document_id == hit.document_id)
        {
            if hit.score > existing.score {
                existing.score = hit.score;
            }
            continue;
        }
        sources.push(SourceRef {
            document_id: hit.document_id,
            document_title: hit.document_title.clone(),
            score: hit.score,
        });
    }
    sources.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    sources.truncate(MAX_SOURCES);
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ChatCompletion, GenerationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRetriever {
        hits: Vec<SearchHit>,
        fail: bool,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(
            &self,
            _tenant_id: Uuid,
            _query: &str,
            _filters: SearchFilterArgs,
            _limit: Option<usize>,
            _score_threshold: Option<f32>,
        ) -> Result<Vec<SearchHit>, ProcessingError> {
            if self.fail {
                return Err(ProcessingError::EmptyDocument);
            }
            Ok(self.hits.clone())
        }
    }

    struct CountingChat {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingChat {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChatClient for CountingChat {
        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatCompletion, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GenerationError::ProviderUnavailable("offline".into()));
            }
            Ok(ChatCompletion {
                text: "Grounded answer.".into(),
                prompt_tokens: Some(20),
                completion_tokens: Some(6),
                latency_ms: 2,
            })
        }
    }

    fn hit(title: &str, document_id: Uuid, score: f32) -> SearchHit {
        SearchHit {
            chunk_id: Uuid::new_v4().to_string(),
            document_id: Some(document_id),
            document_title: Some(title.to_string()),
            content: format!("Content from {title}"),
            score,
            language: Some("en".into()),
        }
    }

    fn params() -> AskParams {
        AskParams {
            tenant_id: Uuid::new_v4(),
            query: "What is the policy?".into(),
            language: Some("en".into()),
            tags: None,
            limit: None,
            score_threshold: None,
        }
    }

    fn orchestrator(
        hits: Vec<SearchHit>,
        retriever_fails: bool,
        chat: Arc<CountingChat>,
    ) -> RagOrchestrator {
        crate::test_support::ensure_test_config();
        RagOrchestrator::new(
            Arc::new(StubRetriever {
                hits,
                fail: retriever_fails,
            }),
            chat,
            Arc::new(PipelineMetrics::default()),
        )
    }

    #[tokio::test]
    async fn zero_hits_short_circuits_without_generation() {
        let chat = Arc::new(CountingChat::new(false));
        let rag = orchestrator(Vec::new(), false, chat.clone());

        let answer = rag.ask(params()).await;

        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.sources.is_empty());
        assert!(answer.is_successful);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confidence_is_mean_of_retrieval_scores() {
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let chat = Arc::new(CountingChat::new(false));
        let rag = orchestrator(
            vec![hit("A", doc_a, 0.9), hit("B", doc_b, 0.5)],
            false,
            chat.clone(),
        );

        let answer = rag.ask(params()).await;

        assert!(answer.is_successful);
        assert_eq!(answer.answer, "Grounded answer.");
        assert!((answer.confidence - 0.7).abs() < 1e-6);
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].document_id, Some(doc_a));
    }

    #[tokio::test]
    async fn repeated_question_is_served_from_cache() {
        let doc = Uuid::new_v4();
        let chat = Arc::new(CountingChat::new(false));
        let rag = orchestrator(vec![hit("A", doc, 0.8)], false, chat.clone());

        let first = rag.ask(params()).await;
        assert!(!first.from_cache);

        let second = rag.ask(params()).await;
        assert!(second.from_cache);
        assert_eq!(second.answer, first.answer);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_apology() {
        let chat = Arc::new(CountingChat::new(false));
        let rag = orchestrator(Vec::new(), true, chat.clone());

        let answer = rag.ask(params()).await;

        assert_eq!(answer.answer, APOLOGY_ANSWER);
        assert!(!answer.is_successful);
        assert!(answer.error.is_some());
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generation_failure_is_not_cached() {
        let doc = Uuid::new_v4();
        let chat = Arc::new(CountingChat::new(true));
        let rag = orchestrator(vec![hit("A", doc, 0.8)], false, chat.clone());

        let first = rag.ask(params()).await;
        assert!(!first.is_successful);
        assert_eq!(first.answer, APOLOGY_ANSWER);

        // The failure must not be replayed from cache; the provider is consulted again.
        let second = rag.ask(params()).await;
        assert!(!second.from_cache);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sources_are_deduplicated_by_document() {
        let doc = Uuid::new_v4();
        let chat = Arc::new(CountingChat::new(false));
        let rag = orchestrator(
            vec![hit("A", doc, 0.6), hit("A", doc, 0.9)],
            false,
            chat.clone(),
        );

        let answer = rag.ask(params()).await;

        assert_eq!(answer.sources.len(), 1);
        assert!((answer.sources[0].score - 0.9).abs() < f32::EPSILON);
    }
}
