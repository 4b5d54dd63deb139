//! Embedding client abstraction and adapters.
//!
//! The pipeline treats embedding quality as an external, pluggable concern. Two adapters
//! exist: an OpenAI-compatible HTTP client and a deterministic local encoder used for
//! tests and offline runs. Selection happens once at startup from configuration.

use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unreachable or refused the request.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient + Send + Sync> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => {
            let base_url = config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Box::new(OpenAiEmbeddingClient::new(
                base_url,
                config.openai_api_key.clone(),
            ))
        }
        EmbeddingProvider::Deterministic => Box::new(DeterministicClient::new()),
    }
}

/// HTTP adapter for OpenAI-compatible `/v1/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client targeting the given base URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("ragmill/embeddings")
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let config = get_config();
        let expected = texts.len();
        let payload = json!({
            "model": config.embedding_model,
            "input": texts,
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!(
                "failed to reach embeddings endpoint at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embeddings endpoint returned {status}: {body}"
            )));
        }

        let body: EmbeddingsResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode embeddings response: {error}"
            ))
        })?;

        if body.data.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} vectors, got {}",
                body.data.len()
            )));
        }

        let mut entries = body.data;
        entries.sort_by_key(|entry| entry.index);
        Ok(entries.into_iter().map(|entry| entry.embedding).collect())
    }
}

/// Deterministic fallback encoder hashing bytes into a normalized vector.
pub struct DeterministicClient;

impl DeterministicClient {
    /// Construct a new deterministic embedding client instance.
    pub const fn new() -> Self {
        Self
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

impl Default for DeterministicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for DeterministicClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let config = get_config();
        let dimension = config.embedding_dimension;

        tracing::debug!(
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            dimension,
            "Generating embeddings"
        );

        if dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let embeddings = texts
            .into_iter()
            .map(|text| Self::encode(&text, dimension))
            .collect();

        Ok(embeddings)
    }
}
