//! Shared types used by the vector store adapter.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned while interacting with the vector store.
///
/// These are typed deliberately: callers can tell a degraded store apart from a
/// legitimately empty result set, instead of both collapsing into an empty list.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Prepared chunk vector ready for upserting.
///
/// The point id is the chunk id, so re-upserting a chunk replaces its previous vector.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    /// Chunk identifier, reused as the Qdrant point id.
    pub chunk_id: Uuid,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Raw chunk text.
    pub content: String,
    /// Identifier of the parent document.
    pub document_id: Uuid,
    /// Title of the parent document.
    pub document_title: String,
    /// 0-based index of the chunk within its document.
    pub chunk_index: usize,
    /// Document language tag.
    pub language: String,
    /// Caller-supplied metadata merged into the payload.
    pub metadata: Map<String, Value>,
}

/// Filters that can be applied to vector searches.
#[derive(Debug, Default, Clone)]
pub struct SearchFilterArgs {
    /// Exact match constraint for the `document_id` payload field.
    pub document_id: Option<Uuid>,
    /// Exact match constraint for the `language` payload field.
    pub language: Option<String>,
    /// Contains-any constraint for the `tags` payload field.
    pub tags: Option<Vec<String>>,
}

/// Scored payload returned by vector queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by the store.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResponse {
    pub(crate) result: ListCollectionsResult,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResult {
    pub(crate) collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionDescription {
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
        #[serde(default)]
        _count: Option<usize>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResult,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<ScrollPoint>,
    #[serde(default)]
    pub(crate) next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) id: Option<Value>,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
