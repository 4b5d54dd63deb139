//! HTTP surface for Ragmill.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Register an upload (base64 content) and queue it for processing.
//! - `GET /documents` – List a tenant's documents.
//! - `GET /documents/:id` – Fetch a single document record with its processing state.
//! - `DELETE /documents/:id` – Remove a document, its chunks, and its vectors.
//! - `POST /search` – Similarity search over a tenant's indexed chunks; set
//!   `all_collections` to fan out over every collection the tenant owns.
//! - `POST /ask` – Retrieval-augmented question answering.
//! - `GET /metrics` – Observe pipeline counters.
//!
//! Uploads return immediately with the document in `processing` state; the pipeline
//! runs in the background and progress is observed by polling `GET /documents/:id`.

use crate::app::{DocumentUpload, RagmillApi};
use crate::documents::{Document, DocumentStatus};
use crate::extract::FileType;
use crate::pipeline::{ProcessingError, SearchHit};
use crate::rag::{AskParams, RagAnswer};
use crate::qdrant::SearchFilterArgs;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Build the HTTP router exposing the document and retrieval API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagmillApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            post(upload_document::<S>).get(list_documents::<S>),
        )
        .route(
            "/documents/:id",
            get(get_document::<S>).delete(delete_document::<S>),
        )
        .route("/search", post(search::<S>))
        .route("/ask", post(ask::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for `POST /documents`.
#[derive(Deserialize)]
struct UploadRequest {
    /// Owning tenant.
    tenant_id: Uuid,
    /// Original filename including extension; drives format detection.
    filename: String,
    /// Base64-encoded file content.
    content_base64: String,
    /// Optional language tag, defaulting to `en`.
    #[serde(default)]
    language: Option<String>,
    /// Optional metadata propagated into chunk payloads.
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Document record as returned to API clients.
#[derive(Serialize)]
struct DocumentResponse {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    original_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_type: Option<FileType>,
    size_bytes: usize,
    status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    tags: Vec<String>,
    language: String,
    chunk_count: usize,
    is_embedded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            tenant_id: document.tenant_id,
            title: document.title,
            original_filename: document.original_filename,
            file_type: document.file_type,
            size_bytes: document.size_bytes,
            status: document.status,
            summary: document.summary,
            tags: document.tags,
            language: document.language,
            chunk_count: document.chunk_count,
            is_embedded: document.is_embedded,
            error: document.error,
        }
    }
}

/// Register an upload and queue it for background processing.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError>
where
    S: RagmillApi,
{
    let bytes = STANDARD
        .decode(request.content_base64.as_bytes())
        .map_err(|_| AppError::BadRequest("content_base64 is not valid base64".into()))?;

    let document = service
        .upload_document(DocumentUpload {
            tenant_id: request.tenant_id,
            filename: request.filename,
            bytes,
            language: request.language,
            metadata: request.metadata,
        })
        .await?;

    tracing::info!(
        document_id = %document.id,
        tenant_id = %document.tenant_id,
        file_type = ?document.file_type,
        size_bytes = document.size_bytes,
        "Upload accepted"
    );
    Ok((StatusCode::ACCEPTED, Json(document.into())))
}

#[derive(Deserialize)]
struct ListQuery {
    tenant_id: Uuid,
}

/// List a tenant's documents, newest first.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<DocumentResponse>>
where
    S: RagmillApi,
{
    let documents = service.list_documents(query.tenant_id).await;
    Json(documents.into_iter().map(DocumentResponse::from).collect())
}

/// Fetch a single document record.
async fn get_document<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError>
where
    S: RagmillApi,
{
    let document = service
        .get_document(id)
        .await
        .ok_or(AppError::Processing(ProcessingError::DocumentNotFound(id)))?;
    Ok(Json(document.into()))
}

/// Delete a document, its chunks, and its vectors.
async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError>
where
    S: RagmillApi,
{
    service.delete_document(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    tenant_id: Uuid,
    query: String,
    #[serde(default)]
    document_id: Option<Uuid>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    score_threshold: Option<f32>,
    /// Fan the search out over every collection the tenant owns.
    #[serde(default)]
    all_collections: bool,
}

#[derive(Serialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

/// Similarity search over a tenant's indexed chunks.
async fn search<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: RagmillApi,
{
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".into()));
    }
    // The fan-out has no per-field filtering; rejecting the combination beats
    // silently ignoring the filters.
    if request.all_collections
        && (request.document_id.is_some() || request.language.is_some() || request.tags.is_some())
    {
        return Err(AppError::BadRequest(
            "filters cannot be combined with all_collections".into(),
        ));
    }

    let hits = service
        .search(
            request.tenant_id,
            request.query,
            SearchFilterArgs {
                document_id: request.document_id,
                language: request.language,
                tags: request.tags,
            },
            request.limit,
            request.score_threshold,
            request.all_collections,
        )
        .await?;
    Ok(Json(SearchResponse { hits }))
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    tenant_id: Uuid,
    query: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    score_threshold: Option<f32>,
}

/// Retrieval-augmented question answering.
async fn ask<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<RagAnswer>, AppError>
where
    S: RagmillApi,
{
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".into()));
    }

    let answer = service
        .ask(AskParams {
            tenant_id: request.tenant_id,
            query: request.query,
            language: request.language,
            tags: request.tags,
            limit: request.limit,
            score_threshold: request.score_threshold,
        })
        .await;
    Ok(Json(answer))
}

/// Return pipeline counters for observability.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> impl IntoResponse
where
    S: RagmillApi,
{
    Json(service.metrics_snapshot())
}

enum AppError {
    BadRequest(String),
    Processing(ProcessingError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Processing(error) => {
                let status = match &error {
                    ProcessingError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
                    ProcessingError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, error.to_string()).into_response()
            }
        }
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}
