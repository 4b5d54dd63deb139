//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::{
    filters::document_filter,
    payload::{build_payload, current_timestamp_rfc3339, tenant_prefix},
    types::{
        ChunkPoint, ListCollectionsResponse, QueryResponse, QueryResponseResult, ScoredPoint,
        ScrollResponse, VectorStoreError,
    },
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Lightweight HTTP client for vector store operations.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantStore {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, VectorStoreError> {
        let config = get_config();
        let client = Client::builder().user_agent("ragmill/0.3").build()?;

        let base_url =
            normalize_base_url(&config.qdrant_url).map_err(VectorStoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size and cosine distance.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let response = self.request(Method::GET, "collections")?.send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            let names = payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect();
            Ok(names)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Upsert chunk vectors into the given collection, one point per chunk.
    ///
    /// Point ids are chunk ids, so re-upserting a chunk replaces its previous point.
    pub async fn upsert_chunks(
        &self,
        collection_name: &str,
        points: Vec<ChunkPoint>,
    ) -> Result<usize, VectorStoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = points
            .iter()
            .map(|point| {
                json!({
                    "id": point.chunk_id.to_string(),
                    "vector": point.vector,
                    "payload": build_payload(point, &now),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Chunk points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Remove every point belonging to the given document.
    ///
    /// Bulk filter deletion is attempted first; if the store rejects it, the adapter
    /// falls back to enumerating the document's point ids and deleting them one by one,
    /// logging individual failures without aborting.
    pub async fn delete_document(
        &self,
        collection_name: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        let filter = document_filter(document_id);
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(
                collection = collection_name,
                document_id = %document_id,
                "Document points deleted"
            );
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            collection = collection_name,
            document_id = %document_id,
            %status,
            body = %body,
            "Bulk delete rejected; falling back to per-point deletion"
        );

        let point_ids = self
            .scroll_point_ids(collection_name, Some(document_filter(document_id)))
            .await?;
        for point_id in point_ids {
            if let Err(error) = self.delete_point(collection_name, &point_id).await {
                tracing::warn!(
                    collection = collection_name,
                    point_id = %point_id,
                    error = %error,
                    "Failed to delete point; continuing"
                );
            }
        }
        Ok(())
    }

    async fn delete_point(
        &self,
        collection_name: &str,
        point_id: &str,
    ) -> Result<(), VectorStoreError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": [point_id] }))
            .send()
            .await?;

        self.ensure_success(response, || {}).await
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
        filter: Option<Value>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        let obj = body
            .as_object_mut()
            .expect("query body should remain an object");

        if let Some(threshold) = score_threshold {
            obj.insert("score_threshold".into(), Value::from(threshold));
        }

        if let Some(filter_value) = filter {
            obj.insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points, .. } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    /// Fan a search out across every collection owned by the tenant, merging results
    /// by score descending and truncating to `limit`.
    pub async fn search_across_collections(
        &self,
        tenant_id: Uuid,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let prefix = tenant_prefix(tenant_id);
        let collections: Vec<String> = self
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect();

        let mut merged = Vec::new();
        for collection in &collections {
            let hits = self
                .search_points(collection, vector.clone(), limit, score_threshold, None)
                .await?;
            merged.extend(hits);
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(limit);
        tracing::debug!(
            tenant_id = %tenant_id,
            collections = collections.len(),
            hits = merged.len(),
            "Cross-collection search merged"
        );
        Ok(merged)
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, VectorStoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, VectorStoreError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorStoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }

    /// Enumerate point ids matching a filter, following scroll pagination.
    async fn scroll_point_ids(
        &self,
        collection: &str,
        filter: Option<Value>,
    ) -> Result<Vec<String>, VectorStoreError> {
        let mut offset: Option<Value> = None;
        let mut ids = Vec::new();
        let filter_body = filter.unwrap_or_else(|| json!({ "must": [] }));

        loop {
            let mut body = json!({
                "with_payload": false,
                "with_vector": false,
                "limit": 512,
                "offset": offset.clone().unwrap_or(Value::Null),
                "filter": filter_body.clone(),
            });

            if offset.is_none() {
                body.as_object_mut()
                    .expect("scroll body should remain an object")
                    .remove("offset");
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{collection}/points/scroll"),
                )?
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Failed to scroll point ids");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let Some(id) = point.id {
                    ids.push(stringify_point_id(id));
                }
            }

            match result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
