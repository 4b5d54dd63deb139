//! Helpers for constructing point payloads and tenant collection names.

use crate::qdrant::types::ChunkPoint;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Purpose suffix used for knowledge-base document collections.
pub const DOCUMENTS_PURPOSE: &str = "documents";

/// Canonical collection name for a tenant and purpose: `tenant_{id}_{purpose}`.
///
/// The tenant id is rendered without hyphens; this convention is compatibility-sensitive
/// and shared with every other consumer of the store.
pub fn collection_name(tenant_id: Uuid, purpose: &str) -> String {
    format!("tenant_{}_{purpose}", tenant_id.simple())
}

/// Collection-name prefix owned by a tenant, used to scope fan-out searches.
pub fn tenant_prefix(tenant_id: Uuid) -> String {
    format!("tenant_{}_", tenant_id.simple())
}

/// Build the payload object stored alongside each indexed chunk.
///
/// The well-known keys (`content`, `document_id`, `document_title`, `chunk_index`,
/// `language`, `indexed_at`) always win over caller metadata of the same name.
pub(crate) fn build_payload(point: &ChunkPoint, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    for (key, value) in &point.metadata {
        payload.insert(key.clone(), value.clone());
    }

    payload.insert("content".into(), Value::String(point.content.clone()));
    payload.insert(
        "document_id".into(),
        Value::String(point.document_id.to_string()),
    );
    payload.insert(
        "document_title".into(),
        Value::String(point.document_title.clone()),
    );
    payload.insert("chunk_index".into(), Value::from(point.chunk_index));
    payload.insert("language".into(), Value::String(point.language.clone()));
    payload.insert(
        "indexed_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );

    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
