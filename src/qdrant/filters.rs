//! Filter helpers for vector searches and point deletion.

use serde_json::{Value, json};
use uuid::Uuid;

use super::types::SearchFilterArgs;

/// Compose the standard Qdrant filter payload from optional search arguments.
pub fn build_search_filter(args: &SearchFilterArgs) -> Option<Value> {
    let mut must: Vec<Value> = Vec::new();

    if let Some(document_id) = args.document_id {
        must.push(json!({
            "key": "document_id",
            "match": { "value": document_id.to_string() }
        }));
    }

    if let Some(language) = args.language.as_ref().and_then(|value| non_empty(value)) {
        must.push(json!({
            "key": "language",
            "match": { "value": language }
        }));
    }

    if let Some(tags) = args.tags.as_ref() {
        let cleaned: Vec<String> = tags
            .iter()
            .filter_map(|tag| non_empty(tag).map(|value| value.to_string()))
            .collect();
        if !cleaned.is_empty() {
            must.push(json!({
                "key": "tags",
                "match": { "any": cleaned }
            }));
        }
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Filter matching every point belonging to the given document.
pub fn document_filter(document_id: Uuid) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id.to_string() }
            }
        ]
    })
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
