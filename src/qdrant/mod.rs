//! Vector store adapter built on Qdrant's HTTP API.
//!
//! Collections are tenant-scoped (`tenant_{id}_{purpose}`), points carry the chunk
//! payload contract used by retrieval, and every operation returns a typed error so
//! callers can distinguish store failures from empty results.

mod client;
mod filters;
mod payload;
mod types;

pub use client::QdrantStore;
pub use filters::{build_search_filter, document_filter};
pub use payload::{DOCUMENTS_PURPOSE, collection_name, tenant_prefix};
pub use types::{ChunkPoint, ScoredPoint, SearchFilterArgs, VectorStoreError};
