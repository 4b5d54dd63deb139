//! TTL memoization for expensive provider calls.
//!
//! Answers, summaries, and tag extractions are keyed by a deterministic hash of their
//! semantically relevant inputs and held for a fixed window per operation kind. Failed
//! provider calls are never inserted, so a subsequent request retries instead of
//! replaying the failure.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Retention window for context-augmented responses.
pub const CONTEXT_RESPONSE_TTL: Duration = Duration::from_secs(15 * 60);
/// Retention window for summaries and extracted tags.
pub const SUMMARY_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Standard truncated key length.
pub const KEY_LEN: usize = 16;
/// Short key variant used where keys are embedded into other identifiers.
pub const KEY_LEN_SHORT: usize = 8;

/// Derive a cache key from the semantically relevant input parts.
///
/// Parts are joined with `|`, hashed with SHA-256, base64-encoded, and truncated to
/// `len` characters. Short keys bound key size at the cost of a negligible collision
/// risk.
pub fn cache_key(parts: &[&str], len: usize) -> String {
    let joined = parts.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    let mut encoded = STANDARD.encode(digest);
    encoded.truncate(len);
    encoded
}

struct CacheEntry<V> {
    value: V,
    inserted: Instant,
    ttl: Duration,
}

/// In-memory get-or-compute cache with per-entry time-to-live.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry, dropping it if its TTL has elapsed.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < entry.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a successful result under the given key.
    pub async fn insert(&self, key: String, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of live and expired entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
