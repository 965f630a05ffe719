//! # Tool Result Cache
//!
//! Shared TTL cache for tool results. Keys are independent, so the map is
//! split into shards with their own lock instead of one global lock.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

const SHARD_COUNT: usize = 16;
const PURGE_EVERY: usize = 256;

/// Deterministic cache key for a (tool, arguments) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash the tool name together with the canonical JSON form of the args.
    ///
    /// `serde_json::Map` keeps keys sorted, so equal argument sets always
    /// serialize identically.
    pub fn new(tool: &str, args: &Value) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tool.as_bytes());
        hasher.update(b"\0");
        hasher.update(args.to_string().as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn shard(&self) -> usize {
        usize::from_str_radix(&self.0[..2], 16).unwrap_or(0) % SHARD_COUNT
    }
}

/// A cached payload
#[derive(Debug, Clone)]
struct CachedResult {
    payload: Value,
    created_at: Instant,
}

/// Sharded TTL cache
pub struct ToolCache {
    shards: Vec<RwLock<HashMap<CacheKey, CachedResult>>>,
    ttl: Duration,
    inserts: AtomicUsize,
}

impl ToolCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            ttl,
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry. An expired entry is removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let lock = &self.shards[key.shard()];
        {
            let shard = lock.read().ok()?;
            let entry = shard.get(key)?;
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.payload.clone());
            }
        }
        if let Ok(mut shard) = lock.write() {
            // Another caller may have refreshed it meanwhile
            if let Some(entry) = shard.get(key) {
                if entry.created_at.elapsed() < self.ttl {
                    return Some(entry.payload.clone());
                }
                shard.remove(key);
            }
        }
        None
    }

    /// Store a payload. Overwriting an existing key is harmless: equal keys
    /// carry equivalent payloads. Every `PURGE_EVERY` inserts the whole
    /// cache is swept for entries nobody reads anymore.
    pub fn insert(&self, key: CacheKey, payload: Value) {
        if let Ok(mut shard) = self.shards[key.shard()].write() {
            shard.insert(
                key,
                CachedResult {
                    payload,
                    created_at: Instant::now(),
                },
            );
        }
        if self.inserts.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let removed = self.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "purged expired tool results");
            }
        }
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            if let Ok(mut shard) = shard.write() {
                let before = shard.len();
                shard.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
                removed += before - shard.len();
            }
        }
        removed
    }

    /// Number of stored entries (including not-yet-purged expired ones)
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|s| s.read().ok().map(|s| s.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_argument_order() {
        let a: Value = serde_json::from_str(r#"{"url":"https://a.io","instructions":"x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"instructions":"x","url":"https://a.io"}"#).unwrap();
        assert_eq!(CacheKey::new("fetch_page", &a), CacheKey::new("fetch_page", &b));
        assert_ne!(CacheKey::new("fetch_page", &a), CacheKey::new("web_search", &a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = ToolCache::new(Duration::from_secs(60));
        let key = CacheKey::new("web_search", &json!({"queries": ["acme"]}));
        cache.insert(key.clone(), json!({"hits": []}));

        assert!(cache.get(&key).is_some());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key).is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());

        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_reclaimed() {
        let cache = ToolCache::new(Duration::from_secs(60));
        let keys: Vec<CacheKey> = (0..100)
            .map(|i| CacheKey::new("web_search", &json!({"queries": [format!("acme {}", i)]})))
            .collect();
        for key in &keys {
            cache.insert(key.clone(), json!({"hits": []}));
        }
        assert_eq!(cache.len(), 100);

        tokio::time::advance(Duration::from_secs(120)).await;
        for key in keys.iter().take(40) {
            assert!(cache.get(key).is_none());
        }
        assert_eq!(cache.len(), 60);

        assert_eq!(cache.purge_expired(), 60);
        cache.insert(CacheKey::new("web_search", &json!({"queries": ["fresh"]})), json!({"hits": []}));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inserts_sweep_unread_expired_entries() {
        let cache = ToolCache::new(Duration::from_secs(60));
        for i in 0..PURGE_EVERY - 1 {
            cache.insert(CacheKey::new("fetch_page", &json!({"url": format!("https://a.io/{}", i)})), json!({}));
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        // This insert completes a sweep interval
        cache.insert(CacheKey::new("fetch_page", &json!({"url": "https://b.io"})), json!({}));
        assert_eq!(cache.len(), 1);
    }
}
