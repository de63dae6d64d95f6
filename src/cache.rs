//! Time-boxed cache for page responses.
//!
//! Deduplicates identical queries hitting the provider within a short
//! TTL window. Keys are an order-independent fingerprint of the full
//! query-parameter set; values are the already-serialized response.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

/// In-memory query cache with per-entry TTL.
///
/// Shared across request handlers behind an `Arc`; last write wins on a
/// given fingerprint. Expired entries are evicted lazily on `get` and
/// in the per-request [`QueryCache::clear_expired`] sweep — there is no
/// background task.
pub struct QueryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Deterministic digest of a query-parameter set.
    ///
    /// The map is ordered, so equivalent parameter sets fingerprint
    /// identically regardless of how the caller assembled them.
    pub fn fingerprint(params: &BTreeMap<String, String>) -> String {
        let canonical = serde_json::to_string(params).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }

    /// Look up a cached response, evicting it if it turned stale.
    pub async fn get(&self, params: &BTreeMap<String, String>) -> Option<Value> {
        let key = Self::fingerprint(params);
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {} // stale, fall through to evict
                None => return None,
            }
        }
        self.entries.write().await.remove(&key);
        None
    }

    /// Store a response under the parameter fingerprint, replacing any
    /// previous entry.
    pub async fn set(&self, params: &BTreeMap<String, String>, value: Value) {
        let key = Self::fingerprint(params);
        self.entries.write().await.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Evict every entry older than the TTL; returns how many went.
    ///
    /// Runs once per incoming request as routine maintenance.
    pub async fn clear_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    /// Current entry count, for observability only.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("page".to_string(), "1".to_string());
        a.insert("from".to_string(), "+111".to_string());

        let mut b = BTreeMap::new();
        b.insert("from".to_string(), "+111".to_string());
        b.insert("page".to_string(), "1".to_string());

        assert_eq!(QueryCache::fingerprint(&a), QueryCache::fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_any_value() {
        let a = params(&[("page", "1"), ("from", "+111")]);
        let b = params(&[("page", "2"), ("from", "+111")]);
        let c = params(&[("page", "1")]);
        assert_ne!(QueryCache::fingerprint(&a), QueryCache::fingerprint(&b));
        assert_ne!(QueryCache::fingerprint(&a), QueryCache::fingerprint(&c));
    }

    #[tokio::test]
    async fn get_returns_exact_stored_value_within_ttl() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = params(&[("page", "1")]);
        let value = serde_json::json!({"total": 5});
        cache.set(&key, value.clone()).await;
        assert_eq!(cache.get(&key).await, Some(value));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn stale_entry_is_evicted_on_get() {
        let cache = QueryCache::new(Duration::ZERO);
        let key = params(&[("page", "1")]);
        cache.set(&key, serde_json::json!({})).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn set_overwrites_prior_entry() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = params(&[("page", "1")]);
        cache.set(&key, serde_json::json!({"total": 1})).await;
        cache.set(&key, serde_json::json!({"total": 2})).await;
        assert_eq!(cache.get(&key).await, Some(serde_json::json!({"total": 2})));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn clear_expired_counts_only_stale_entries() {
        let cache = QueryCache::new(Duration::ZERO);
        cache.set(&params(&[("page", "1")]), serde_json::json!({})).await;
        cache.set(&params(&[("page", "2")]), serde_json::json!({})).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.clear_expired().await, 2);
        assert!(cache.is_empty().await);

        let fresh = QueryCache::new(Duration::from_secs(60));
        fresh.set(&params(&[("page", "1")]), serde_json::json!({})).await;
        assert_eq!(fresh.clear_expired().await, 0);
        assert_eq!(fresh.len().await, 1);
    }
}
