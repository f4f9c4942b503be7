use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// TTL-bounded memo cache for provider results (geocodes, tokens).
///
/// Entries are inserted whole under the write lock, so a concurrent reader
/// never observes a half-initialized value.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    inner: Arc<RwLock<HashMap<K, (V, Instant)>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.read().await;
        guard
            .get(key)
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.write().await;
        // Opportunistic sweep keeps the map from accumulating dead entries.
        guard.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        guard.insert(key, (value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), 42u32).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(42));
    }

    #[tokio::test]
    async fn expired_entry_misses() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("k".to_string(), 1u32).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }
}
