use std::time::Duration;

use moka::future::Cache;

/// In-process cache keyed by string with a fixed time-to-live and a bounded
/// entry count. A zero TTL disables it.
#[derive(Clone)]
pub struct TtlCache<V> {
    inner: Option<Cache<String, V>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build()
        });
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key.into(), value).await;
        }
    }
}
