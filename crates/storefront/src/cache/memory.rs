//! In-memory backend built on `moka`.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

/// Expires each entry after its own TTL, restarting the clock on overwrite.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Process-local cache. Values are lost on restart and are not shared
/// between replicas.
///
/// Unbounded, since it holds refresh tokens when Redis is not configured:
/// entries leave only through their TTL or an explicit delete.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        let entries = Cache::builder().expire_after(PerEntryTtl).build();
        Self { entries }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.entries
            .insert(
                key.to_owned(),
                Entry {
                    value: value.to_owned(),
                    ttl,
                },
            )
            .await;
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).await.map(|entry| entry.value)
    }

    pub async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("short", "lived", Some(Duration::from_millis(50)))
            .await;
        cache.set("forever", "kept", None).await;
        assert_eq!(cache.get("short").await.as_deref(), Some("lived"));

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("forever").await.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", "first", Some(Duration::from_millis(50))).await;
        cache.set("k", "second", None).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_live_entries_are_never_evicted_for_space() {
        let cache = MemoryCache::new();
        assert_eq!(cache.entries.policy().max_capacity(), None);

        cache
            .set("refresh_token:1", "oldest", Some(Duration::from_secs(60)))
            .await;
        for i in 2..20_000 {
            cache
                .set(&format!("refresh_token:{i}"), "t", Some(Duration::from_secs(60)))
                .await;
        }
        cache.entries.run_pending_tasks().await;

        assert_eq!(cache.get("refresh_token:1").await.as_deref(), Some("oldest"));
    }
}
