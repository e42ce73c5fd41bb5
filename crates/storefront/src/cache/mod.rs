//! Session cache: string values with an optional per-key TTL.
//!
//! Two backends share one interface:
//!
//! - [`RedisCache`] for deployments, so every replica sees the same refresh
//!   tokens and invalidations.
//! - [`MemoryCache`] (`moka`) for tests and single-node development.
//!
//! The backend is chosen at startup from `REDIS_URL`.

use std::time::Duration;

use thiserror::Error;

mod memory;
mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use crate::config::RedisConfig;

/// Errors from the session cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not connect to the backend.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// A command failed.
    #[error("cache command error: {0}")]
    Command(String),

    /// A command did not finish within the configured timeout.
    #[error("cache command timed out")]
    Timeout,

    /// A cached value could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value cache with per-key TTL.
#[derive(Clone)]
pub enum KeyValueCache {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl KeyValueCache {
    /// Connect to Redis when configured, otherwise use an in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if Redis is configured but unreachable.
    pub async fn from_config(config: Option<&RedisConfig>) -> Result<Self, CacheError> {
        match config {
            Some(redis) => Ok(Self::Redis(RedisCache::connect(redis).await?)),
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory session cache");
                Ok(Self::Memory(MemoryCache::new()))
            }
        }
    }

    /// In-memory cache.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryCache::new())
    }

    /// Store `value` under `key`, replacing any previous value. `None` keeps
    /// the key until it is deleted.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend command fails.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.set(key, value, ttl).await,
            Self::Memory(cache) => {
                cache.set(key, value, ttl).await;
                Ok(())
            }
        }
    }

    /// Read the value under `key`, if present and unexpired.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend command fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            Self::Redis(cache) => cache.get(key).await,
            Self::Memory(cache) => Ok(cache.get(key).await),
        }
    }

    /// Remove `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend command fails.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.delete(key).await,
            Self::Memory(cache) => {
                cache.delete(key).await;
                Ok(())
            }
        }
    }

    /// Store a value as JSON.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the backend command fails.
    pub async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded, ttl).await
    }

    /// Read a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if decoding or the backend command fails.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        self.get(key)
            .await?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(CacheError::from)
    }

    /// Round-trip check used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend is unreachable.
    pub async fn ping(&self) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = KeyValueCache::memory();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.set("k", "v2", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        // deleting again is fine
        cache.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_json_values() {
        let cache = KeyValueCache::memory();
        cache.set_json("list", &vec![1, 2, 3], None).await.unwrap();
        let list: Option<Vec<i32>> = cache.get_json("list").await.unwrap();
        assert_eq!(list, Some(vec![1, 2, 3]));

        cache.set("bad", "not json", None).await.unwrap();
        let bad: Result<Option<Vec<i32>>, _> = cache.get_json("bad").await;
        assert!(matches!(bad, Err(CacheError::Serialization(_))));
    }
}
