//! Redis backend.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use secrecy::ExposeSecret;
use tokio::time::timeout;

use super::CacheError;
use crate::config::RedisConfig;

/// Redis-backed cache. Clones share one multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCache {
    /// Open a managed connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.expose_secret())
            .map_err(|e| CacheError::Connection(format!("Redis client error: {e}")))?;

        let connection = timeout(config.command_timeout, client.get_connection_manager())
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e| CacheError::Connection(format!("Redis connection error: {e}")))?;

        tracing::info!("Connected to Redis session cache");
        Ok(Self {
            connection,
            command_timeout: config.command_timeout,
        })
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        timeout(self.command_timeout, async {
            match ttl {
                // SET EX takes whole seconds and rejects zero
                Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(|e: RedisError| CacheError::Command(format!("Redis SET error: {e}")))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();

        timeout(self.command_timeout, async { conn.get(key).await })
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e: RedisError| CacheError::Command(format!("Redis GET error: {e}")))
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        timeout(self.command_timeout, async { conn.del::<_, ()>(key).await })
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e: RedisError| CacheError::Command(format!("Redis DEL error: {e}")))
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        let _pong: String = timeout(self.command_timeout, async {
            redis::cmd("PING").query_async(&mut conn).await
        })
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(|e: RedisError| CacheError::Command(format!("Redis PING error: {e}")))?;
        Ok(())
    }
}
