//! Redis-based cache implementation.

use super::CacheInterface;
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use huddle_config::RedisConfig;
use huddle_core::{HuddleError, HuddleResult};
use shaku::Component;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default TTL for cached group snapshots (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Redis-based cache service.
#[derive(Component)]
#[shaku(interface = CacheInterface)]
pub struct RedisCacheService {
    /// Redis connection pool. `None` disables the cache.
    pool: Option<Arc<Pool>>,
}

impl RedisCacheService {
    /// Create a new Redis cache service.
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Create a no-op cache service that always misses.
    #[must_use]
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    /// Returns the connection pool, if the cache is enabled.
    #[must_use]
    pub fn pool(&self) -> Option<Arc<Pool>> {
        self.pool.clone()
    }

    /// Builds a pool from configuration and verifies it with a PING.
    pub async fn connect(config: &RedisConfig) -> HuddleResult<Self> {
        info!("Creating Redis connection pool for the group cache...");

        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| HuddleError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(config.pool_size as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| HuddleError::Configuration(format!("Failed to create Redis pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| HuddleError::Cache(format!("Failed to get Redis connection: {}", e)))?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| HuddleError::Cache(format!("Redis PING failed: {}", e)))?;

        info!("Redis connection pool created successfully");
        Ok(Self::new(Arc::new(pool)))
    }

    async fn get_conn(&self) -> HuddleResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool
                .get()
                .await
                .map_err(|e| HuddleError::Cache(format!("Failed to get Redis connection: {}", e))),
            None => Err(HuddleError::Cache("Cache is disabled".to_string())),
        }
    }
}

#[async_trait]
impl CacheInterface for RedisCacheService {
    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get_raw(&self, key: &str) -> HuddleResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| HuddleError::Cache(format!("Failed to get key '{}': {}", key, e)))?;

        match &value {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> HuddleResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| HuddleError::Cache(format!("Failed to set key '{}': {}", key, e)))?;

        debug!("Cached key '{}' with TTL {}s", key, ttl_secs);
        Ok(())
    }

    async fn delete(&self, key: &str) -> HuddleResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| HuddleError::Cache(format!("Failed to delete key '{}': {}", key, e)))?;

        debug!("Deleted key '{}': {}", key, deleted > 0);
        Ok(deleted > 0)
    }
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
