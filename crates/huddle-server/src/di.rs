//! Dependency injection modules using Shaku.
//!
//! - `PostgresModule`: Postgres storage with the Redis cache
//! - `InMemoryModule`: process-local storage and cache, for development

use huddle_config::AppConfig;
use huddle_core::HuddleResult;
use huddle_repository::{
    DatabasePool, DatabasePoolInterface, DatabasePoolParameters, InMemoryGroupRepository, PgGroupRepository,
};
use huddle_resilience::RetryPolicy;
use huddle_service::{
    CacheKeys, GroupPolicy, GroupServiceImpl, GroupServiceImplParameters, MemoryCacheService, RedisCacheService,
    RedisCacheServiceParameters, RetryingCacheWriter, RetryingCacheWriterParameters, Sha256TokenGenerator,
};
use shaku::module;
use std::sync::Arc;
use tracing::{info, warn};

module! {
    pub PostgresModule {
        components = [
            DatabasePool,
            PgGroupRepository,
            RedisCacheService,
            RetryingCacheWriter,
            Sha256TokenGenerator,
            GroupServiceImpl,
        ],
        providers = [],
    }
}

module! {
    pub InMemoryModule {
        components = [
            InMemoryGroupRepository,
            MemoryCacheService,
            RetryingCacheWriter,
            Sha256TokenGenerator,
            GroupServiceImpl,
        ],
        providers = [],
    }
}

/// Builds the Postgres-backed module.
///
/// Redis is optional: when it is disabled or unreachable at startup the
/// cache runs in always-miss mode and every read goes to the store.
pub async fn build_postgres_module(config: &AppConfig) -> HuddleResult<Arc<PostgresModule>> {
    let db_pool = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        db_pool.run_migrations().await?;
    }

    let cache = if config.redis.enabled {
        match RedisCacheService::connect(&config.redis).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Redis unavailable, group cache disabled: {}", e);
                RedisCacheService::disabled()
            }
        }
    } else {
        info!("Redis disabled by configuration");
        RedisCacheService::disabled()
    };

    let module = PostgresModule::builder()
        .with_component_parameters::<DatabasePool>(DatabasePoolParameters {
            pool: db_pool.inner().clone(),
        })
        .with_component_parameters::<RedisCacheService>(RedisCacheServiceParameters { pool: cache.pool() })
        .with_component_parameters::<RetryingCacheWriter>(cache_writer_parameters(config))
        .with_component_parameters::<GroupServiceImpl>(group_service_parameters(config))
        .build();

    Ok(Arc::new(module))
}

/// Builds the process-local module. The store starts empty.
pub fn build_memory_module(config: &AppConfig) -> Arc<InMemoryModule> {
    warn!("Using the in-memory backend; state is lost on restart");

    let module = InMemoryModule::builder()
        .with_component_parameters::<RetryingCacheWriter>(cache_writer_parameters(config))
        .with_component_parameters::<GroupServiceImpl>(group_service_parameters(config))
        .build();

    Arc::new(module)
}

fn cache_keys(config: &AppConfig) -> CacheKeys {
    CacheKeys::new(config.group.cache_prefix.clone())
}

fn cache_writer_parameters(config: &AppConfig) -> RetryingCacheWriterParameters {
    RetryingCacheWriterParameters {
        keys: cache_keys(config),
        ttl: config.group.cache_ttl(),
        retry: RetryPolicy::with_max_attempts(config.group.cache_write_attempts)
            .initial_delay(config.group.cache_retry_delay()),
    }
}

fn group_service_parameters(config: &AppConfig) -> GroupServiceImplParameters {
    GroupServiceImplParameters {
        policy: GroupPolicy::from(&config.group),
        keys: cache_keys(config),
    }
}
