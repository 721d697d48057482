//! Caching infrastructure for the service layer.
//!
//! Group snapshots are cached under one key per member and one key per
//! invite token. The store stays the source of truth; the cache is written
//! through after every committed mutation and read through on a miss.

mod cache_interface;
pub mod cache_keys;
mod group_cache_writer;
mod memory_cache;
mod redis_cache;

pub use cache_interface::{CacheExt, CacheInterface};
pub use cache_keys::CacheKeys;
pub use group_cache_writer::{
    FanOutReport, GroupCacheWriter, RetryingCacheWriter, RetryingCacheWriterParameters,
};
pub use memory_cache::{MemoryCacheService, MemoryCacheServiceParameters};
pub use redis_cache::{RedisCacheService, RedisCacheServiceParameters, DEFAULT_TTL};

#[cfg(test)]
pub use cache_interface::MockCacheInterface;
#[cfg(test)]
pub use group_cache_writer::MockGroupCacheWriter;
