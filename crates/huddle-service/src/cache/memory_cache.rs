//! Process-local cache with per-entry expiry.

use super::CacheInterface;
use async_trait::async_trait;
use huddle_core::HuddleResult;
use parking_lot::RwLock;
use shaku::Component;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory cache service.
///
/// Expired entries are dropped lazily on access.
#[derive(Component, Default)]
#[shaku(interface = CacheInterface)]
pub struct MemoryCacheService {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCacheService {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.is_live(now)).count()
    }

    /// Returns true when no live entry remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheInterface for MemoryCacheService {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> HuddleResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }

        debug!("Evicting expired key '{}'", key);
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> HuddleResult<()> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write();
        // expired keys are dropped here as well as on read
        entries.retain(|_, e| e.is_live(now));
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> HuddleResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }
}

impl std::fmt::Debug for MemoryCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheService")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
