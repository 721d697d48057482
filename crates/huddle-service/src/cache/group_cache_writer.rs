//! Post-commit cache refresh.
//!
//! A group snapshot is written under the key of every member. Each key is
//! retried on its own and may fail on its own; failures are logged and
//! counted but never reach the caller, since the store already committed.

use super::{CacheInterface, CacheKeys, DEFAULT_TTL};
use crate::dto::GroupSnapshot;
use crate::metrics::names;
use async_trait::async_trait;
use futures::future::join_all;
use huddle_core::Interface;
use huddle_resilience::RetryPolicy;
use metrics::counter;
use shaku::Component;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Keys written successfully.
    pub written: Vec<String>,
    /// Keys that still failed after every retry.
    pub failed: Vec<String>,
}

impl FanOutReport {
    /// True when every key was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Refreshes cached group state after a committed mutation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupCacheWriter: Interface + Send + Sync {
    /// Writes the snapshot under every member's key.
    async fn write_group(&self, snapshot: &GroupSnapshot) -> FanOutReport;

    /// Drops the summary cached for a token whose group no longer exists.
    async fn evict_token(&self, token: &str);
}

/// Fan-out writer with a bounded per-key retry.
#[derive(Component)]
#[shaku(interface = GroupCacheWriter)]
pub struct RetryingCacheWriter {
    #[shaku(inject)]
    cache: Arc<dyn CacheInterface>,
    keys: CacheKeys,
    #[shaku(default = DEFAULT_TTL)]
    ttl: Duration,
    retry: RetryPolicy,
}

impl RetryingCacheWriter {
    /// Creates a writer over `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheInterface>, keys: CacheKeys, ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            cache,
            keys,
            ttl,
            retry,
        }
    }

    async fn write_key(&self, key: String, json: &str) -> Result<String, String> {
        let outcome = self
            .retry
            .execute_counted(|| self.cache.set_raw(&key, json, self.ttl))
            .await;

        match outcome.result {
            Ok(()) => Ok(key),
            Err(e) => {
                warn!(
                    key = %key,
                    attempts = outcome.attempts,
                    error = %e,
                    "Cache refresh failed; entry stays stale until TTL expiry"
                );
                counter!(names::CACHE_FANOUT_FAILURES_TOTAL).increment(1);
                Err(key)
            }
        }
    }
}

#[async_trait]
impl GroupCacheWriter for RetryingCacheWriter {
    async fn write_group(&self, snapshot: &GroupSnapshot) -> FanOutReport {
        if !self.cache.is_enabled() {
            return FanOutReport::default();
        }

        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(group_id = %snapshot.id, error = %e, "Failed to serialize group snapshot");
                return FanOutReport {
                    written: Vec::new(),
                    failed: snapshot
                        .members
                        .iter()
                        .map(|m| self.keys.group_by_user(m.id))
                        .collect(),
                };
            }
        };

        let writes = snapshot
            .members
            .iter()
            .map(|member| self.write_key(self.keys.group_by_user(member.id), &json));

        let mut report = FanOutReport::default();
        for result in join_all(writes).await {
            match result {
                Ok(key) => report.written.push(key),
                Err(key) => report.failed.push(key),
            }
        }

        debug!(
            group_id = %snapshot.id,
            member_count = snapshot.members.len(),
            failed = report.failed.len(),
            "Refreshed group cache"
        );
        report
    }

    async fn evict_token(&self, token: &str) {
        let key = self.keys.group_by_token(token);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "Failed to evict token cache entry");
            counter!(names::CACHE_FANOUT_FAILURES_TOTAL).increment(1);
        }
    }
}

impl std::fmt::Debug for RetryingCacheWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingCacheWriter")
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
