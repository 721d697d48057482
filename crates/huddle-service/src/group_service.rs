//! Group service trait definition.

use crate::dto::{GroupSnapshot, GroupSummary};
use async_trait::async_trait;
use huddle_config::GroupConfig;
use huddle_core::{HuddleResult, Interface, UserId};
use std::time::Duration;

/// Coordinates group membership.
///
/// Every mutation re-checks its preconditions on row-locked data inside one
/// transaction, then refreshes the cache for every member of every group it
/// touched.
///
/// An `Internal` error raised while reloading groups after the commit does
/// not mean the change was rolled back; callers should re-read the group.
#[async_trait]
pub trait GroupService: Interface + Send + Sync {
    /// Returns the caller's group, creating a singleton group on first use.
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<GroupSnapshot>;

    /// Returns the public summary of the group behind an invite token.
    async fn find_by_token(&self, token: &str) -> HuddleResult<GroupSummary>;

    /// Locks or unlocks the leader's group.
    async fn update_confirm(&self, leader_id: UserId, is_confirmed: bool) -> HuddleResult<GroupSnapshot>;

    /// Moves a member out of the leader's group into a new singleton group.
    /// Returns the leader's group.
    async fn delete_member(&self, leader_id: UserId, target_user_id: UserId) -> HuddleResult<GroupSnapshot>;

    /// Moves a non-leader into a new singleton group. Returns the new group.
    async fn leave(&self, user_id: UserId) -> HuddleResult<GroupSnapshot>;

    /// Moves the user into the group behind `token`. Returns that group.
    async fn join(&self, user_id: UserId, token: &str) -> HuddleResult<GroupSnapshot>;
}

/// Limits and timings the coordinator enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPolicy {
    /// Maximum members per group.
    pub capacity: usize,
    /// TTL of every cache entry.
    pub cache_ttl: Duration,
    /// Deadline for one unit of work.
    pub transaction_timeout: Duration,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self::from(&GroupConfig::default())
    }
}

impl From<&GroupConfig> for GroupPolicy {
    fn from(config: &GroupConfig) -> Self {
        Self {
            capacity: config.capacity,
            cache_ttl: config.cache_ttl(),
            transaction_timeout: config.transaction_timeout(),
        }
    }
}

impl GroupPolicy {
    /// Policy with the given capacity and default timings.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}
