//! Shared harness for group service scenario tests.
//!
//! Everything runs against the in-memory repository and cache so tests can
//! inspect the store and the cache directly.

#![allow(dead_code)]

use async_trait::async_trait;
use huddle_core::{Group, GroupId, HuddleError, HuddleResult, User, UserId};
use huddle_repository::{GroupRepository, GroupTransaction, InMemoryGroupRepository};
use huddle_resilience::RetryPolicy;
use huddle_service::{
    CacheExt, CacheInterface, CacheKeys, GroupPolicy, GroupServiceImpl, GroupSnapshot, MemoryCacheService,
    RetryingCacheWriter, Sha256TokenGenerator,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub repo: Arc<InMemoryGroupRepository>,
    pub cache: Arc<MemoryCacheService>,
    pub service: Arc<GroupServiceImpl>,
    pub keys: CacheKeys,
}

impl Harness {
    pub fn new(capacity: usize) -> Self {
        let repo = Arc::new(InMemoryGroupRepository::new());
        let cache = Arc::new(MemoryCacheService::new());
        let service = build_service(repo.clone(), cache.clone(), capacity);
        Self {
            repo,
            cache,
            service: Arc::new(service),
            keys: CacheKeys::default(),
        }
    }

    /// Provisions users the way the user directory would.
    pub async fn users(&self, names: &[&str]) -> Vec<UserId> {
        let mut ids = Vec::new();
        for name in names {
            let user = User::new(*name, "Tester", format!("https://img/{name}.png"));
            ids.push(user.id);
            self.repo.insert_user(user).await;
        }
        ids
    }

    pub async fn cached_group(&self, user_id: UserId) -> Option<GroupSnapshot> {
        self.cache.get(&self.keys.group_by_user(user_id)).await.unwrap()
    }

    pub async fn stored_group(&self, user_id: UserId) -> Group {
        self.repo.find_by_user(user_id).await.unwrap().expect("user has no group")
    }

    /// Checks every membership invariant over the whole store.
    pub async fn assert_invariants(&self, capacity: usize) {
        for user in self.repo.users().await {
            let group_id = user.group_id.expect("user without a group");
            let group = self.stored_group(user.id).await;
            assert_eq!(group.id, group_id);
        }
        for group in self.repo.groups().await {
            group.check_integrity(capacity).unwrap();
        }
    }
}

pub fn build_service(
    repo: Arc<dyn GroupRepository>,
    cache: Arc<dyn CacheInterface>,
    capacity: usize,
) -> GroupServiceImpl {
    let keys = CacheKeys::default();
    let writer = RetryingCacheWriter::new(
        cache.clone(),
        keys.clone(),
        Duration::from_secs(3600),
        RetryPolicy::immediate(3),
    );
    GroupServiceImpl::new(
        repo,
        cache,
        Arc::new(writer),
        Arc::new(Sha256TokenGenerator),
        GroupPolicy::with_capacity(capacity),
        keys,
    )
}

/// Store call that [`FailingRepository`] refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `reassign_user` inside a unit of work, after any group insert in the
    /// same unit of work already succeeded.
    Reassign,
    /// `update_confirmation` inside a unit of work.
    Confirm,
    /// Pool-level `find_by_token`. Units of work are unaffected.
    TokenRead,
}

/// In-memory repository with one store call forced to fail.
pub struct FailingRepository {
    pub inner: Arc<InMemoryGroupRepository>,
    pub fault: Fault,
}

impl FailingRepository {
    pub fn new(inner: Arc<InMemoryGroupRepository>, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

fn injected() -> HuddleError {
    HuddleError::Database("injected failure".to_string())
}

#[async_trait]
impl GroupRepository for FailingRepository {
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<Option<Group>> {
        self.inner.find_by_user(user_id).await
    }

    async fn find_by_token(&self, token: &str) -> HuddleResult<Option<Group>> {
        if self.fault == Fault::TokenRead {
            return Err(injected());
        }
        self.inner.find_by_token(token).await
    }

    async fn find_user(&self, user_id: UserId) -> HuddleResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn begin(&self) -> HuddleResult<Box<dyn GroupTransaction>> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            fault: self.fault,
        }))
    }
}

struct FailingTransaction {
    inner: Box<dyn GroupTransaction>,
    fault: Fault,
}

#[async_trait]
impl GroupTransaction for FailingTransaction {
    async fn lock_users(&mut self, ids: &[UserId]) -> HuddleResult<Vec<User>> {
        self.inner.lock_users(ids).await
    }

    async fn lock_groups(&mut self, ids: &[GroupId]) -> HuddleResult<Vec<Group>> {
        self.inner.lock_groups(ids).await
    }

    async fn group_id_by_token(&mut self, token: &str) -> HuddleResult<Option<GroupId>> {
        self.inner.group_id_by_token(token).await
    }

    async fn create_group(&mut self, leader_id: UserId, token: &str) -> HuddleResult<Group> {
        self.inner.create_group(leader_id, token).await
    }

    async fn reassign_user(&mut self, user_id: UserId, group_id: GroupId) -> HuddleResult<()> {
        if self.fault == Fault::Reassign {
            return Err(injected());
        }
        self.inner.reassign_user(user_id, group_id).await
    }

    async fn delete_group(&mut self, group_id: GroupId) -> HuddleResult<()> {
        self.inner.delete_group(group_id).await
    }

    async fn update_confirmation(&mut self, group_id: GroupId, confirmed: bool) -> HuddleResult<()> {
        if self.fault == Fault::Confirm {
            return Err(injected());
        }
        self.inner.update_confirmation(group_id, confirmed).await
    }

    async fn commit(self: Box<Self>) -> HuddleResult<()> {
        self.inner.commit().await
    }
}

/// Cache that refuses writes to one key and behaves normally otherwise.
pub struct PoisonedKeyCache {
    pub inner: Arc<MemoryCacheService>,
    pub poisoned: String,
}

#[async_trait]
impl CacheInterface for PoisonedKeyCache {
    async fn get_raw(&self, key: &str) -> HuddleResult<Option<String>> {
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> HuddleResult<()> {
        if key == self.poisoned {
            return Err(HuddleError::Cache(format!("write to '{}' refused", key)));
        }
        self.inner.set_raw(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> HuddleResult<bool> {
        self.inner.delete(key).await
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
