//! In-memory group repository.
//!
//! A transaction holds the store's mutex for its whole lifetime and works on a
//! private copy; commit publishes the copy, drop discards it. That makes every
//! unit of work serializable, which stands in for row locks.

use crate::{GroupRepository, GroupTransaction};
use async_trait::async_trait;
use chrono::Utc;
use huddle_core::{Group, GroupId, HuddleError, HuddleResult, User, UserId};
use shaku::Component;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Rows held by the in-memory backend. Groups are stored without members.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
}

impl MemoryStore {
    fn members_of(&self, group_id: GroupId) -> Vec<User> {
        self.users
            .values()
            .filter(|u| u.is_in(group_id))
            .cloned()
            .collect()
    }

    fn load(&self, group_id: GroupId) -> Option<Group> {
        self.groups
            .get(&group_id)
            .map(|row| row.clone().with_members(self.members_of(group_id)))
    }
}

/// In-memory group repository.
#[derive(Component, Clone, Default)]
#[shaku(interface = GroupRepository)]
pub struct InMemoryGroupRepository {
    store: Arc<Mutex<MemoryStore>>,
}

impl InMemoryGroupRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user row on behalf of the user directory.
    pub async fn insert_user(&self, user: User) {
        self.store.lock().await.users.insert(user.id, user);
    }

    /// Returns every user, ordered by id.
    pub async fn users(&self) -> Vec<User> {
        self.store.lock().await.users.values().cloned().collect()
    }

    /// Returns every group with members loaded, ordered by id.
    pub async fn groups(&self) -> Vec<Group> {
        let store = self.store.lock().await;
        store
            .groups
            .keys()
            .filter_map(|id| store.load(*id))
            .collect()
    }
}

#[async_trait]
impl GroupRepository for InMemoryGroupRepository {
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<Option<Group>> {
        let store = self.store.lock().await;
        Ok(store
            .users
            .get(&user_id)
            .and_then(|u| u.group_id)
            .and_then(|group_id| store.load(group_id)))
    }

    async fn find_by_token(&self, token: &str) -> HuddleResult<Option<Group>> {
        let store = self.store.lock().await;
        Ok(store
            .groups
            .values()
            .find(|g| g.token == token)
            .and_then(|g| store.load(g.id)))
    }

    async fn find_user(&self, user_id: UserId) -> HuddleResult<Option<User>> {
        Ok(self.store.lock().await.users.get(&user_id).cloned())
    }

    async fn begin(&self) -> HuddleResult<Box<dyn GroupTransaction>> {
        let guard = Arc::clone(&self.store).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryGroupTransaction { guard, working }))
    }
}

/// Open in-memory transaction.
pub struct InMemoryGroupTransaction {
    guard: OwnedMutexGuard<MemoryStore>,
    working: MemoryStore,
}

#[async_trait]
impl GroupTransaction for InMemoryGroupTransaction {
    async fn lock_users(&mut self, ids: &[UserId]) -> HuddleResult<Vec<User>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.working.users.get(id).cloned())
            .collect())
    }

    async fn lock_groups(&mut self, ids: &[GroupId]) -> HuddleResult<Vec<Group>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids.iter().filter_map(|id| self.working.load(*id)).collect())
    }

    async fn group_id_by_token(&mut self, token: &str) -> HuddleResult<Option<GroupId>> {
        Ok(self
            .working
            .groups
            .values()
            .find(|g| g.token == token)
            .map(|g| g.id))
    }

    async fn create_group(&mut self, leader_id: UserId, token: &str) -> HuddleResult<Group> {
        if self.working.groups.values().any(|g| g.token == token) {
            return Err(HuddleError::Database(
                "duplicate key value violates unique constraint on groups.token".to_string(),
            ));
        }
        let group = Group::new(leader_id, token);
        self.working.groups.insert(group.id, group.clone());
        debug!("Created group {} led by {}", group.id, leader_id);
        Ok(group)
    }

    async fn reassign_user(&mut self, user_id: UserId, group_id: GroupId) -> HuddleResult<()> {
        if !self.working.groups.contains_key(&group_id) {
            return Err(HuddleError::Database(format!(
                "foreign key violation: group {} does not exist",
                group_id
            )));
        }
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or_else(|| HuddleError::not_found("User", user_id))?;
        user.group_id = Some(group_id);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_group(&mut self, group_id: GroupId) -> HuddleResult<()> {
        if self.working.groups.remove(&group_id).is_none() {
            return Err(HuddleError::not_found("Group", group_id));
        }
        // ON DELETE SET NULL
        for user in self.working.users.values_mut() {
            if user.is_in(group_id) {
                user.group_id = None;
            }
        }
        Ok(())
    }

    async fn update_confirmation(&mut self, group_id: GroupId, confirmed: bool) -> HuddleResult<()> {
        let group = self
            .working
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| HuddleError::not_found("Group", group_id))?;
        group.is_confirmed = confirmed;
        group.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> HuddleResult<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
