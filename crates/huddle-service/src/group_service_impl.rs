//! Group service implementation.

use crate::cache::{CacheExt, CacheInterface, CacheKeys, GroupCacheWriter};
use crate::dto::{GroupSnapshot, GroupSummary, UserInfo};
use crate::group_service::{GroupPolicy, GroupService};
use crate::metrics::GroupMetrics;
use crate::token::TokenGenerator;
use async_trait::async_trait;
use huddle_core::{Group, GroupId, HuddleError, HuddleResult, User, UserId};
use huddle_repository::{GroupRepository, GroupTransaction, TransactionExt};
use serde::de::DeserializeOwned;
use shaku::Component;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Group coordinator backed by a [`GroupRepository`] and a cache.
#[derive(Component)]
#[shaku(interface = GroupService)]
pub struct GroupServiceImpl {
    #[shaku(inject)]
    repository: Arc<dyn GroupRepository>,
    #[shaku(inject)]
    cache: Arc<dyn CacheInterface>,
    #[shaku(inject)]
    cache_writer: Arc<dyn GroupCacheWriter>,
    #[shaku(inject)]
    token_generator: Arc<dyn TokenGenerator>,
    policy: GroupPolicy,
    keys: CacheKeys,
}

/// State captured inside a join before the locks are released.
struct JoinOutcome {
    destination: GroupId,
    former: Option<FormerGroup>,
}

struct FormerGroup {
    id: GroupId,
    token: String,
    deleted: bool,
}

/// State captured inside a split (delete-member or leave).
struct SplitOutcome {
    from_leader: UserId,
    new_group: GroupId,
}

impl GroupServiceImpl {
    /// Creates a new group service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn GroupRepository>,
        cache: Arc<dyn CacheInterface>,
        cache_writer: Arc<dyn GroupCacheWriter>,
        token_generator: Arc<dyn TokenGenerator>,
        policy: GroupPolicy,
        keys: CacheKeys,
    ) -> Self {
        Self {
            repository,
            cache,
            cache_writer,
            token_generator,
            policy,
            keys,
        }
    }

    /// Cache read that treats every failure as a miss.
    async fn cached<T: DeserializeOwned + Send>(&self, key: &str, kind: &'static str) -> Option<T> {
        match self.cache.get::<T>(key).await {
            Ok(value) => {
                GroupMetrics::cache_lookup(kind, value.is_some());
                value
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to the store");
                GroupMetrics::cache_lookup(kind, false);
                None
            }
        }
    }

    async fn cache_put<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value, self.policy.cache_ttl).await {
            warn!(key = %key, error = %e, "Failed to populate cache");
        }
    }

    /// Writes the group under every member's key. Never fails.
    async fn refresh(&self, group: &Group) {
        let report = self.cache_writer.write_group(&GroupSnapshot::from(group)).await;
        if !report.is_complete() {
            warn!(
                group_id = %group.id,
                failed = report.failed.len(),
                "Partial cache refresh; stale entries expire with their TTL"
            );
        }
    }

    /// Loads the user's group from the store after a commit.
    async fn load_group(&self, user_id: UserId) -> HuddleResult<Group> {
        self.repository
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| HuddleError::internal(format!("user {} has no group after commit", user_id)))
    }

    /// Resolves the user's group from the store, creating a singleton group
    /// when the user has none yet.
    async fn resolve_group(&self, user_id: UserId) -> HuddleResult<Group> {
        let user = self
            .repository
            .find_user(user_id)
            .await?
            .ok_or_else(|| HuddleError::not_found("User", user_id))?;

        match user.group_id {
            Some(group_id) => self.repository.find_by_user(user_id).await?.ok_or_else(|| {
                HuddleError::internal(format!("user {} references missing group {}", user_id, group_id))
            }),
            None => {
                let token = self.token_generator.generate(user_id);
                let created = self
                    .repository
                    .run_in_transaction(self.policy.transaction_timeout, move |tx| {
                        Box::pin(create_initial_group(tx, user_id, token))
                    })
                    .await?;
                if created {
                    GroupMetrics::group_created("first_lookup");
                    info!(user_id = %user_id, "Created singleton group on first lookup");
                }
                self.load_group(user_id).await
            }
        }
    }

    async fn find_by_user_inner(&self, user_id: UserId) -> HuddleResult<GroupSnapshot> {
        let key = self.keys.group_by_user(user_id);
        if let Some(snapshot) = self.cached::<GroupSnapshot>(&key, "user").await {
            debug!(user_id = %user_id, group_id = %snapshot.id, from_cache = true, "Group found in cache");
            return Ok(snapshot);
        }

        let group = self.resolve_group(user_id).await?;
        let snapshot = GroupSnapshot::from(&group);
        self.cache_put(&key, &snapshot).await;

        info!(
            user_id = %user_id,
            group_id = %group.id,
            member_count = group.member_count(),
            from_cache = false,
            "Resolved group by user"
        );
        Ok(snapshot)
    }

    async fn find_by_token_inner(&self, token: &str) -> HuddleResult<GroupSummary> {
        if token.trim().is_empty() {
            return Err(HuddleError::invalid_argument("token must not be empty"));
        }

        let key = self.keys.group_by_token(token);
        if let Some(summary) = self.cached::<GroupSummary>(&key, "token").await {
            debug!(token = %token, group_id = %summary.id, from_cache = true, "Group found in cache");
            return Ok(summary);
        }

        let group = self
            .repository
            .find_by_token(token)
            .await?
            .ok_or_else(|| HuddleError::not_found("Group", token))?;
        group.check_integrity(self.policy.capacity)?;

        let leader = group
            .leader()
            .map(UserInfo::from)
            .ok_or_else(|| HuddleError::internal(format!("group {} has no leader among its members", group.id)))?;
        let summary = GroupSummary {
            id: group.id,
            token: group.token.clone(),
            leader,
        };
        self.cache_put(&key, &summary).await;

        info!(token = %token, group_id = %group.id, from_cache = false, "Resolved group by token");
        Ok(summary)
    }

    async fn update_confirm_inner(&self, leader_id: UserId, is_confirmed: bool) -> HuddleResult<GroupSnapshot> {
        // the caller may not have been resolved yet
        self.resolve_group(leader_id).await?;

        self.repository
            .run_in_transaction(self.policy.transaction_timeout, move |tx| {
                Box::pin(confirm_group(tx, leader_id, is_confirmed))
            })
            .await?;

        let updated = self.load_group(leader_id).await?;
        self.refresh(&updated).await;

        info!(
            leader_id = %leader_id,
            group_id = %updated.id,
            is_confirmed = updated.is_confirmed,
            "Updated group confirmation"
        );
        Ok(GroupSnapshot::from(&updated))
    }

    async fn delete_member_inner(&self, leader_id: UserId, target_user_id: UserId) -> HuddleResult<GroupSnapshot> {
        if leader_id == target_user_id {
            return Err(HuddleError::permission_denied("the leader cannot remove themselves"));
        }

        let token = self.token_generator.generate(target_user_id);
        let outcome = self
            .repository
            .run_in_transaction(self.policy.transaction_timeout, move |tx| {
                Box::pin(evict_member(tx, leader_id, target_user_id, token))
            })
            .await?;
        GroupMetrics::group_created("delete_member");

        let leader_group = self.load_group(leader_id).await?;
        let target_group = self.load_group(target_user_id).await?;
        self.refresh(&leader_group).await;
        self.refresh(&target_group).await;

        info!(
            leader_id = %leader_id,
            user_id = %target_user_id,
            group_id = %leader_group.id,
            new_group_id = %outcome.new_group,
            member_count = leader_group.member_count(),
            "Removed member from group"
        );
        Ok(GroupSnapshot::from(&leader_group))
    }

    async fn leave_inner(&self, user_id: UserId) -> HuddleResult<GroupSnapshot> {
        let token = self.token_generator.generate(user_id);
        let outcome = self
            .repository
            .run_in_transaction(self.policy.transaction_timeout, move |tx| {
                Box::pin(leave_group(tx, user_id, token))
            })
            .await?;
        GroupMetrics::group_created("leave");

        let new_group = self.load_group(user_id).await?;
        let old_group = self.load_group(outcome.from_leader).await?;
        self.refresh(&old_group).await;
        self.refresh(&new_group).await;

        info!(
            user_id = %user_id,
            group_id = %new_group.id,
            former_group_id = %old_group.id,
            "Left group"
        );
        Ok(GroupSnapshot::from(&new_group))
    }

    async fn join_inner(&self, user_id: UserId, token: &str) -> HuddleResult<GroupSnapshot> {
        if token.trim().is_empty() {
            return Err(HuddleError::invalid_argument("token must not be empty"));
        }

        let capacity = self.policy.capacity;
        let owned_token = token.to_string();
        let outcome = self
            .repository
            .run_in_transaction(self.policy.transaction_timeout, move |tx| {
                Box::pin(join_group(tx, user_id, owned_token, capacity))
            })
            .await?;

        let destination = self.load_group(user_id).await?;
        self.refresh(&destination).await;

        if let Some(former) = &outcome.former {
            if former.deleted {
                GroupMetrics::group_deleted();
                self.cache_writer.evict_token(&former.token).await;
            } else {
                match self.repository.find_by_token(&former.token).await {
                    Ok(Some(group)) => self.refresh(&group).await,
                    Ok(None) => debug!(group_id = %former.id, "Former group vanished before refresh"),
                    Err(e) => warn!(
                        group_id = %former.id,
                        error = %e,
                        "Failed to reload former group; its cached entries expire with their TTL"
                    ),
                }
            }
        }

        info!(
            user_id = %user_id,
            group_id = %outcome.destination,
            former_group_id = ?outcome.former.as_ref().map(|f| f.id),
            former_deleted = outcome.former.as_ref().is_some_and(|f| f.deleted),
            member_count = destination.member_count(),
            "Joined group"
        );
        Ok(GroupSnapshot::from(&destination))
    }
}

/// Records the outcome of a public operation.
fn observe<T>(operation: &'static str, result: HuddleResult<T>) -> HuddleResult<T> {
    match &result {
        Ok(_) => GroupMetrics::operation(operation, "ok"),
        Err(e) => {
            debug!(operation, error = %e, "Group operation failed");
            GroupMetrics::operation(operation, e.error_code());
        }
    }
    result
}

#[async_trait]
impl GroupService for GroupServiceImpl {
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<GroupSnapshot> {
        observe("find_by_user", self.find_by_user_inner(user_id).await)
    }

    async fn find_by_token(&self, token: &str) -> HuddleResult<GroupSummary> {
        observe("find_by_token", self.find_by_token_inner(token).await)
    }

    async fn update_confirm(&self, leader_id: UserId, is_confirmed: bool) -> HuddleResult<GroupSnapshot> {
        observe("update_confirm", self.update_confirm_inner(leader_id, is_confirmed).await)
    }

    async fn delete_member(&self, leader_id: UserId, target_user_id: UserId) -> HuddleResult<GroupSnapshot> {
        observe("delete_member", self.delete_member_inner(leader_id, target_user_id).await)
    }

    async fn leave(&self, user_id: UserId) -> HuddleResult<GroupSnapshot> {
        observe("leave", self.leave_inner(user_id).await)
    }

    async fn join(&self, user_id: UserId, token: &str) -> HuddleResult<GroupSnapshot> {
        observe("join", self.join_inner(user_id, token).await)
    }
}

impl std::fmt::Debug for GroupServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupServiceImpl")
            .field("policy", &self.policy)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

// Units of work. Each locks users before groups; the repository sorts ids
// within each kind.

async fn lock_user(tx: &mut dyn GroupTransaction, user_id: UserId) -> HuddleResult<User> {
    tx.lock_users(&[user_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| HuddleError::not_found("User", user_id))
}

fn take_group(groups: &mut Vec<Group>, group_id: GroupId) -> Option<Group> {
    let index = groups.iter().position(|g| g.id == group_id)?;
    Some(groups.swap_remove(index))
}

fn missing_group(user_id: UserId, group_id: GroupId) -> HuddleError {
    HuddleError::internal(format!("user {} references missing group {}", user_id, group_id))
}

async fn confirm_group(tx: &mut dyn GroupTransaction, leader_id: UserId, is_confirmed: bool) -> HuddleResult<()> {
    let leader = lock_user(tx, leader_id).await?;
    let group_id = leader
        .group_id
        .ok_or_else(|| HuddleError::permission_denied("requester does not lead a group"))?;

    let group = tx
        .lock_groups(&[group_id])
        .await?
        .pop()
        .ok_or_else(|| missing_group(leader_id, group_id))?;
    if !group.is_leader(leader_id) {
        return Err(HuddleError::permission_denied("only the group leader can change confirmation"));
    }

    tx.update_confirmation(group.id, is_confirmed).await
}

/// Returns false when another request created the group first.
async fn create_initial_group(tx: &mut dyn GroupTransaction, user_id: UserId, token: String) -> HuddleResult<bool> {
    let user = lock_user(tx, user_id).await?;
    if user.group_id.is_some() {
        return Ok(false);
    }

    let group = tx.create_group(user_id, &token).await?;
    tx.reassign_user(user_id, group.id).await?;
    Ok(true)
}

async fn split_off(tx: &mut dyn GroupTransaction, user_id: UserId, token: &str) -> HuddleResult<GroupId> {
    let group = tx.create_group(user_id, token).await?;
    tx.reassign_user(user_id, group.id).await?;
    Ok(group.id)
}

async fn evict_member(
    tx: &mut dyn GroupTransaction,
    leader_id: UserId,
    target_user_id: UserId,
    token: String,
) -> HuddleResult<SplitOutcome> {
    let users = tx.lock_users(&[leader_id, target_user_id]).await?;
    let leader = users
        .iter()
        .find(|u| u.id == leader_id)
        .ok_or_else(|| HuddleError::not_found("User", leader_id))?;
    let group_id = leader
        .group_id
        .ok_or_else(|| HuddleError::permission_denied("requester does not lead a group"))?;

    let group = tx
        .lock_groups(&[group_id])
        .await?
        .pop()
        .ok_or_else(|| missing_group(leader_id, group_id))?;

    if !group.is_leader(leader_id) {
        return Err(HuddleError::permission_denied("only the group leader can remove members"));
    }
    if !group.is_member(target_user_id) {
        return Err(HuddleError::permission_denied("user is not a member of this group"));
    }
    if group.is_confirmed {
        return Err(HuddleError::permission_denied("group is confirmed"));
    }

    let new_group = split_off(tx, target_user_id, &token).await?;
    Ok(SplitOutcome {
        from_leader: group.leader_id,
        new_group,
    })
}

async fn leave_group(tx: &mut dyn GroupTransaction, user_id: UserId, token: String) -> HuddleResult<SplitOutcome> {
    let user = lock_user(tx, user_id).await?;
    let group_id = user
        .group_id
        .ok_or_else(|| HuddleError::permission_denied("user has no group to leave"))?;

    let group = tx
        .lock_groups(&[group_id])
        .await?
        .pop()
        .ok_or_else(|| missing_group(user_id, group_id))?;

    if group.is_confirmed {
        return Err(HuddleError::permission_denied("group is confirmed"));
    }
    if group.is_leader(user_id) {
        return Err(HuddleError::permission_denied("the leader cannot leave the group"));
    }
    if group.is_singleton() {
        return Err(HuddleError::permission_denied("user is already alone in the group"));
    }

    let new_group = split_off(tx, user_id, &token).await?;
    Ok(SplitOutcome {
        from_leader: group.leader_id,
        new_group,
    })
}

async fn join_group(
    tx: &mut dyn GroupTransaction,
    user_id: UserId,
    token: String,
    capacity: usize,
) -> HuddleResult<JoinOutcome> {
    let destination_id = tx
        .group_id_by_token(&token)
        .await?
        .ok_or_else(|| HuddleError::not_found("Group", &token))?;

    let user = lock_user(tx, user_id).await?;
    if user.group_id == Some(destination_id) {
        return Err(HuddleError::permission_denied("user is already a member of this group"));
    }

    let mut ids = vec![destination_id];
    ids.extend(user.group_id);
    let mut groups = tx.lock_groups(&ids).await?;

    let destination =
        take_group(&mut groups, destination_id).ok_or_else(|| HuddleError::not_found("Group", &token))?;
    if destination.is_member(user_id) {
        return Err(HuddleError::permission_denied("user is already a member of this group"));
    }
    if destination.is_confirmed {
        return Err(HuddleError::permission_denied("group is confirmed"));
    }
    if !destination.has_capacity(capacity) {
        return Err(HuddleError::permission_denied("group is full"));
    }

    let former = match user.group_id {
        Some(former_id) => {
            let former = take_group(&mut groups, former_id).ok_or_else(|| missing_group(user_id, former_id))?;
            if former.is_confirmed {
                return Err(HuddleError::permission_denied("current group is confirmed"));
            }
            if former.is_leader(user_id) && former.member_count() > 1 {
                return Err(HuddleError::permission_denied(
                    "a leader must remove every member before joining another group",
                ));
            }
            Some(former)
        }
        None => None,
    };

    tx.reassign_user(user_id, destination_id).await?;

    let former = match former {
        Some(group) => {
            let deleted = group.is_leader(user_id) && group.is_singleton();
            if deleted {
                tx.delete_group(group.id).await?;
            }
            Some(FormerGroup {
                id: group.id,
                token: group.token,
                deleted,
            })
        }
        None => None,
    };

    Ok(JoinOutcome {
        destination: destination_id,
        former,
    })
}
