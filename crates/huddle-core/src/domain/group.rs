//! Group entity.

use super::user::User;
use crate::{GroupId, HuddleError, HuddleResult, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A capacity-bounded team of users sharing an invite token.
///
/// `members` is derived from the users whose `group_id` points here; it is
/// never stored on the group row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier for the group.
    pub id: GroupId,

    /// The member allowed to confirm the group and remove others.
    pub leader_id: UserId,

    /// Opaque invite token. Unique and immutable.
    pub token: String,

    /// Whether membership is locked.
    pub is_confirmed: bool,

    /// Current members, leader first.
    pub members: Vec<User>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Creates an unconfirmed group row with no members loaded.
    #[must_use]
    pub fn new(leader_id: UserId, token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: GroupId::new(),
            leader_id,
            token: token.into(),
            is_confirmed: false,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches members, ordered leader first and then by id.
    #[must_use]
    pub fn with_members(mut self, members: Vec<User>) -> Self {
        self.members = members;
        self.sort_members();
        self
    }

    /// Orders members leader first, then by ascending id.
    pub fn sort_members(&mut self) {
        let leader = self.leader_id;
        self.members
            .sort_by_key(|member| (member.id != leader, member.id));
    }

    /// Checks if the user is a current member.
    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.iter().any(|m| m.id == user_id)
    }

    /// Checks if the user leads this group.
    #[must_use]
    pub fn is_leader(&self, user_id: UserId) -> bool {
        self.leader_id == user_id
    }

    /// Returns the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Checks if the group has exactly one member.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Checks if another member fits within `capacity`.
    #[must_use]
    pub fn has_capacity(&self, capacity: usize) -> bool {
        self.members.len() < capacity
    }

    /// Returns the leader's user record if present among the members.
    #[must_use]
    pub fn leader(&self) -> Option<&User> {
        self.members.iter().find(|m| m.id == self.leader_id)
    }

    /// Returns the ids of every member.
    #[must_use]
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Verifies the stored group is well formed.
    ///
    /// A violation means the store is corrupt, so it is reported as
    /// `Internal` rather than as a caller error.
    pub fn check_integrity(&self, capacity: usize) -> HuddleResult<()> {
        if self.token.trim().is_empty() {
            return Err(HuddleError::internal(format!("group {} has an empty token", self.id)));
        }
        if self.members.is_empty() {
            return Err(HuddleError::internal(format!("group {} has no members", self.id)));
        }
        if self.leader().is_none() {
            return Err(HuddleError::internal(format!(
                "group {} leader {} is not a member",
                self.id, self.leader_id
            )));
        }
        if self.members.len() > capacity {
            return Err(HuddleError::internal(format!(
                "group {} has {} members, capacity is {}",
                self.id,
                self.members.len(),
                capacity
            )));
        }
        Ok(())
    }
}
