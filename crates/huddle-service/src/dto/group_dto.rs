//! Group-related DTOs.

use chrono::{DateTime, Utc};
use huddle_core::{rules, Group, GroupId, User, UserId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Public profile of a group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub photo_url: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

/// Full view of a group as seen by one of its members.
///
/// This is the value cached under every member's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub leader_id: UserId,
    pub token: String,
    pub is_confirmed: bool,
    /// Leader first, then by id.
    pub members: Vec<UserInfo>,
    pub updated_at: DateTime<Utc>,
}

impl GroupSnapshot {
    /// Ids of every member.
    #[must_use]
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.id).collect()
    }
}

impl From<&Group> for GroupSnapshot {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            leader_id: group.leader_id,
            token: group.token.clone(),
            is_confirmed: group.is_confirmed,
            members: group.members.iter().map(UserInfo::from).collect(),
            updated_at: group.updated_at,
        }
    }
}

impl From<Group> for GroupSnapshot {
    fn from(group: Group) -> Self {
        Self::from(&group)
    }
}

/// What a prospective member sees before joining by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub token: String,
    pub leader: UserInfo,
}

/// Request to join a group by invite token.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JoinGroupRequest {
    #[validate(custom(function = "rules::not_blank"))]
    pub token: String,
}

/// Request to lock or unlock a group's membership.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateConfirmationRequest {
    pub is_confirmed: bool,
}
