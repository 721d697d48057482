//! User entity.

use crate::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered participant.
///
/// Users are provisioned by the user directory; this service only ever
/// changes `group_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,

    /// User's first name.
    pub firstname: String,

    /// User's last name.
    pub lastname: String,

    /// Profile picture URL.
    pub photo_url: String,

    /// Current group. `None` only until the user is first resolved.
    pub group_id: Option<GroupId>,

    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user without a group.
    #[must_use]
    pub fn new(
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        photo_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            photo_url: photo_url.into(),
            group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the user's full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }

    /// Checks if the user belongs to the given group.
    #[must_use]
    pub fn is_in(&self, group_id: GroupId) -> bool {
        self.group_id == Some(group_id)
    }
}
